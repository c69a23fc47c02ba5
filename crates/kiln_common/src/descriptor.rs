//! The configuration a unit is built under.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::hash::{ContentHash, ContentHasher};

/// Everything besides source content that determines a unit's build output.
///
/// Collections are ordered so that equal configurations always serialize to
/// identical bytes regardless of declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDescriptor {
    /// Toolchain identifier (e.g. `"rustc 1.80.0"`).
    pub toolchain: String,
    /// Target triple.
    pub target: String,
    /// Optimization profile name (e.g. `"dev"`, `"release"`).
    pub profile: String,
    /// Optimization level of the profile.
    pub opt_level: u8,
    /// Whether debug info is emitted.
    pub debug: bool,
    /// Enabled feature flags.
    pub features: BTreeSet<String>,
    /// Declared environment variables and their values (`None` if unset).
    pub env: BTreeMap<String, Option<String>>,
}

impl ConfigDescriptor {
    /// Creates a descriptor with no features and no declared environment.
    pub fn new(toolchain: &str, target: &str, profile: &str) -> Self {
        Self {
            toolchain: toolchain.to_string(),
            target: target.to_string(),
            profile: profile.to_string(),
            opt_level: 0,
            debug: false,
            features: BTreeSet::new(),
            env: BTreeMap::new(),
        }
    }

    /// Returns the canonical byte encoding fed to the local hash.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
    }

    /// Digest of the variant identity: profile, target triple and features.
    ///
    /// Distinct variants of one unit are stored as distinct records. Toolchain,
    /// optimization settings and environment are not part of the variant, so
    /// a change to them is compared against the existing record.
    pub fn record_hash(&self) -> ContentHash {
        let mut hasher = ContentHasher::new("kiln.variant");
        hasher
            .write_field(self.profile.as_bytes())
            .write_field(self.target.as_bytes());
        for feature in &self.features {
            hasher.write_field(feature.as_bytes());
        }
        hasher.finish()
    }

    /// Returns the enabled features as a comma-separated list.
    pub fn feature_list(&self) -> String {
        self.features.iter().cloned().collect::<Vec<_>>().join(",")
    }
}
