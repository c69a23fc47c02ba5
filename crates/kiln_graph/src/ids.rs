//! Typed indices into a [`UnitGraph`](crate::UnitGraph).

use serde::{Deserialize, Serialize};

use crate::arena::DenseIndex;

/// Dense index of a unit within one [`UnitGraph`](crate::UnitGraph).
///
/// Only meaningful for the graph that issued it. Index order matches unit
/// identifier order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct UnitIndex(u32);

impl DenseIndex for UnitIndex {
    fn new(pos: usize) -> Self {
        Self(pos as u32)
    }

    fn pos(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for UnitIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
