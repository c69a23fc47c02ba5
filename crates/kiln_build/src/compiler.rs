//! The compiler collaborator.

use kiln_graph::Unit;

use crate::cancel::CancelToken;

/// Errors reported by a [`Compiler`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// Compilation ran and failed.
    #[error("{message}")]
    Failed {
        /// What went wrong, as reported to the user.
        message: String,
    },

    /// Compilation was abandoned because the build was cancelled.
    #[error("compilation cancelled")]
    Cancelled,
}

impl CompileError {
    /// Creates a [`CompileError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Compiles exactly one unit.
///
/// Called from worker threads, possibly for several units at once. The unit's
/// dependencies have always been built or reused before it is called.
/// Implementations should poll `cancel` during long work and return
/// [`CompileError::Cancelled`] when it is set.
pub trait Compiler: Send + Sync {
    /// Compiles `unit`.
    fn compile(&self, unit: &Unit, cancel: &CancelToken) -> Result<(), CompileError>;
}

impl<F> Compiler for F
where
    F: Fn(&Unit, &CancelToken) -> Result<(), CompileError> + Send + Sync,
{
    fn compile(&self, unit: &Unit, cancel: &CancelToken) -> Result<(), CompileError> {
        self(unit, cancel)
    }
}
