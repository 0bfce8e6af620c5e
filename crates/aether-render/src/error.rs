//! Errors surfaced by passes and the frame scheduler.

use crate::backend::BackendError;

/// Failure of a pass lifecycle operation.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// A transient buffer could not be allocated. The frame is aborted; the
    /// pass stays in a state where `cleanup` is still valid.
    #[error("failed to allocate transient '{name}': {source}")]
    ResourceExhausted {
        name: &'static str,
        #[source]
        source: BackendError,
    },

    /// A transient buffer was described in a way no backend can allocate,
    /// e.g. a zero-sized camera.
    #[error("invalid description for transient '{name}': {source}")]
    InvalidDescriptor {
        name: &'static str,
        #[source]
        source: BackendError,
    },

    /// An operation was called out of order (e.g. `execute` before `configure`).
    #[error("{pass}: `{operation}` called while {state}")]
    LifecycleMisuse {
        pass: String,
        operation: &'static str,
        state: &'static str,
    },

    /// The backend rejected a submitted command buffer.
    #[error("command submission failed: {0}")]
    Submit(#[from] BackendError),
}

impl PassError {
    /// Classify a failed transient allocation.
    pub fn allocation(name: &'static str, source: BackendError) -> Self {
        match source {
            BackendError::InvalidDescriptor { .. } => Self::InvalidDescriptor { name, source },
            source => Self::ResourceExhausted { name, source },
        }
    }

    pub fn is_lifecycle_misuse(&self) -> bool {
        matches!(self, Self::LifecycleMisuse { .. })
    }

    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }
}
