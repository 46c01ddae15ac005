// ── Core error types ──
//
// Two layers: `StoreError` is what a `ValueStore` implementation reports,
// `CoreError` is what callers of the synchronizer see. Background failures
// are flattened to messages so one outcome can be handed to every waiter.

use thiserror::Error;

/// Failure reported by a [`ValueStore`](crate::ValueStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode or decode value: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("store operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("{message}")]
    Backend { message: String },
}

impl StoreError {
    /// Convenience constructor for backend-specific failures.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    // ── Initialization ───────────────────────────────────────────────
    #[error("Initial load failed: {message}")]
    LoadFailed { message: String },

    #[error("Synchronizer was shut down")]
    Cancelled,

    // ── Persistence ──────────────────────────────────────────────────
    #[error("Persisting value failed: {message}")]
    SaveFailed { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_messages() {
        let err = StoreError::Timeout { timeout_ms: 250 };
        assert_eq!(err.to_string(), "store operation timed out after 250ms");

        let err = StoreError::backend("disk on fire");
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[test]
    fn core_error_is_cloneable_for_fan_out() {
        let err = CoreError::LoadFailed {
            message: "no such table".into(),
        };
        let copy = err.clone();
        assert_eq!(err, copy);
        assert_eq!(copy.to_string(), "Initial load failed: no such table");
    }
}
