//! Error types for the bluevery core
//!
//! `BlueveryError` is what façade callers see. Collaborators report their own
//! failures through `TransportError` and `CooldownError`, which the façade
//! wraps without rewriting.

use thiserror::Error;

// ============================================================================
// COLLABORATOR ERRORS
// ============================================================================

/// Failures reported by a transport implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    #[error("Peripheral not found: {0}")]
    PeripheralNotFound(String),

    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(String),

    #[error("Peripheral not connected: {0}")]
    NotConnected(String),

    #[error("Transport I/O error: {0}")]
    Io(String),
}

/// Failure of a cooldown (consideration) step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cooldown failed: {0}")]
pub struct CooldownError(pub String);

// ============================================================================
// FAÇADE ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlueveryError {
    /// A scan cycle is already in flight; the request was not queued.
    #[error("A scan cycle is already in progress")]
    AlreadyScanning,

    #[error("Scan burst failed after {completed_bursts} completed burst(s): {source}")]
    ScanBurstFailed {
        completed_bursts: u32,
        #[source]
        source: TransportError,
    },

    #[error("Cooldown failed after {completed_bursts} completed burst(s): {source}")]
    CooldownFailed {
        completed_bursts: u32,
        #[source]
        source: CooldownError,
    },

    /// The cycle was torn down by `stop_bluevery` before it finished.
    #[error("Scan cycle aborted after {completed_bursts} completed burst(s)")]
    ScanAborted { completed_bursts: u32 },

    #[error("Not initialized")]
    NotInitialized,

    #[error("Invalid scan options: {0}")]
    InvalidOptions(String),

    #[error("Read failed: {0}")]
    ReadFailed(#[source] TransportError),

    #[error("Write failed: {0}")]
    WriteFailed(#[source] TransportError),
}

impl BlueveryError {
    /// Benign conditions are reported to the caller but leave every piece of
    /// façade state untouched.
    pub fn is_benign(&self) -> bool {
        matches!(self, BlueveryError::AlreadyScanning)
    }

    /// Number of bursts issued before the cycle ended, for cycle failures.
    pub fn completed_bursts(&self) -> Option<u32> {
        match self {
            BlueveryError::ScanBurstFailed {
                completed_bursts, ..
            }
            | BlueveryError::CooldownFailed {
                completed_bursts, ..
            }
            | BlueveryError::ScanAborted { completed_bursts } => Some(*completed_bursts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_scanning_is_benign() {
        assert!(BlueveryError::AlreadyScanning.is_benign());
        assert!(!BlueveryError::NotInitialized.is_benign());
        assert!(!BlueveryError::ReadFailed(TransportError::Io("x".into())).is_benign());
    }

    #[test]
    fn test_completed_bursts_carried_by_cycle_failures() {
        let err = BlueveryError::ScanBurstFailed {
            completed_bursts: 2,
            source: TransportError::ScanFailed("radio off".into()),
        };
        assert_eq!(err.completed_bursts(), Some(2));
        assert_eq!(
            BlueveryError::ScanAborted { completed_bursts: 1 }.completed_bursts(),
            Some(1)
        );
        assert_eq!(BlueveryError::AlreadyScanning.completed_bursts(), None);
    }

    #[test]
    fn test_error_display_includes_source() {
        let err = BlueveryError::WriteFailed(TransportError::NotConnected("AA:BB".into()));
        assert_eq!(
            err.to_string(),
            "Write failed: Peripheral not connected: AA:BB"
        );
    }
}
