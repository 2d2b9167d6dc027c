use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the acquisition session and the gesture store.
///
/// Nothing is retried internally. Callers decide whether to recalibrate,
/// reconnect or re-invoke.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Write attempted on (or read interrupted by) a closed link
    #[error("transport is closed")]
    TransportClosed,

    /// Device reply could not be parsed as expected
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Persisted frame does not match the gesture record schema
    #[error("schema error: {0}")]
    Schema(String),

    /// Removal requested for a timestamp absent from the bucket
    #[error("no record with timestamp {timestamp} in bucket {}", bucket.display())]
    NotFound { bucket: PathBuf, timestamp: f64 },

    /// Device did not answer within the configured read deadline
    #[error("device did not respond within {0:?}")]
    Timeout(Duration),

    #[error("invalid session state: {0}")]
    InvalidState(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CollectorError>;

impl CollectorError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_bucket() {
        let err = CollectorError::NotFound {
            bucket: PathBuf::from("dataset/gestures/tap/right_hand/candidate_a.frames"),
            timestamp: 1.5,
        };
        let msg = err.to_string();
        assert!(msg.contains("candidate_a.frames"));
        assert!(msg.contains("1.5"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CollectorError = io.into();
        assert!(matches!(err, CollectorError::Io(_)));
    }
}
