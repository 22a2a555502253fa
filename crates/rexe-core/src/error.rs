//! Error types for guard operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for guard operations
pub type Result<T> = std::result::Result<T, GuardError>;

/// Errors that can occur while arming the guard or reporting usage
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Syscall error: {0}")]
    Syscall(String),

    /// The OS accepted a limit but reads back something else.
    #[error("{resource} not applied: requested {requested}, got soft={soft} hard={hard}")]
    LimitVerification {
        resource: &'static str,
        requested: u64,
        soft: u64,
        hard: u64,
    },

    #[error("Failed to write usage artifact {}: {source}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed usage artifact: {0}")]
    MalformedArtifact(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let guard_err = GuardError::from(io_err);
        assert!(guard_err.to_string().contains("IO error"));
    }

    #[test]
    fn test_limit_verification_display() {
        let err = GuardError::LimitVerification {
            resource: "RLIMIT_AS",
            requested: 268435456,
            soft: 268435456,
            hard: u64::MAX,
        };
        let msg = err.to_string();
        assert!(msg.contains("RLIMIT_AS"));
        assert!(msg.contains("requested 268435456"));
        assert!(msg.contains(&format!("hard={}", u64::MAX)));
    }

    #[test]
    fn test_artifact_write_keeps_source() {
        use std::error::Error as _;

        let err = GuardError::ArtifactWrite {
            path: PathBuf::from("/readonly/rusage.txt"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/readonly/rusage.txt"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_result_error() {
        fn returns_error() -> Result<i32> {
            Err(GuardError::InvalidConfig("zero".to_string()))
        }
        assert!(returns_error().is_err());
    }
}
