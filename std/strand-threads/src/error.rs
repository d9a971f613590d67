///
/// Thread registry error types.
///
/// Errors returned by create and join, the platform-level reasons behind
/// them, and configuration loading failures.
///

use std::path::PathBuf;
use thiserror::Error;

use crate::registry::ThreadId;

#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("Thread table is full ({capacity} slots in use)")]
    ResourceExhausted { capacity: usize },

    #[error("Failed to spawn thread: {0}")]
    SpawnFailed(#[from] SpawnFailure),

    #[error("Invalid thread id {0}")]
    InvalidId(i64),

    #[error("Failed to join thread {id}: {reason}")]
    JoinFailed { id: ThreadId, reason: JoinFailure },

    #[error("Thread registry is already initialized")]
    AlreadyInitialized,

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

impl ThreadError {
    /// Negative status code used by the C interface.
    pub fn code(&self) -> i32 {
        match self {
            ThreadError::ResourceExhausted { .. } => -1,
            ThreadError::SpawnFailed(_) => -2,
            ThreadError::InvalidId(_) => -3,
            ThreadError::JoinFailed { .. } => -4,
            ThreadError::AlreadyInitialized => -5,
            ThreadError::InvalidConfig(_) => -6,
        }
    }
}

/// Why the platform refused to start a thread.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpawnFailure {
    #[error("insufficient resources to create new thread")]
    InsufficientResources,

    #[error("invalid thread attributes")]
    InvalidAttributes,

    #[error("no permission to set the scheduling policy and parameters")]
    PermissionDenied,

    #[error("platform error code {0}")]
    Os(i32),

    #[error("{0}")]
    Other(String),
}

impl SpawnFailure {
    #[cfg(unix)]
    pub fn from_errno(code: i32) -> Self {
        match code {
            libc::EAGAIN => SpawnFailure::InsufficientResources,
            libc::EINVAL => SpawnFailure::InvalidAttributes,
            libc::EPERM => SpawnFailure::PermissionDenied,
            other => SpawnFailure::Os(other),
        }
    }

    #[cfg(not(unix))]
    pub fn from_errno(code: i32) -> Self {
        SpawnFailure::Os(code)
    }

    pub fn from_io(err: &std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => SpawnFailure::from_errno(code),
            None if err.kind() == std::io::ErrorKind::OutOfMemory => {
                SpawnFailure::InsufficientResources
            }
            None => SpawnFailure::Other(err.to_string()),
        }
    }
}

/// Why joining a thread did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinFailure {
    #[error("a deadlock was detected")]
    Deadlock,

    #[error("thread is not a joinable thread")]
    NotJoinable,

    #[error("no thread with this id could be found")]
    NotFound,

    #[error("thread panicked")]
    Panicked,

    #[error("platform error code {0}")]
    Os(i32),
}

impl JoinFailure {
    #[cfg(unix)]
    pub fn from_errno(code: i32) -> Self {
        match code {
            libc::EDEADLK => JoinFailure::Deadlock,
            libc::EINVAL => JoinFailure::NotJoinable,
            libc::ESRCH => JoinFailure::NotFound,
            other => JoinFailure::Os(other),
        }
    }

    #[cfg(not(unix))]
    pub fn from_errno(code: i32) -> Self {
        JoinFailure::Os(code)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ThreadError::ResourceExhausted { capacity: 64 };
        assert!(err.to_string().contains("full"));
        assert!(err.to_string().contains("64"));

        let err = ThreadError::SpawnFailed(SpawnFailure::InsufficientResources);
        assert!(err.to_string().contains("Failed to spawn"));
        assert!(err.to_string().contains("insufficient resources"));

        let err = ThreadError::InvalidId(-1);
        assert!(err.to_string().contains("Invalid thread id -1"));

        let err = ThreadError::JoinFailed {
            id: ThreadId::new(3),
            reason: JoinFailure::Deadlock,
        };
        assert!(err.to_string().contains("join thread 3"));
        assert!(err.to_string().contains("deadlock"));

        let err = ConfigError::Invalid("stack_size too small".to_string());
        assert!(err.to_string().contains("Invalid config"));
        assert!(err.to_string().contains("stack_size"));
    }

    #[test]
    fn test_error_codes_are_distinct_and_negative() {
        let errors = [
            ThreadError::ResourceExhausted { capacity: 1 },
            ThreadError::SpawnFailed(SpawnFailure::Os(1)),
            ThreadError::InvalidId(99),
            ThreadError::JoinFailed {
                id: ThreadId::new(0),
                reason: JoinFailure::NotFound,
            },
            ThreadError::AlreadyInitialized,
            ThreadError::InvalidConfig(ConfigError::Invalid("x".to_string())),
        ];
        let mut codes: Vec<i32> = errors.iter().map(ThreadError::code).collect();
        assert!(codes.iter().all(|c| *c < 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[cfg(unix)]
    #[test]
    fn test_errno_mapping() {
        assert_eq!(
            SpawnFailure::from_errno(libc::EAGAIN),
            SpawnFailure::InsufficientResources
        );
        assert_eq!(SpawnFailure::from_errno(libc::EPERM), SpawnFailure::PermissionDenied);
        assert_eq!(JoinFailure::from_errno(libc::EDEADLK), JoinFailure::Deadlock);
        assert_eq!(JoinFailure::from_errno(libc::ESRCH), JoinFailure::NotFound);
        assert_eq!(JoinFailure::from_errno(libc::EINVAL), JoinFailure::NotJoinable);
    }

    #[test]
    fn test_spawn_failure_from_io() {
        let err = std::io::Error::other("boom");
        assert_eq!(SpawnFailure::from_io(&err), SpawnFailure::Other("boom".to_string()));
    }
}
