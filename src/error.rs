//! Error types for the facade
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Facade Error Enum ==
/// Unified error type for the facade and its store backends.
#[derive(Error, Debug)]
pub enum FacadeError {
    /// Error raised by the Redis client, passed through unchanged
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    /// Value could not be encoded before writing
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored value does not decode as the requested type
    #[error("Type mismatch for key {key}: {source}")]
    TypeMismatch {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Operation against a key holding the wrong kind of value
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value: {0}")]
    WrongType(String),

    /// Counter value is not an integer
    #[error("Value is not an integer or out of range: {0}")]
    NotAnInteger(String),

    /// Rejected argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

// == Result Type Alias ==
/// Convenience Result type for the facade.
pub type Result<T> = std::result::Result<T, FacadeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_message_names_key() {
        let source = serde_json::from_slice::<u32>(b"\"text\"").unwrap_err();
        let err = FacadeError::TypeMismatch {
            key: "user:1".to_string(),
            source,
        };
        assert!(err.to_string().contains("user:1"));
    }

    #[test]
    fn test_redis_error_is_transparent() {
        let redis_err = redis::RedisError::from((redis::ErrorKind::IoError, "connection refused"));
        let expected = redis_err.to_string();
        let err: FacadeError = redis_err.into();
        assert_eq!(err.to_string(), expected);
    }
}
