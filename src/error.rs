//! Error types for tabql.
//!
//! Minimal error types for a pure in-memory engine (no server dependencies).

use thiserror::Error;

/// tabql error type
#[derive(Error, Debug)]
pub enum TabqlError {
    #[error("Spec error: {0}")]
    SpecError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Type error: {0}")]
    TypeError(String),
}

/// Result type for tabql operations
pub type TabqlResult<T> = Result<T, TabqlError>;

impl serde::Serialize for TabqlError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TabqlError::SpecError("invalid query spec JSON".to_string());
        assert_eq!(err.to_string(), "Spec error: invalid query spec JSON");

        let err = TabqlError::ExecutionError("expression too deep".to_string());
        assert_eq!(err.to_string(), "Execution error: expression too deep");

        let err = TabqlError::TypeError("expected object".to_string());
        assert_eq!(err.to_string(), "Type error: expected object");
    }

    #[test]
    fn test_error_serializes_as_display_string() {
        let err = TabqlError::SpecError("bad".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Spec error: bad\"");
    }
}
