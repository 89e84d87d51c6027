//! Error types for Project Ember.

use thiserror::Error;

/// Top-level error type for Ember operations.
#[derive(Debug, Error)]
pub enum EmberError {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading tuning and archetype data.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Document could not be parsed
    #[error("Failed to parse {format} document: {message}")]
    Parse {
        /// Format name (ron, json, toml)
        format: &'static str,
        /// Parser message
        message: String,
    },

    /// Document could not be serialized
    #[error("Failed to serialize {format} document: {message}")]
    Serialize {
        /// Format name (ron, json, toml)
        format: &'static str,
        /// Serializer message
        message: String,
    },

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Actual version found
        actual: String,
    },

    /// A value is outside its allowed range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigError {
    /// Builds a parse error from any displayable parser error.
    pub fn parse(format: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            format,
            message: err.to_string(),
        }
    }

    /// Builds a serialize error from any displayable serializer error.
    pub fn serialize(format: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Serialize {
            format,
            message: err.to_string(),
        }
    }

    /// Builds an invalid-value error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for Ember operations.
pub type EmberResult<T> = Result<T, EmberError>;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::parse("ron", "unexpected token");
        assert_eq!(
            err.to_string(),
            "Failed to parse ron document: unexpected token"
        );

        let err = ConfigError::invalid("gravity", "must be positive");
        assert!(err.to_string().contains("gravity"));
    }

    #[test]
    fn test_config_error_into_ember_error() {
        let err: EmberError = ConfigError::VersionMismatch {
            expected: "1.0.0".to_string(),
            actual: "2.0.0".to_string(),
        }
        .into();
        assert!(matches!(err, EmberError::Config(_)));
    }
}
