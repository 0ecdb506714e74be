//! Error types for IDPC plugin identity handling.

use thiserror::Error;

/// Result type alias for identity operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for version and descriptor parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid version {input:?}: {reason}")]
    InvalidVersion { input: String, reason: String },

    #[error("unknown plugin type: {0:?}")]
    UnknownPluginType(String),
}

impl Error {
    /// Returns the error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidVersion { .. } => 10,
            Error::UnknownPluginType(_) => 11,
        }
    }

    pub(crate) fn invalid_version(input: &str, reason: impl Into<String>) -> Self {
        Error::InvalidVersion {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(Error::invalid_version("x", "bad").code(), 10);
        assert_eq!(Error::UnknownPluginType("x".into()).code(), 11);
    }

    #[test]
    fn test_invalid_version_message() {
        let err = Error::invalid_version("1.2", "expected major.minor.patch");
        assert_eq!(
            err.to_string(),
            "invalid version \"1.2\": expected major.minor.patch"
        );
    }
}
