//! Error types
//!
//! Configuration errors are raised by setters and leave the persisted
//! converter settings untouched. Conversion errors are raised per call.

use std::path::PathBuf;

use thiserror::Error;

use crate::format::Format;

/// Invalid input given to a configuration call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("input format should be Glsl or Unspecified but got {0}")]
    UnsupportedInputFormat(Format),

    #[error("output format should be Spirv or Unspecified but got {0}")]
    UnsupportedOutputFormat(Format),

    #[error("input format version should be one of supported GLSL #version strings but got {0:?}")]
    UnknownVersion(String),

    #[error("output format version target should be opengl4.5 or vulkanX.Y but got {0:?}")]
    UnknownTarget(String),

    #[error("output format version language should be spvX.Y but got {0:?}")]
    MalformedSpirvVersion(String),

    #[error("output format version language should be spv1.0 to spv1.5 but got {0:?}")]
    SpirvVersionOutOfRange(String),

    #[error("unknown shader stage {0:?}")]
    UnknownStage(String),

    #[error("invalid definition name {0:?}")]
    InvalidDefinitionName(String),

    #[error("malformed configuration document: {0}")]
    MalformedDocument(String),

    #[error("configuration key {key} should be {expected}")]
    WrongValueType { key: String, expected: &'static str },
}

/// Failure of a single convert call.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{0}")]
    Resolution(String),

    #[error("compilation failed:\n{diagnostics}")]
    Backend { diagnostics: String },

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backend runtime is not initialized")]
    NotInitialized,

    #[error("backend produced a malformed module: {0}")]
    MalformedOutput(String),
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    /// Diagnostic text reported by the backend, if this is a backend failure.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            ConvertError::Backend { diagnostics } => Some(diagnostics),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::UnknownVersion("230".to_string());
        assert_eq!(
            err.to_string(),
            "input format version should be one of supported GLSL #version strings but got \"230\""
        );

        let err = ConfigError::UnsupportedOutputFormat(Format::Glsl);
        assert!(err.to_string().contains("Glsl"));
    }

    #[test]
    fn test_backend_diagnostics_accessor() {
        let err = ConvertError::Backend {
            diagnostics: "ERROR: 0:1: 'main' : syntax error".to_string(),
        };
        assert_eq!(err.diagnostics(), Some("ERROR: 0:1: 'main' : syntax error"));
        assert!(ConvertError::NotInitialized.diagnostics().is_none());
    }
}
