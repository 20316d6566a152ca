//! Error types for epochal.
//!
//! Every variant is fatal to the phase that raised it: nothing here is
//! downgraded to a log line, and `Experimenter::run` propagates all of them.

use std::path::{Path, PathBuf};

/// Top-level error type for experiment operations.
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Numeric error in {context}: value {value} is not finite")]
    Numeric { context: String, value: f64 },

    #[error("Consistency error: {message}")]
    Consistency { message: String },

    #[error("Checkpoint encoding error: {0}")]
    Checkpoint(#[from] bincode::Error),

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Model error: {message}")]
    Model { message: String },

    #[error("Data error: {message}")]
    Data { message: String },
}

/// Errors raised while building or loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("Configuration file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Configuration load error: {0}")]
    Load(#[from] Box<figment::Error>),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ExperimentError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn numeric(context: impl Into<String>, value: f64) -> Self {
        Self::Numeric {
            context: context.into(),
            value,
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
        }
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    /// Check that a scalar produced during training is finite.
    pub fn ensure_finite(context: &str, value: f64) -> Result<f64> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Self::numeric(context, value))
        }
    }
}

/// Result alias for experiment operations.
pub type Result<T> = std::result::Result<T, ExperimentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ExperimentError::Config(ConfigError::invalid("epochs", "must be > 0"));
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid value for epochs: must be > 0"
        );
    }

    #[test]
    fn test_io_error_includes_path() {
        let err = ExperimentError::io(
            "/tmp/run/train/model.pt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/run/train/model.pt"), "got: {msg}");
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_ensure_finite() {
        assert_eq!(ExperimentError::ensure_finite("loss", 0.25).unwrap(), 0.25);
        assert!(matches!(
            ExperimentError::ensure_finite("loss", f64::NAN),
            Err(ExperimentError::Numeric { .. })
        ));
        assert!(matches!(
            ExperimentError::ensure_finite("loss", f64::INFINITY),
            Err(ExperimentError::Numeric { .. })
        ));
    }
}
