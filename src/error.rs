//! Error handling for pixelflow
//!
//! This module defines the crate-level error type and a Result alias. Errors
//! raised inside the frame pipeline use [`PipelineError`] and convert into
//! [`PixelFlowError`] when they cross into configuration or process code.

use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for pixelflow operations
#[derive(Error, Debug)]
pub enum PixelFlowError {
    /// Errors raised by the frame pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Errors related to opening or configuring a serial port
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PixelFlowError>,
    },
}

impl PixelFlowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PixelFlowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<toml::de::Error> for PixelFlowError {
    fn from(err: toml::de::Error) -> Self {
        PixelFlowError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for PixelFlowError {
    fn from(err: toml::ser::Error) -> Self {
        PixelFlowError::Serialization(err.to_string())
    }
}

/// Result type alias for pixelflow operations
pub type Result<T> = std::result::Result<T, PixelFlowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<PixelFlowError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PixelFlowError::Config("missing [runtime] table".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: missing [runtime] table"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = PixelFlowError::Config("test".to_string());
        let with_ctx = err.with_context("Failed to load project");
        assert!(with_ctx.to_string().contains("Failed to load project"));
    }

    #[test]
    fn test_pipeline_error_converts() {
        let err: PixelFlowError = PipelineError::DimensionMismatch {
            expected: 4,
            actual: 3,
        }
        .into();
        assert!(err.to_string().contains("expected 4"));
    }

    #[test]
    fn test_result_ext_on_io_error() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        let err = res.context("Reading project").unwrap_err();
        assert!(err.to_string().starts_with("Reading project"));
    }
}
