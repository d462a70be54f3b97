//! Pipeline-specific error types.

use crate::pipeline::id::NodeId;
use thiserror::Error;

/// Errors that can occur within the frame pipeline.
///
/// Per-frame delivery failures (`TransportUnavailable`, `Overloaded`,
/// `TransportIo`) are contained inside the sinks and only show up here when a
/// sink reports why it dropped a batch. Structural failures
/// (`DimensionMismatch`, `InvalidMapping`) are returned to the caller.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Frame count mismatch: expected {expected} frames, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Configuration incomplete: {0}")]
    ConfigIncomplete(String),

    #[error("Invalid mapping parameters: {0}")]
    InvalidMapping(String),

    #[error("Invalid value for '{key}': {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Transport not open")]
    TransportUnavailable,

    #[error("Transport busy, previous send still in flight or rate limited")]
    Overloaded,

    #[error("Batch carried no frames")]
    EmptyBatch,

    #[error("Transport IO error: {0}")]
    TransportIo(#[from] std::io::Error),

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
