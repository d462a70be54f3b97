//! Frame data model.
//!
//! A `Frame` is the pixel payload of one physical module. It is immutable and
//! reference counted, so handing a frame to several endpoints never copies the
//! pixel bytes. A `FrameBatch` is the unit that flows between nodes: the frames
//! of a `width × height` grid of modules in logical (row-major) order.

use crate::pipeline::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pixel data of one module (pixels × bytes-per-pixel).
#[derive(Clone, PartialEq, Eq)]
pub struct Frame(Arc<[u8]>);

impl Frame {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    /// A frame of `len` bytes all set to `value`.
    pub fn filled(len: usize, value: u8) -> Self {
        Self(vec![value; len].into())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether two frames share the same underlying buffer.
    pub fn ptr_eq(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl From<&[u8]> for Frame {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame").field("len", &self.0.len()).finish()
    }
}

/// Frames of a `width × height` module grid. Index = `y * width + x`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FrameBatchPayload", into = "FrameBatchPayload")]
pub struct FrameBatch {
    pub width: u32,
    pub height: u32,
    frames: Vec<Frame>,
}

impl FrameBatch {
    pub fn new(width: u32, height: u32, frames: Vec<Frame>) -> Self {
        Self {
            width,
            height,
            frames,
        }
    }

    /// Number of frames the grid dimensions call for.
    #[inline]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Fails with `DimensionMismatch` unless `len == width * height`.
    pub fn validate(&self) -> PipelineResult<()> {
        let expected = self.expected_len();
        if self.frames.len() != expected {
            return Err(PipelineError::DimensionMismatch {
                expected,
                actual: self.frames.len(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// Total number of pixel bytes across all frames.
    pub fn byte_len(&self) -> usize {
        self.frames.iter().map(Frame::len).sum()
    }
}

impl std::fmt::Debug for FrameBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBatch")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frames", &self.frames.len())
            .finish()
    }
}

/// Wire shape of a batch as the graph engine delivers it.
#[derive(Clone, Serialize, Deserialize)]
struct FrameBatchPayload {
    width: u32,
    height: u32,
    frames: Vec<Vec<u8>>,
}

impl From<FrameBatchPayload> for FrameBatch {
    fn from(payload: FrameBatchPayload) -> Self {
        FrameBatch::new(
            payload.width,
            payload.height,
            payload.frames.into_iter().map(Frame::from).collect(),
        )
    }
}

impl From<FrameBatch> for FrameBatchPayload {
    fn from(batch: FrameBatch) -> Self {
        FrameBatchPayload {
            width: batch.width,
            height: batch.height,
            frames: batch
                .frames
                .iter()
                .map(|frame| frame.as_bytes().to_vec())
                .collect(),
        }
    }
}
