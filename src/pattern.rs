//! Test patterns for driving outputs without an upstream graph.
//!
//! - [`PatternKind::Chase`] - one lit module walking through the grid in
//!   logical order, handy for checking module mapping by eye
//! - [`PatternKind::Gradient`] - brightness ramp across the grid that shifts
//!   every tick
//! - [`PatternKind::Solid`] - every module the same value

use crate::config::PatternConfig;
use crate::pipeline::frame::{Frame, FrameBatch};
use serde::{Deserialize, Serialize};

/// Pattern shapes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    #[default]
    Chase,
    Gradient,
    Solid,
}

/// Produces one [`FrameBatch`] per tick.
#[derive(Debug, Clone)]
pub struct TestPattern {
    kind: PatternKind,
    width: u32,
    height: u32,
    bytes_per_module: usize,
}

impl TestPattern {
    pub fn new(kind: PatternKind, width: u32, height: u32, bytes_per_module: usize) -> Self {
        Self {
            kind,
            width,
            height,
            bytes_per_module,
        }
    }

    pub fn from_config(config: &PatternConfig) -> Self {
        Self::new(
            config.kind,
            config.width,
            config.height,
            config.bytes_per_module,
        )
    }

    pub fn module_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// The batch for `tick`, in logical (row-major) order.
    pub fn batch(&self, tick: u64) -> FrameBatch {
        let count = self.module_count();
        let frames = (0..count)
            .map(|i| Frame::filled(self.bytes_per_module, self.level(i, count, tick)))
            .collect();
        FrameBatch::new(self.width, self.height, frames)
    }

    fn level(&self, index: usize, count: usize, tick: u64) -> u8 {
        match self.kind {
            PatternKind::Chase => {
                if count > 0 && index as u64 == tick % count as u64 {
                    u8::MAX
                } else {
                    0
                }
            }
            PatternKind::Gradient => {
                let step = 256 / count.max(1) as u64;
                ((index as u64 * step + tick) % 256) as u8
            }
            PatternKind::Solid => (tick % 256) as u8,
        }
    }
}
