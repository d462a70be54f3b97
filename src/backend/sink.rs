//! FrameSink trait for the unified transport interface
//!
//! Every transport (serial hardware, Open Pixel Control over TCP, or a
//! test double) implements [`FrameSink`]. Sinks never return per-frame errors:
//! a batch is either sent or dropped, and the reason for a drop is reported
//! through [`AcceptOutcome`] and counted in [`SinkStats`].

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::frame::FrameBatch;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Why a sink discarded a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The connection is not open (still connecting, or closed).
    TransportUnavailable,
    /// A previous send is still in flight, or the minimum delay has not elapsed.
    Overloaded,
    /// Writing to the transport failed.
    TransportIo,
    /// The batch carried no frame for any destination.
    EmptyBatch,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::TransportUnavailable => write!(f, "transport unavailable"),
            DropReason::Overloaded => write!(f, "overloaded"),
            DropReason::TransportIo => write!(f, "transport IO error"),
            DropReason::EmptyBatch => write!(f, "empty batch"),
        }
    }
}

impl From<DropReason> for PipelineError {
    fn from(reason: DropReason) -> Self {
        match reason {
            DropReason::TransportUnavailable => PipelineError::TransportUnavailable,
            DropReason::Overloaded => PipelineError::Overloaded,
            DropReason::TransportIo => PipelineError::TransportIo(std::io::Error::new(
                std::io::ErrorKind::Other,
                "write to transport failed",
            )),
            DropReason::EmptyBatch => PipelineError::EmptyBatch,
        }
    }
}

/// Result of handing a batch to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// Every frame was written.
    Sent,
    /// Some destinations received their frame, others did not.
    Partial { delivered: usize, failed: usize },
    /// Nothing was written.
    Dropped(DropReason),
}

impl AcceptOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, AcceptOutcome::Sent)
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            AcceptOutcome::Dropped(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Trait implemented by every frame transport.
///
/// All methods take `&self`: a sink is shared between the registry and any
/// in-flight deliveries, and guards its own connection.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Human-readable name of this sink, used in logs.
    fn name(&self) -> &str;

    /// Transmit a batch, or drop it without blocking on a busy transport.
    async fn accept(&self, batch: FrameBatch) -> AcceptOutcome;

    /// Release the transport. Must be safe to call more than once.
    async fn close(&self) -> PipelineResult<()>;

    /// Current counters.
    fn stats(&self) -> SinkStatsSnapshot;
}

/// Lets a repeating drop warn once; later drops are only counted until the
/// latch is re-armed by a state change.
#[derive(Debug, Default)]
pub(crate) struct WarnLatch(AtomicBool);

impl WarnLatch {
    /// True for the first call after construction or [`WarnLatch::rearm`].
    pub(crate) fn first(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn rearm(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Lock-free delivery counters shared by all sink implementations.
#[derive(Debug, Default)]
pub struct SinkStats {
    sent: AtomicU64,
    partial: AtomicU64,
    dropped_unavailable: AtomicU64,
    dropped_overloaded: AtomicU64,
    dropped_empty: AtomicU64,
    io_errors: AtomicU64,
}

impl SinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an outcome.
    pub fn record(&self, outcome: AcceptOutcome) {
        let counter = match outcome {
            AcceptOutcome::Sent => &self.sent,
            AcceptOutcome::Partial { .. } => &self.partial,
            AcceptOutcome::Dropped(DropReason::TransportUnavailable) => &self.dropped_unavailable,
            AcceptOutcome::Dropped(DropReason::Overloaded) => &self.dropped_overloaded,
            AcceptOutcome::Dropped(DropReason::TransportIo) => &self.io_errors,
            AcceptOutcome::Dropped(DropReason::EmptyBatch) => &self.dropped_empty,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an I/O error that did not by itself decide the batch outcome.
    pub fn record_io_error(&self) {
        self.io_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SinkStatsSnapshot {
        SinkStatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            partial: self.partial.load(Ordering::Relaxed),
            dropped_unavailable: self.dropped_unavailable.load(Ordering::Relaxed),
            dropped_overloaded: self.dropped_overloaded.load(Ordering::Relaxed),
            dropped_empty: self.dropped_empty.load(Ordering::Relaxed),
            io_errors: self.io_errors.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`SinkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStatsSnapshot {
    pub sent: u64,
    pub partial: u64,
    pub dropped_unavailable: u64,
    pub dropped_overloaded: u64,
    pub dropped_empty: u64,
    pub io_errors: u64,
}

impl SinkStatsSnapshot {
    /// Batches that did not reach any destination.
    pub fn dropped(&self) -> u64 {
        self.dropped_unavailable + self.dropped_overloaded + self.dropped_empty
    }

    /// Logs a summary if anything was lost.
    pub fn log_summary(&self, name: &str) {
        if self.dropped() > 0 || self.io_errors > 0 {
            tracing::warn!(
                "{} dropped {} batches ({} unavailable, {} overloaded, {} empty), {} IO errors, {} sent",
                name,
                self.dropped(),
                self.dropped_unavailable,
                self.dropped_overloaded,
                self.dropped_empty,
                self.io_errors,
                self.sent
            );
        }
    }
}
