//! Frame transports.
//!
//! Every output is a [`FrameSink`]: it accepts a batch of frames in physical
//! order and either sends it or drops it. Sinks never queue and never return
//! per-batch errors; drops are logged and counted in [`SinkStats`].
//!
//! # Components
//!
//! - [`SerialSink`] - one serial port, opened in the background, with a
//!   single in-flight write and an optional minimum delay between writes
//! - [`NetworkFanoutSink`] - one Open Pixel Control TCP endpoint per frame index
//! - [`AnySink`] - enum dispatch over the built-in sinks plus boxed plugins
//! - [`SinkConfig`] - the settings a sink is built from; two equal configs
//!   describe the same connection
//! - `RecordingLink` - in-memory serial link (tests and the `mock-serial`
//!   feature)
//!
//! # Example
//!
//! ```ignore
//! use pixelflow_rs::backend::{FanoutConfig, FrameSink, SinkConfig};
//!
//! let sink = SinkConfig::NetworkFanout(FanoutConfig::new(["10.0.0.1", "10.0.0.2"])).build();
//! let outcome = sink.accept(batch).await;
//! sink.close().await?;
//! ```

pub mod opc;
#[cfg(any(test, feature = "mock-serial"))]
pub mod recording_link;
pub mod serial;
pub mod sink;

pub use opc::{FanoutConfig, NetworkFanoutSink};
#[cfg(any(test, feature = "mock-serial"))]
pub use recording_link::{RecordingLink, RecordingLinkHandle};
pub use serial::{SerialConfig, SerialLink, SerialSink, SerialState};
pub use sink::{AcceptOutcome, DropReason, FrameSink, SinkStats, SinkStatsSnapshot};

use crate::pipeline::error::PipelineResult;
use crate::pipeline::frame::FrameBatch;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Settings a sink is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    Serial(SerialConfig),
    NetworkFanout(FanoutConfig),
}

impl SinkConfig {
    /// Builds the sink. Serial ports start opening in the background, so this
    /// must run inside a tokio runtime.
    pub fn build(&self) -> AnySink {
        match self {
            SinkConfig::Serial(cfg) => AnySink::Serial(SerialSink::new(cfg.clone())),
            SinkConfig::NetworkFanout(cfg) => {
                AnySink::NetworkFanout(NetworkFanoutSink::new(cfg.clone()))
            }
        }
    }
}

/// Holds a built-in sink (enum dispatch) or a plugin (trait object).
pub enum AnySink {
    Serial(SerialSink),
    NetworkFanout(NetworkFanoutSink),
    Plugin(Box<dyn FrameSink>),
}

impl AnySink {
    pub fn plugin(sink: impl FrameSink + 'static) -> Self {
        AnySink::Plugin(Box::new(sink))
    }

    pub fn as_serial(&self) -> Option<&SerialSink> {
        match self {
            AnySink::Serial(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_network(&self) -> Option<&NetworkFanoutSink> {
        match self {
            AnySink::NetworkFanout(s) => Some(s),
            _ => None,
        }
    }
}

#[async_trait]
impl FrameSink for AnySink {
    fn name(&self) -> &str {
        match self {
            AnySink::Serial(s) => s.name(),
            AnySink::NetworkFanout(s) => s.name(),
            AnySink::Plugin(s) => s.name(),
        }
    }

    async fn accept(&self, batch: FrameBatch) -> AcceptOutcome {
        match self {
            AnySink::Serial(s) => s.accept(batch).await,
            AnySink::NetworkFanout(s) => s.accept(batch).await,
            AnySink::Plugin(s) => s.accept(batch).await,
        }
    }

    async fn close(&self) -> PipelineResult<()> {
        match self {
            AnySink::Serial(s) => s.close().await,
            AnySink::NetworkFanout(s) => s.close().await,
            AnySink::Plugin(s) => s.close().await,
        }
    }

    fn stats(&self) -> SinkStatsSnapshot {
        match self {
            AnySink::Serial(s) => s.stats(),
            AnySink::NetworkFanout(s) => s.stats(),
            AnySink::Plugin(s) => s.stats(),
        }
    }
}

impl std::fmt::Debug for AnySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnySink::Serial(s) => s.fmt(f),
            AnySink::NetworkFanout(s) => s.fmt(f),
            AnySink::Plugin(s) => write!(f, "Plugin({})", s.name()),
        }
    }
}

/// Serde helper storing a `Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
