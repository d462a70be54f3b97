//! Open Pixel Control fan-out sink.
//!
//! A [`NetworkFanoutSink`] owns one TCP endpoint per destination address.
//! Frame `i` of a batch goes to endpoint `i`; all endpoints are written
//! concurrently and a failing endpoint never holds up the others.
//!
//! Each frame travels as one OPC message:
//!
//! ```text
//! +---------+---------+--------+--------+----------------+
//! | channel | command | len_hi | len_lo | data (len)     |
//! +---------+---------+--------+--------+----------------+
//! ```

use crate::backend::sink::{
    AcceptOutcome, DropReason, FrameSink, SinkStats, SinkStatsSnapshot, WarnLatch,
};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::frame::{Frame, FrameBatch};
use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Port used when an address does not name one.
pub const DEFAULT_OPC_PORT: u16 = 7890;

/// Default bound on establishing a TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// OPC command 0: set pixel colours.
pub const OPC_SET_PIXELS: u8 = 0;

/// Largest payload an OPC header can describe.
pub const MAX_OPC_PAYLOAD: usize = u16::MAX as usize;

/// Settings identifying one fan-out sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutConfig {
    /// `host:port` per frame index.
    pub addresses: Vec<String>,
    /// OPC channel written into every header.
    #[serde(default)]
    pub channel: u8,
    #[serde(
        with = "crate::backend::duration_ms",
        default = "default_connect_timeout"
    )]
    pub connect_timeout: Duration,
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

impl FanoutConfig {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            addresses: addresses
                .into_iter()
                .map(|a| normalize_address(a.as_ref()))
                .collect(),
            channel: 0,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Appends [`DEFAULT_OPC_PORT`] to addresses without a port.
pub fn normalize_address(address: &str) -> String {
    let address = address.trim();
    let has_port = address
        .rsplit_once(':')
        .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
        .unwrap_or(false);
    if has_port {
        address.to_string()
    } else {
        format!("{}:{}", address, DEFAULT_OPC_PORT)
    }
}

/// Builds one OPC message carrying `data`, truncated to [`MAX_OPC_PAYLOAD`].
pub fn encode_message(channel: u8, data: &[u8]) -> Vec<u8> {
    let data = &data[..data.len().min(MAX_OPC_PAYLOAD)];
    let len = data.len() as u16;
    let mut message = Vec::with_capacity(4 + data.len());
    message.push(channel);
    message.push(OPC_SET_PIXELS);
    message.extend_from_slice(&len.to_be_bytes());
    message.extend_from_slice(data);
    message
}

enum EndpointSend {
    Sent,
    Busy,
    Failed(io::Error),
}

/// One destination with a lazily opened TCP stream.
struct OpcEndpoint {
    address: String,
    connect_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
    closed: AtomicBool,
}

impl OpcEndpoint {
    fn new(address: String, connect_timeout: Duration) -> Self {
        Self {
            address,
            connect_timeout,
            stream: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connecting to {} timed out", self.address),
                )
            })??;
        stream.set_nodelay(true)?;
        tracing::debug!("Connected to OPC server {}", self.address);
        Ok(stream)
    }

    async fn send(&self, channel: u8, frame: &Frame) -> EndpointSend {
        let Ok(mut slot) = self.stream.try_lock() else {
            return EndpointSend::Busy;
        };

        if slot.is_none() {
            match self.connect().await {
                Ok(stream) => *slot = Some(stream),
                Err(e) => return EndpointSend::Failed(e),
            }
        }
        let Some(stream) = slot.as_mut() else {
            return EndpointSend::Failed(io::ErrorKind::NotConnected.into());
        };

        if frame.len() > MAX_OPC_PAYLOAD {
            tracing::warn!(
                "Frame of {} bytes for {} truncated to {}",
                frame.len(),
                self.address,
                MAX_OPC_PAYLOAD
            );
        }
        let message = encode_message(channel, frame.as_bytes());

        let result = stream.write_all(&message).await;
        if result.is_err() || self.closed.load(Ordering::Acquire) {
            // reconnect on the next batch
            slot.take();
        }
        match result {
            Ok(()) => EndpointSend::Sent,
            Err(e) => EndpointSend::Failed(e),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Ok(mut slot) = self.stream.try_lock() {
            if let Some(mut stream) = slot.take() {
                if let Err(e) = stream.shutdown().await {
                    tracing::debug!("Shutdown of {} failed: {}", self.address, e);
                }
            }
        }
    }
}

/// Sink sending frame `i` of each batch to address `i`.
pub struct NetworkFanoutSink {
    name: String,
    config: FanoutConfig,
    endpoints: Vec<OpcEndpoint>,
    closed: AtomicBool,
    unavailable_warning: WarnLatch,
    shape_warning: WarnLatch,
    stats: SinkStats,
}

impl NetworkFanoutSink {
    /// Creates the sink. No connection is made until the first batch.
    pub fn new(config: FanoutConfig) -> Self {
        let endpoints = config
            .addresses
            .iter()
            .map(|a| OpcEndpoint::new(a.clone(), config.connect_timeout))
            .collect();
        Self {
            name: format!("opc-fanout[{}]", config.addresses.join(", ")),
            config,
            endpoints,
            closed: AtomicBool::new(false),
            unavailable_warning: WarnLatch::default(),
            shape_warning: WarnLatch::default(),
            stats: SinkStats::new(),
        }
    }

    pub fn config(&self) -> &FanoutConfig {
        &self.config
    }

    /// Destination addresses in frame-index order.
    pub fn addresses(&self) -> &[String] {
        &self.config.addresses
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl FrameSink for NetworkFanoutSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn accept(&self, batch: FrameBatch) -> AcceptOutcome {
        if self.is_closed() || self.endpoints.is_empty() {
            if self.unavailable_warning.first() {
                let why = if self.is_closed() { "closed" } else { "without addresses" };
                tracing::warn!("{} is {}, dropping batches", self.name, why);
            } else {
                tracing::trace!("{} unavailable, dropping batch", self.name);
            }
            let outcome = AcceptOutcome::Dropped(DropReason::TransportUnavailable);
            self.stats.record(outcome);
            return outcome;
        }

        if batch.is_empty() {
            if self.shape_warning.first() {
                tracing::warn!("{} received a batch without frames, dropping it", self.name);
            }
            let outcome = AcceptOutcome::Dropped(DropReason::EmptyBatch);
            self.stats.record(outcome);
            return outcome;
        }

        let endpoint_count = self.endpoints.len();
        if batch.len() < endpoint_count {
            if self.shape_warning.first() {
                tracing::warn!(
                    "{}: batch has {} frames for {} addresses, the rest get nothing",
                    self.name,
                    batch.len(),
                    endpoint_count
                );
            }
        } else {
            if batch.len() > endpoint_count {
                tracing::debug!(
                    "{}: ignoring {} frames beyond the last address",
                    self.name,
                    batch.len() - endpoint_count
                );
            }
            self.shape_warning.rearm();
        }

        let channel = self.config.channel;
        let results = join_all(
            self.endpoints
                .iter()
                .zip(batch.iter())
                .map(|(endpoint, frame)| endpoint.send(channel, frame)),
        )
        .await;

        let (mut delivered, mut failed) = (0, 0);
        for (endpoint, result) in self.endpoints.iter().zip(results) {
            match result {
                EndpointSend::Sent => delivered += 1,
                EndpointSend::Busy => {
                    tracing::warn!("Dropping frame for {}, previous send in progress", endpoint.address);
                }
                EndpointSend::Failed(e) => {
                    failed += 1;
                    self.stats.record_io_error();
                    tracing::error!("Send to {} failed: {}", endpoint.address, e);
                }
            }
        }

        // addresses without a frame count as not delivered
        let outcome = if delivered == endpoint_count {
            AcceptOutcome::Sent
        } else if delivered > 0 {
            AcceptOutcome::Partial {
                delivered,
                failed: endpoint_count - delivered,
            }
        } else if failed > 0 {
            AcceptOutcome::Dropped(DropReason::TransportIo)
        } else {
            AcceptOutcome::Dropped(DropReason::Overloaded)
        };

        // failures were already counted per endpoint
        if outcome != AcceptOutcome::Dropped(DropReason::TransportIo) {
            self.stats.record(outcome);
        }
        outcome
    }

    async fn close(&self) -> PipelineResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        join_all(self.endpoints.iter().map(|e| e.close())).await;
        tracing::info!("Closed {}", self.name);
        self.stats().log_summary(&self.name);
        Ok(())
    }

    fn stats(&self) -> SinkStatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for NetworkFanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkFanoutSink")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}
