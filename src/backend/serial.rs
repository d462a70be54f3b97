//! Serial transport sink.
//!
//! Opens a serial port in the background after a settle delay, then writes
//! each batch as one contiguous buffer and drains it before the next batch is
//! allowed through. A batch arriving while a write is in flight, or before
//! `min_delay` has passed since the last completed write, is dropped.
//!
//! ```text
//!  new() ──► Connecting ──(open ok)──► Open ──(close / fatal IO)──► Closed
//!                 │                                                  ▲
//!                 └──────────────(open failed / close())─────────────┘
//! ```

use crate::backend::sink::{
    AcceptOutcome, DropReason, FrameSink, SinkStats, SinkStatsSnapshot, WarnLatch,
};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::frame::FrameBatch;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Delay between creating a serial sink and opening the port.
pub const DEFAULT_OPEN_DELAY: Duration = Duration::from_millis(200);

/// Blocking read/write timeout handed to the OS port.
const PORT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Settings identifying one serial connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    pub port_name: String,
    pub baud_rate: u32,
    /// Minimum time between the end of one write and the start of the next.
    #[serde(with = "crate::backend::duration_ms")]
    pub min_delay: Duration,
    /// Wait before the port is opened.
    #[serde(with = "crate::backend::duration_ms")]
    pub open_delay: Duration,
}

impl SerialConfig {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            min_delay: Duration::ZERO,
            open_delay: DEFAULT_OPEN_DELAY,
        }
    }

    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    pub fn with_open_delay(mut self, open_delay: Duration) -> Self {
        self.open_delay = open_delay;
        self
    }
}

/// Connection lifecycle of a [`SerialSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialState {
    Connecting,
    Open,
    Closed,
}

/// An open serial connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SerialLink: Send {
    /// Queue `buf` for transmission.
    async fn write(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Wait until everything written so far has left the port.
    async fn drain(&mut self) -> io::Result<()>;
}

/// [`SerialLink`] over a real OS serial port.
///
/// The `serialport` API is blocking, so every call runs on the blocking pool.
pub struct SerialPortLink {
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialPortLink {
    pub fn new(port: Box<dyn serialport::SerialPort>) -> Self {
        Self { port: Some(port) }
    }

    async fn with_port<F>(&mut self, op: F) -> io::Result<()>
    where
        F: FnOnce(&mut Box<dyn serialport::SerialPort>) -> io::Result<()> + Send + 'static,
    {
        let mut port = self
            .port
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port lost"))?;

        let (port, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut port);
            (port, result)
        })
        .await
        .map_err(io::Error::other)?;

        self.port = Some(port);
        result
    }
}

#[async_trait]
impl SerialLink for SerialPortLink {
    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let data = buf.to_vec();
        self.with_port(move |port| port.write_all(&data)).await
    }

    async fn drain(&mut self) -> io::Result<()> {
        self.with_port(|port| port.flush()).await
    }
}

/// Names of the serial ports the OS reports.
pub fn available_ports() -> crate::error::Result<Vec<String>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Opens the OS port named in `config` after its open delay.
pub async fn open_serial_port(config: SerialConfig) -> io::Result<Box<dyn SerialLink>> {
    tokio::time::sleep(config.open_delay).await;

    let port = tokio::task::spawn_blocking(move || {
        serialport::new(&config.port_name, config.baud_rate)
            .timeout(PORT_TIMEOUT)
            .open()
    })
    .await
    .map_err(io::Error::other)??;

    Ok(Box::new(SerialPortLink::new(port)))
}

/// Errors after which the port cannot be written again.
fn is_fatal(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotFound
            | io::ErrorKind::UnexpectedEof
    )
}

struct SerialShared {
    config: SerialConfig,
    state: watch::Sender<SerialState>,
    link: tokio::sync::Mutex<Option<Box<dyn SerialLink>>>,
    transmitting: AtomicBool,
    last_transmit: Mutex<Option<Instant>>,
    unavailable_warning: WarnLatch,
    empty_warning: WarnLatch,
    stats: SinkStats,
}

impl SerialShared {
    fn state(&self) -> SerialState {
        *self.state.borrow()
    }

    /// Publishes `state`, returning the previous one.
    fn transition(&self, state: SerialState) -> SerialState {
        let previous = self.state.send_replace(state);
        if previous != state {
            self.unavailable_warning.rearm();
        }
        previous
    }

    fn throttled(&self) -> bool {
        if self.config.min_delay.is_zero() {
            return false;
        }
        let last = self.last_transmit.lock().ok().and_then(|guard| *guard);
        matches!(last, Some(at) if at.elapsed() < self.config.min_delay)
    }

    fn mark_transmitted(&self) {
        if let Ok(mut guard) = self.last_transmit.lock() {
            *guard = Some(Instant::now());
        }
    }
}

/// Sink writing frame batches to a serial port.
pub struct SerialSink {
    name: String,
    shared: Arc<SerialShared>,
    open_task: Mutex<Option<JoinHandle<()>>>,
}

impl SerialSink {
    /// Starts opening the port described by `config` in the background.
    pub fn new(config: SerialConfig) -> Self {
        let connect = open_serial_port(config.clone());
        Self::with_connector(config, connect)
    }

    /// Like [`SerialSink::new`] but opens the link with `connect` instead of
    /// the OS port.
    pub fn with_connector<F>(config: SerialConfig, connect: F) -> Self
    where
        F: Future<Output = io::Result<Box<dyn SerialLink>>> + Send + 'static,
    {
        let name = format!("serial:{}@{}", config.port_name, config.baud_rate);
        let (state, _) = watch::channel(SerialState::Connecting);
        let shared = Arc::new(SerialShared {
            config,
            state,
            link: tokio::sync::Mutex::new(None),
            transmitting: AtomicBool::new(false),
            last_transmit: Mutex::new(None),
            unavailable_warning: WarnLatch::default(),
            empty_warning: WarnLatch::default(),
            stats: SinkStats::new(),
        });

        let task_shared = shared.clone();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            match connect.await {
                Ok(link) => {
                    let mut slot = task_shared.link.lock().await;
                    if task_shared.state() == SerialState::Connecting {
                        *slot = Some(link);
                        task_shared.transition(SerialState::Open);
                        tracing::info!("Opened {}", task_name);
                    } else {
                        tracing::debug!("{} closed before the port opened", task_name);
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to open {}: {}", task_name, e);
                    task_shared.transition(SerialState::Closed);
                }
            }
        });

        Self {
            name,
            shared,
            open_task: Mutex::new(Some(handle)),
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SerialState {
        self.shared.state()
    }

    /// Whether a write is currently in flight.
    pub fn is_transmitting(&self) -> bool {
        self.shared.transmitting.load(Ordering::Acquire)
    }

    /// Waits until the sink leaves `Connecting`, returning the new state.
    pub async fn wait_ready(&self) -> SerialState {
        let mut rx = self.shared.state.subscribe();
        let state = match rx.wait_for(|s| *s != SerialState::Connecting).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }

    async fn transmit(&self, buffer: &[u8]) -> io::Result<()> {
        let mut slot = self.shared.link.lock().await;
        let link = slot
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial link missing"))?;
        link.write(buffer).await?;
        link.drain().await?;

        // close() could not take the link while we held it
        if self.state() == SerialState::Closed {
            slot.take();
        }
        Ok(())
    }
}

#[async_trait]
impl FrameSink for SerialSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn accept(&self, batch: FrameBatch) -> AcceptOutcome {
        let shared = &self.shared;

        let state = shared.state();
        if state != SerialState::Open {
            if shared.unavailable_warning.first() {
                tracing::warn!("{} is {:?}, dropping batches until it opens", self.name, state);
            } else {
                tracing::trace!("{} not open, dropping batch", self.name);
            }
            let outcome = AcceptOutcome::Dropped(DropReason::TransportUnavailable);
            shared.stats.record(outcome);
            return outcome;
        }

        if batch.byte_len() == 0 {
            if shared.empty_warning.first() {
                tracing::warn!("{} received a batch without data, dropping it", self.name);
            }
            let outcome = AcceptOutcome::Dropped(DropReason::EmptyBatch);
            shared.stats.record(outcome);
            return outcome;
        }

        if shared.throttled() {
            tracing::warn!(
                "Dropping frame on {}, less than {:?} since the last send",
                self.name,
                shared.config.min_delay
            );
            let outcome = AcceptOutcome::Dropped(DropReason::Overloaded);
            shared.stats.record(outcome);
            return outcome;
        }

        if shared
            .transmitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Dropping frame on {}, previous send still in progress", self.name);
            let outcome = AcceptOutcome::Dropped(DropReason::Overloaded);
            shared.stats.record(outcome);
            return outcome;
        }

        let mut buffer = Vec::with_capacity(batch.byte_len());
        for frame in batch.iter() {
            buffer.extend_from_slice(frame.as_bytes());
        }

        let result = self.transmit(&buffer).await;
        let outcome = match result {
            Ok(()) => {
                shared.mark_transmitted();
                AcceptOutcome::Sent
            }
            Err(e) => {
                tracing::error!("Write to {} failed: {}", self.name, e);
                if is_fatal(&e) {
                    shared.transition(SerialState::Closed);
                    if let Ok(mut slot) = shared.link.try_lock() {
                        slot.take();
                    }
                }
                AcceptOutcome::Dropped(DropReason::TransportIo)
            }
        };

        shared.transmitting.store(false, Ordering::Release);
        shared.stats.record(outcome);
        outcome
    }

    async fn close(&self) -> PipelineResult<()> {
        let previous = self.shared.transition(SerialState::Closed);
        if previous == SerialState::Closed {
            return Ok(());
        }

        if let Some(task) = self.open_task.lock().ok().and_then(|mut t| t.take()) {
            task.abort();
        }

        // An in-flight write holds the lock and drops the link when it finishes.
        if let Ok(mut slot) = self.shared.link.try_lock() {
            slot.take();
        }

        tracing::info!("Closed {}", self.name);
        self.stats().log_summary(&self.name);
        Ok(())
    }

    fn stats(&self) -> SinkStatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl std::fmt::Debug for SerialSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSink")
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .field("transmitting", &self.is_transmitting())
            .finish()
    }
}
