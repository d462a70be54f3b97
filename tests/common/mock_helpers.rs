//! Mock construction helpers

use async_trait::async_trait;
use pixelflow_rs::backend::{
    AcceptOutcome, AnySink, FrameSink, SinkConfig, SinkStats, SinkStatsSnapshot,
};
use pixelflow_rs::pipeline::{FrameBatch, PipelineResult, SinkFactory};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

#[derive(Default)]
struct SpyState {
    batches: Mutex<Vec<FrameBatch>>,
    built: AtomicUsize,
    closes: AtomicUsize,
    configs: Mutex<Vec<SinkConfig>>,
}

/// Observes every sink a [`spy_factory`] builds.
#[derive(Clone, Default)]
pub struct SpyHandle {
    state: Arc<SpyState>,
}

impl SpyHandle {
    /// Batches accepted by any spy sink, in order.
    pub fn batches(&self) -> Vec<FrameBatch> {
        self.state.batches.lock().unwrap().clone()
    }

    pub fn built(&self) -> usize {
        self.state.built.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Configs the factory was called with.
    pub fn configs(&self) -> Vec<SinkConfig> {
        self.state.configs.lock().unwrap().clone()
    }
}

/// Sink recording what it receives.
pub struct SpySink {
    state: Arc<SpyState>,
    stats: SinkStats,
}

#[async_trait]
impl FrameSink for SpySink {
    fn name(&self) -> &str {
        "spy"
    }

    async fn accept(&self, batch: FrameBatch) -> AcceptOutcome {
        self.state.batches.lock().unwrap().push(batch);
        self.stats.record(AcceptOutcome::Sent);
        AcceptOutcome::Sent
    }

    async fn close(&self) -> PipelineResult<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stats(&self) -> SinkStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Factory building [`SpySink`]s, plus the handle observing them.
pub fn spy_factory() -> (SinkFactory, SpyHandle) {
    let handle = SpyHandle::default();
    let state = handle.state.clone();
    let factory: SinkFactory = Arc::new(move |config: &SinkConfig| {
        state.built.fetch_add(1, Ordering::SeqCst);
        state.configs.lock().unwrap().push(config.clone());
        AnySink::plugin(SpySink {
            state: state.clone(),
            stats: SinkStats::new(),
        })
    });
    (factory, handle)
}

/// A local TCP listener speaking just enough OPC to read messages back.
pub struct OpcServer {
    listener: TcpListener,
    pub address: String,
}

impl OpcServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        Self { listener, address }
    }

    /// Accepts one connection and reads `count` messages as
    /// `(channel, command, data)`.
    pub async fn read_messages(&self, count: usize) -> Vec<(u8, u8, Vec<u8>)> {
        let (mut socket, _) = self.listener.accept().await.unwrap();
        let mut messages = Vec::with_capacity(count);
        for _ in 0..count {
            let mut header = [0u8; 4];
            socket.read_exact(&mut header).await.unwrap();
            let len = u16::from_be_bytes([header[2], header[3]]) as usize;
            let mut data = vec![0u8; len];
            socket.read_exact(&mut data).await.unwrap();
            messages.push((header[0], header[1], data));
        }
        messages
    }
}

/// An address with nothing listening on it.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);
    address
}

/// Factory building serial sinks over in-memory links. Each built sink's
/// link handle is appended to the returned list.
#[cfg(feature = "mock-serial")]
pub fn recording_serial_factory() -> (
    SinkFactory,
    Arc<Mutex<Vec<pixelflow_rs::backend::RecordingLinkHandle>>>,
) {
    use pixelflow_rs::backend::{RecordingLink, SerialLink, SerialSink};

    let handles = Arc::new(Mutex::new(Vec::new()));
    let seen = handles.clone();
    let factory: SinkFactory = Arc::new(move |config: &SinkConfig| match config {
        SinkConfig::Serial(serial) => {
            let (link, handle) = RecordingLink::new();
            seen.lock().unwrap().push(handle);
            let connect = async move { Ok(Box::new(link) as Box<dyn SerialLink>) };
            AnySink::Serial(SerialSink::with_connector(serial.clone(), connect))
        }
        other => other.build(),
    });
    (factory, handles)
}
