//! In-memory serial link for running sinks without hardware.
//!
//! [`RecordingLink`] stores every buffer written to it. Its
//! [`RecordingLinkHandle`] lets a test inspect those writes, hold writes in
//! flight to simulate a slow port, and inject I/O errors.
//!
//! Only built for tests or with the `mock-serial` feature:
//!
//! ```bash
//! cargo test --features mock-serial
//! ```

use crate::backend::serial::SerialLink;
use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Permits added per release, more than any test holds at once.
const RELEASE_PERMITS: usize = 1024;

struct Recorded {
    writes: Mutex<Vec<Vec<u8>>>,
    attempts: AtomicUsize,
    drains: AtomicUsize,
    held: AtomicBool,
    dropped: AtomicBool,
    fail_next: Mutex<Option<io::ErrorKind>>,
    gate: Semaphore,
}

/// A [`SerialLink`] that records writes in memory.
pub struct RecordingLink {
    inner: Arc<Recorded>,
}

impl RecordingLink {
    /// Creates a link and the handle observing it.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (RecordingLink, RecordingLinkHandle) {
        let inner = Arc::new(Recorded {
            writes: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            drains: AtomicUsize::new(0),
            held: AtomicBool::new(false),
            dropped: AtomicBool::new(false),
            fail_next: Mutex::new(None),
            gate: Semaphore::new(0),
        });
        (
            RecordingLink {
                inner: inner.clone(),
            },
            RecordingLinkHandle { inner },
        )
    }
}

#[async_trait]
impl SerialLink for RecordingLink {
    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);

        if self.inner.held.load(Ordering::SeqCst) {
            let permit = self
                .inner
                .gate
                .acquire()
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "link gate closed"))?;
            permit.forget();
        }

        let failure = self.inner.fail_next.lock().ok().and_then(|mut f| f.take());
        if let Some(kind) = failure {
            return Err(io::Error::new(kind, "injected failure"));
        }

        if let Ok(mut writes) = self.inner.writes.lock() {
            writes.push(buf.to_vec());
        }
        Ok(())
    }

    async fn drain(&mut self) -> io::Result<()> {
        self.inner.drains.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for RecordingLink {
    fn drop(&mut self) {
        self.inner.dropped.store(true, Ordering::SeqCst);
    }
}

/// Observer and controller for a [`RecordingLink`].
#[derive(Clone)]
pub struct RecordingLinkHandle {
    inner: Arc<Recorded>,
}

impl RecordingLinkHandle {
    /// Buffers that were written successfully, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner
            .writes
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    /// Number of `write` calls, including held and failed ones.
    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn drains(&self) -> usize {
        self.inner.drains.load(Ordering::SeqCst)
    }

    /// Makes subsequent writes wait until [`release_writes`](Self::release_writes).
    pub fn hold_writes(&self) {
        self.inner.held.store(true, Ordering::SeqCst);
    }

    /// Lets held writes complete and stops holding new ones.
    pub fn release_writes(&self) {
        self.inner.held.store(false, Ordering::SeqCst);
        self.inner.gate.add_permits(RELEASE_PERMITS);
    }

    /// The next write fails with `kind`.
    pub fn fail_next_write(&self, kind: io::ErrorKind) {
        if let Ok(mut f) = self.inner.fail_next.lock() {
            *f = Some(kind);
        }
    }

    /// Whether the sink has released the link.
    pub fn is_dropped(&self) -> bool {
        self.inner.dropped.load(Ordering::SeqCst)
    }
}
