//! In-process transport for simulation, log replay, and tests
//!
//! [`memory_transport`] returns a linked pair: the [`MemoryTransport`] goes to a
//! session, the [`MemoryDevice`] plays the die. Frames the session writes show
//! up on the device, and frames the device notifies are delivered to the
//! session.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::transport::{NotificationSink, Transport, TransportError};

#[derive(Debug, Default)]
struct Link {
    sink: Option<NotificationSink>,
    refuse_connect: bool,
    disconnects: usize,
}

/// Session side of an in-memory link
#[derive(Debug)]
pub struct MemoryTransport {
    link: Arc<Mutex<Link>>,
    written: mpsc::UnboundedSender<Vec<u8>>,
}

/// Device side of an in-memory link
#[derive(Debug)]
pub struct MemoryDevice {
    link: Arc<Mutex<Link>>,
    written: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Create a linked transport/device pair
pub fn memory_transport() -> (MemoryTransport, MemoryDevice) {
    let link = Arc::new(Mutex::new(Link::default()));
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            link: link.clone(),
            written: tx,
        },
        MemoryDevice { link, written: rx },
    )
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&mut self, notifications: NotificationSink) -> Result<(), TransportError> {
        let mut link = self.link.lock().await;
        if link.refuse_connect {
            return Err(TransportError::ConnectFailed("device refused connection".to_string()));
        }
        link.sink = Some(notifications);
        debug!("Memory link connected");
        Ok(())
    }

    async fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.link.lock().await.sink.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.written
            .send(frame.to_vec())
            .map_err(|_| TransportError::Disconnected)
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut link = self.link.lock().await;
        link.sink = None;
        link.disconnects += 1;
        debug!("Memory link disconnected");
        Ok(())
    }
}

impl MemoryDevice {
    /// Push a notification frame to the connected session
    pub async fn notify(&self, frame: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        let sink = self
            .link
            .lock()
            .await
            .sink
            .clone()
            .ok_or(TransportError::NotConnected)?;
        sink.deliver(frame.into()).await
    }

    /// Wait for the next frame written by the session
    pub async fn next_write(&mut self) -> Option<Vec<u8>> {
        self.written.recv().await
    }

    /// Next written frame, if one is already queued
    pub fn try_next_write(&mut self) -> Option<Vec<u8>> {
        self.written.try_recv().ok()
    }

    /// Simulate the radio link dropping
    pub async fn drop_link(&self) {
        self.link.lock().await.sink = None;
        debug!("Memory link dropped by device");
    }

    /// Make subsequent connection attempts fail
    pub async fn refuse_connections(&self, refuse: bool) {
        self.link.lock().await.refuse_connect = refuse;
    }

    pub async fn is_connected(&self) -> bool {
        self.link.lock().await.sink.is_some()
    }

    /// Number of times the session disconnected the transport
    pub async fn disconnect_count(&self) -> usize {
        self.link.lock().await.disconnects
    }
}
