//! Transport contract between a die session and the radio stack
//!
//! The session never talks to Bluetooth directly. A transport connects to one
//! die, writes command frames to its write characteristic, and forwards every
//! notification from its notify characteristic into the [`NotificationSink`]
//! it was handed on connect. Dropping every clone of the sink signals that the
//! link is gone.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Nordic UART service exposed by the die
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

/// Characteristic commands are written to
pub const WRITE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);

/// Characteristic notifications arrive on
pub const NOTIFY_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

/// Prefix of the advertised local name of every die
pub const ADVERTISED_NAME_PREFIX: &str = "GoDice";

/// Check whether an advertised device name belongs to a die
pub fn is_godice_name(name: &str) -> bool {
    name.starts_with(ADVERTISED_NAME_PREFIX)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport is not connected")]
    NotConnected,
    #[error("Device disconnected")]
    Disconnected,
    #[error("Connect failed: {0}")]
    ConnectFailed(String),
    #[error("Write failed: {0}")]
    WriteFailed(String),
    #[error("Notification buffer full, frame dropped")]
    BufferFull,
}

impl TransportError {
    /// Whether the error means the link to the die is gone
    pub fn is_link_lost(&self) -> bool {
        matches!(self, TransportError::NotConnected | TransportError::Disconnected)
    }
}

/// Inbound half of the link, handed to the transport on connect
#[derive(Debug, Clone)]
pub struct NotificationSink {
    tx: mpsc::Sender<Vec<u8>>,
}

impl NotificationSink {
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Forward one notification payload, waiting for buffer space
    pub async fn deliver(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| TransportError::Disconnected)
    }

    /// Forward one notification payload from a non-async callback.
    ///
    /// When the session buffer is full the frame is dropped and
    /// [`TransportError::BufferFull`] is returned. The link stays up.
    pub fn try_deliver(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::BufferFull,
            mpsc::error::TrySendError::Closed(_) => TransportError::Disconnected,
        })
    }

    /// Whether the session stopped listening
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Byte channel to one physical die
#[async_trait]
pub trait Transport: Send + 'static {
    /// Establish the link and start forwarding notifications into `notifications`
    async fn connect(&mut self, notifications: NotificationSink) -> Result<(), TransportError>;

    /// Write one command frame to the die
    async fn write(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Tear the link down. Must drop every held [`NotificationSink`].
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}
