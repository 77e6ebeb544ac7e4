//! GoDice Session - Async per-die session over an abstract transport
//!
//! This crate drives one connected die:
//! - [`Transport`] is the byte channel the radio stack must provide
//! - [`DieSession`] owns the die's state in a single task and correlates
//!   battery/color requests with their responses
//! - [`memory_transport`] links a session to an in-process simulated die

pub mod config;
pub mod memory;
pub mod session;
pub mod transport;

pub use config::SessionConfig;
pub use memory::{memory_transport, MemoryDevice, MemoryTransport};
pub use session::{
    DieSession, OrientationCallback, OrientationUpdate, RequestKind, SessionError, SessionState,
};
pub use transport::{
    is_godice_name, NotificationSink, Transport, TransportError, NOTIFY_CHARACTERISTIC_UUID,
    SERVICE_UUID, WRITE_CHARACTERISTIC_UUID,
};
