//! Per-die session
//!
//! A [`DieSession`] is a cheap, cloneable handle to an actor task that owns
//! all mutable state of one die: the transport, the active die type, the
//! battery and color response slots, and the orientation subscriber. Caller
//! requests and inbound notifications are both funneled through that task, so
//! they never interleave.
//!
//! Notifications are handled strictly in delivery order, and any frame the
//! transport delivered before a request reaches the task is handled first.
//!
//! Battery and color reads are single-shot request/response. Only one request
//! of each kind may be outstanding; a second one is rejected with
//! [`SessionError::RequestPending`] without writing anything to the die.

use godice_core::{
    decode, resolve, Color, Command, CommandError, DieType, NotificationEvent, Rgb, StabilityKind,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::transport::{NotificationSink, Transport, TransportError};

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Ready => write!(f, "ready"),
        }
    }
}

/// Kind of a request/response exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Battery,
    Color,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::Battery => write!(f, "battery"),
            RequestKind::Color => write!(f, "color"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session is not ready (state: {0})")]
    NotReady(SessionState),
    #[error("A {0} request is already pending")]
    RequestPending(RequestKind),
    #[error("Die disconnected")]
    Disconnected,
    #[error("No response within {0:?}")]
    Timeout(Duration),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] CommandError),
    #[error("Session task has stopped")]
    Closed,
}

/// Orientation update delivered to the subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrientationUpdate {
    /// Face value, absent while rolling
    pub value: Option<u8>,
    pub stability: StabilityKind,
    /// Die type the value was resolved with
    pub die_type: DieType,
}

pub type OrientationCallback = Box<dyn FnMut(OrientationUpdate) + Send + 'static>;

enum Subscriber {
    Callback(OrientationCallback),
    Channel(mpsc::UnboundedSender<OrientationUpdate>),
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Request {
    Connect(Reply<()>),
    Disconnect(Reply<()>),
    Send(Command, Reply<()>),
    Battery(Reply<u8>),
    Color { refresh: bool, reply: Reply<Color> },
    SetDieType(DieType, oneshot::Sender<()>),
    GetDieType(oneshot::Sender<DieType>),
    Subscribe(Option<Subscriber>, oneshot::Sender<()>),
}

/// Handle to a die session
#[derive(Clone)]
pub struct DieSession {
    requests: mpsc::Sender<Request>,
    state: watch::Receiver<SessionState>,
    response_timeout: Option<Duration>,
}

impl std::fmt::Debug for DieSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DieSession")
            .field("state", &*self.state.borrow())
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}

impl DieSession {
    /// Create a disconnected session for a die fitted with `die_type`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create<T: Transport>(transport: T, die_type: DieType) -> Self {
        Self::with_config(transport, SessionConfig::with_die_type(die_type))
    }

    /// Create a disconnected session from a full configuration
    pub fn with_config<T: Transport>(transport: T, config: SessionConfig) -> Self {
        let (request_tx, request_rx) = mpsc::channel(config.command_buffer.max(1));
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let response_timeout = config.response_timeout();

        let actor = SessionActor {
            transport,
            die_type: config.die_type,
            notification_buffer: config.notification_buffer,
            state: state_tx,
            notifications: None,
            pending_battery: None,
            pending_color: None,
            cached_color: None,
            subscriber: None,
        };
        tokio::spawn(actor.run(request_rx));

        Self {
            requests: request_tx,
            state: state_rx,
            response_timeout,
        }
    }

    /// Current connection state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch connection state changes
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Connect the transport. Connecting a ready session is a no-op.
    pub async fn connect(&self) -> Result<(), SessionError> {
        self.call(Request::Connect).await?
    }

    /// Disconnect the transport, failing any pending battery/color request
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.call(Request::Disconnect).await?
    }

    /// Set both LEDs
    pub async fn set_led(&self, led1: Rgb, led2: Rgb) -> Result<(), SessionError> {
        self.send_command(Command::SetLed { led1, led2 }).await
    }

    /// Pulse the LEDs `count` times; times are in 10 ms device ticks
    pub async fn pulse_led(
        &self,
        count: u8,
        on_ticks: u8,
        off_ticks: u8,
        color: Rgb,
    ) -> Result<(), SessionError> {
        self.send_command(Command::PulseLed {
            count,
            on_ticks,
            off_ticks,
            color,
        })
        .await
    }

    /// Set both LEDs from raw `[r, g, b]` channels, clamped to 0..=255.
    ///
    /// Fails with [`SessionError::InvalidArgument`] before anything is
    /// written if either LED does not have exactly three channels.
    pub async fn set_led_channels(&self, led1: &[i32], led2: &[i32]) -> Result<(), SessionError> {
        let led1 = Rgb::from_channels(led1)?;
        let led2 = Rgb::from_channels(led2)?;
        self.set_led(led1, led2).await
    }

    /// Pulse the LEDs with a raw `[r, g, b]` color
    pub async fn pulse_led_channels(
        &self,
        count: u8,
        on_ticks: u8,
        off_ticks: u8,
        color: &[i32],
    ) -> Result<(), SessionError> {
        let color = Rgb::from_channels(color)?;
        self.pulse_led(count, on_ticks, off_ticks, color).await
    }

    /// Write an arbitrary command. The die does not acknowledge commands.
    pub async fn send_command(&self, command: Command) -> Result<(), SessionError> {
        self.call(|reply| Request::Send(command, reply)).await?
    }

    /// Read the battery level (0-100)
    pub async fn get_battery(&self) -> Result<u8, SessionError> {
        self.exchange(Request::Battery).await
    }

    /// Read the die color, served from cache once known
    pub async fn get_color(&self) -> Result<Color, SessionError> {
        self.exchange(|reply| Request::Color {
            refresh: false,
            reply,
        })
        .await
    }

    /// Read the die color from the device, replacing the cached value
    pub async fn fetch_color(&self) -> Result<Color, SessionError> {
        self.exchange(|reply| Request::Color {
            refresh: true,
            reply,
        })
        .await
    }

    /// Change the active die type. Applies to orientation frames decoded
    /// after this call returns.
    pub async fn set_die_type(&self, die_type: DieType) -> Result<(), SessionError> {
        self.call(|reply| Request::SetDieType(die_type, reply)).await
    }

    pub async fn die_type(&self) -> Result<DieType, SessionError> {
        self.call(Request::GetDieType).await
    }

    /// Install the orientation subscriber, replacing any previous one
    pub async fn subscribe_orientation<F>(&self, callback: F) -> Result<(), SessionError>
    where
        F: FnMut(OrientationUpdate) + Send + 'static,
    {
        let callback = Subscriber::Callback(Box::new(callback));
        self.call(|reply| Request::Subscribe(Some(callback), reply))
            .await
    }

    /// Install a subscriber that forwards updates into a channel.
    ///
    /// Dropping the receiver unsubscribes; the session notices on the next
    /// orientation update.
    pub async fn subscribe_orientation_channel(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<OrientationUpdate>, SessionError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.call(|reply| Request::Subscribe(Some(Subscriber::Channel(tx)), reply))
            .await?;
        Ok(rx)
    }

    /// Remove the orientation subscriber
    pub async fn unsubscribe_orientation(&self) -> Result<(), SessionError> {
        self.call(|reply| Request::Subscribe(None, reply)).await
    }

    async fn call<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> Request,
    ) -> Result<R, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(make(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    async fn exchange<R>(
        &self,
        make: impl FnOnce(Reply<R>) -> Request,
    ) -> Result<R, SessionError> {
        match self.response_timeout {
            Some(limit) => tokio::time::timeout(limit, self.call(make))
                .await
                .map_err(|_| SessionError::Timeout(limit))?,
            None => self.call(make).await,
        }?
    }
}

struct SessionActor<T> {
    transport: T,
    die_type: DieType,
    notification_buffer: usize,
    state: watch::Sender<SessionState>,
    notifications: Option<mpsc::Receiver<Vec<u8>>>,
    pending_battery: Option<Reply<u8>>,
    pending_color: Option<Reply<Color>>,
    cached_color: Option<Color>,
    subscriber: Option<Subscriber>,
}

impl<T: Transport> SessionActor<T> {
    async fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        loop {
            // Frames already delivered are handled before later requests
            tokio::select! {
                biased;
                frame = next_frame(&mut self.notifications) => match frame {
                    Some(frame) => self.handle_frame(&frame),
                    None => self.link_lost("notification stream closed").await,
                },
                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request).await,
                    None => break,
                },
            }
        }

        // Every handle is gone
        if self.state() != SessionState::Disconnected {
            if let Err(e) = self.transport.disconnect().await {
                debug!(error = %e, "Disconnect on shutdown failed");
            }
            self.teardown("session dropped");
        }
        debug!("Session task stopped");
    }

    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: SessionState) {
        if self.state() != state {
            info!(state = %state, die_type = %self.die_type, "Session state changed");
            self.state.send_replace(state);
        }
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Ready => Ok(()),
            other => Err(SessionError::NotReady(other)),
        }
    }

    async fn handle_request(&mut self, request: Request) {
        match request {
            Request::Connect(reply) => {
                let _ = reply.send(self.connect().await);
            }
            Request::Disconnect(reply) => {
                let _ = reply.send(self.disconnect().await);
            }
            Request::Send(command, reply) => {
                let result = match self.ensure_ready() {
                    Ok(()) => self.write(command).await,
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Request::Battery(reply) => {
                if let Err(e) = self.ensure_ready() {
                    let _ = reply.send(Err(e));
                    return;
                }
                if slot_busy(&self.pending_battery) {
                    let _ = reply.send(Err(SessionError::RequestPending(RequestKind::Battery)));
                    return;
                }
                match self.write(Command::RequestBattery).await {
                    Ok(()) => self.pending_battery = Some(reply),
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            Request::Color { refresh, reply } => {
                if !refresh {
                    if let Some(color) = self.cached_color {
                        trace!(color = ?color, "Serving cached color");
                        let _ = reply.send(Ok(color));
                        return;
                    }
                }
                if let Err(e) = self.ensure_ready() {
                    let _ = reply.send(Err(e));
                    return;
                }
                if slot_busy(&self.pending_color) {
                    let _ = reply.send(Err(SessionError::RequestPending(RequestKind::Color)));
                    return;
                }
                match self.write(Command::RequestColor).await {
                    Ok(()) => self.pending_color = Some(reply),
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            Request::SetDieType(die_type, reply) => {
                if die_type != self.die_type {
                    debug!(from = %self.die_type, to = %die_type, "Die type changed");
                    self.die_type = die_type;
                }
                let _ = reply.send(());
            }
            Request::GetDieType(reply) => {
                let _ = reply.send(self.die_type);
            }
            Request::Subscribe(callback, reply) => {
                debug!(subscribed = callback.is_some(), "Orientation subscriber replaced");
                self.subscriber = callback;
                let _ = reply.send(());
            }
        }
    }

    async fn connect(&mut self) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Ready => return Ok(()),
            SessionState::Connecting => {
                return Err(SessionError::NotReady(SessionState::Connecting))
            }
            SessionState::Disconnected => {}
        }

        self.set_state(SessionState::Connecting);
        let (sink, rx) = NotificationSink::channel(self.notification_buffer);

        match self.transport.connect(sink).await {
            Ok(()) => {
                self.notifications = Some(rx);
                self.set_state(SessionState::Ready);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to die");
                self.set_state(SessionState::Disconnected);
                Err(e.into())
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        if self.state() == SessionState::Disconnected {
            return Ok(());
        }
        let result = self.transport.disconnect().await;
        self.teardown("disconnect requested");
        result.map_err(SessionError::from)
    }

    async fn write(&mut self, command: Command) -> Result<(), SessionError> {
        let frame = command.encode();
        debug!(command = command.name(), frame = ?frame, "Writing command");

        match self.transport.write(&frame).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if e.is_link_lost() {
                    self.link_lost("write failed on lost link").await;
                }
                Err(e.into())
            }
        }
    }

    /// The link went away without a disconnect request. The transport is
    /// still told to disconnect so the next connect starts clean.
    async fn link_lost(&mut self, reason: &str) {
        if let Err(e) = self.transport.disconnect().await {
            debug!(error = %e, "Disconnect after link loss failed");
        }
        self.teardown(reason);
    }

    /// Drop the link and fail pending requests
    fn teardown(&mut self, reason: &str) {
        if self.notifications.take().is_some() {
            warn!(reason = reason, "Die link closed");
        }
        if let Some(reply) = self.pending_battery.take() {
            let _ = reply.send(Err(SessionError::Disconnected));
        }
        if let Some(reply) = self.pending_color.take() {
            let _ = reply.send(Err(SessionError::Disconnected));
        }
        self.set_state(SessionState::Disconnected);
    }

    fn handle_frame(&mut self, frame: &[u8]) {
        let event = match decode(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, frame = ?frame, "Dropping undecodable notification");
                return;
            }
        };
        trace!(event = ?event, "Notification decoded");

        match event {
            NotificationEvent::Rolling => self.publish(None, StabilityKind::Rolling),
            NotificationEvent::Battery(level) => match self.pending_battery.take() {
                Some(reply) => {
                    debug!(level = level, "Battery level received");
                    if reply.send(Ok(level)).is_err() {
                        debug!("Battery requester went away");
                    }
                }
                None => debug!(level = level, "Dropping unsolicited battery level"),
            },
            NotificationEvent::Color(color) => match self.pending_color.take() {
                Some(reply) => {
                    debug!(color = ?color, "Color received");
                    self.cached_color = Some(color);
                    if reply.send(Ok(color)).is_err() {
                        debug!("Color requester went away");
                    }
                }
                None => debug!(color = ?color, "Dropping unsolicited color"),
            },
            NotificationEvent::Stable(_)
            | NotificationEvent::FakeStable(_)
            | NotificationEvent::TiltStable(_)
            | NotificationEvent::MoveStable(_) => {
                if let Some((vector, stability)) = event.orientation() {
                    let value = resolve(self.die_type, vector);
                    debug!(
                        vector = %vector,
                        value = value,
                        die_type = %self.die_type,
                        "Orientation resolved"
                    );
                    self.publish(Some(value), stability);
                }
            }
        }
    }

    fn publish(&mut self, value: Option<u8>, stability: StabilityKind) {
        let update = OrientationUpdate {
            value,
            stability,
            die_type: self.die_type,
        };
        match self.subscriber.as_mut() {
            Some(Subscriber::Callback(callback)) => callback(update),
            Some(Subscriber::Channel(tx)) => {
                if tx.send(update).is_err() {
                    debug!("Orientation receiver dropped, unsubscribing");
                    self.subscriber = None;
                }
            }
            None => trace!(update = ?update, "No orientation subscriber"),
        }
    }
}

/// A slot is busy while its requester is still waiting
fn slot_busy<R>(slot: &Option<oneshot::Sender<R>>) -> bool {
    slot.as_ref().is_some_and(|reply| !reply.is_closed())
}

async fn next_frame(notifications: &mut Option<mpsc::Receiver<Vec<u8>>>) -> Option<Vec<u8>> {
    match notifications {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{memory_transport, MemoryDevice};
    use godice_core::notification::encode;
    use godice_core::Vector3;

    async fn ready_session(die_type: DieType) -> (DieSession, MemoryDevice) {
        let (transport, device) = memory_transport();
        let session = DieSession::create(transport, die_type);
        session.connect().await.unwrap();
        (session, device)
    }

    #[tokio::test]
    async fn test_connect_lifecycle() {
        let (transport, device) = memory_transport();
        let session = DieSession::create(transport, DieType::D6);
        assert_eq!(session.state(), SessionState::Disconnected);

        session.connect().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert!(device.is_connected().await);

        // Idempotent
        session.connect().await.unwrap();

        session.disconnect().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!device.is_connected().await);
    }

    #[tokio::test]
    async fn test_commands_rejected_until_ready() {
        let (transport, mut device) = memory_transport();
        let session = DieSession::create(transport, DieType::D6);

        let result = session.set_led(Rgb::OFF, Rgb::OFF).await;
        assert_eq!(result, Err(SessionError::NotReady(SessionState::Disconnected)));
        assert_eq!(
            session.get_battery().await,
            Err(SessionError::NotReady(SessionState::Disconnected))
        );
        assert!(device.try_next_write().is_none());
    }

    #[tokio::test]
    async fn test_failed_connect_returns_to_disconnected() {
        let (transport, device) = memory_transport();
        device.refuse_connections(true).await;
        let session = DieSession::create(transport, DieType::D6);

        assert!(matches!(
            session.connect().await,
            Err(SessionError::Transport(TransportError::ConnectFailed(_)))
        ));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_led_commands_written() {
        let (session, mut device) = ready_session(DieType::D6).await;

        session
            .set_led(Rgb::clamped(300, -5, 10), Rgb::clamped(0, 0, 0))
            .await
            .unwrap();
        assert_eq!(device.next_write().await, Some(vec![8, 255, 0, 10, 0, 0, 0]));

        session.pulse_led(2, 50, 25, Rgb::new(0, 0, 255)).await.unwrap();
        assert_eq!(
            device.next_write().await,
            Some(vec![16, 2, 50, 25, 0, 0, 255, 1, 0])
        );
    }

    #[tokio::test]
    async fn test_raw_channel_leds_validated_before_write() {
        let (session, mut device) = ready_session(DieType::D6).await;

        assert_eq!(
            session.set_led_channels(&[255, 0, 0], &[1, 2]).await,
            Err(SessionError::InvalidArgument(CommandError::InvalidRgbLength(2)))
        );
        assert_eq!(
            session.pulse_led_channels(1, 10, 10, &[0, 0, 0, 0]).await,
            Err(SessionError::InvalidArgument(CommandError::InvalidRgbLength(4)))
        );
        assert!(device.try_next_write().is_none());

        session
            .set_led_channels(&[300, -5, 10], &[0, 0, 0])
            .await
            .unwrap();
        assert_eq!(device.next_write().await, Some(vec![8, 255, 0, 10, 0, 0, 0]));
    }

    #[tokio::test]
    async fn test_get_battery_waits_for_response() {
        let (session, mut device) = ready_session(DieType::D6).await;

        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.get_battery().await }
        });

        assert_eq!(device.next_write().await, Some(vec![3]));
        device.notify(vec![0x42, 0x61, 0x74, 77]).await.unwrap();

        assert_eq!(pending.await.unwrap(), Ok(77));
    }

    #[tokio::test]
    async fn test_unsolicited_battery_is_dropped() {
        let (session, mut device) = ready_session(DieType::D6).await;
        let mut updates = session.subscribe_orientation_channel().await.unwrap();

        device.notify(b"Bat\x10".to_vec()).await.unwrap();
        // Frames are handled in order, so once the rolling update arrives
        // the battery frame has been dropped
        device.notify(vec![b'R']).await.unwrap();
        updates.recv().await.unwrap();

        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.get_battery().await }
        });
        assert_eq!(device.next_write().await, Some(vec![3]));
        device.notify(b"Bat\x5a".to_vec()).await.unwrap();

        assert_eq!(pending.await.unwrap(), Ok(90));
    }

    #[tokio::test]
    async fn test_second_battery_request_rejected() {
        let (session, mut device) = ready_session(DieType::D6).await;

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.get_battery().await }
        });
        assert_eq!(device.next_write().await, Some(vec![3]));

        assert_eq!(
            session.get_battery().await,
            Err(SessionError::RequestPending(RequestKind::Battery))
        );
        // The rejected request wrote nothing
        assert!(device.try_next_write().is_none());

        device.notify(b"Bat\x32".to_vec()).await.unwrap();
        assert_eq!(first.await.unwrap(), Ok(50));
    }

    #[tokio::test]
    async fn test_second_color_request_rejected() {
        let (session, mut device) = ready_session(DieType::D6).await;

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.get_color().await }
        });
        assert_eq!(device.next_write().await, Some(vec![23]));

        // Nothing cached yet, so both reads hit the busy slot
        assert_eq!(
            session.get_color().await,
            Err(SessionError::RequestPending(RequestKind::Color))
        );
        assert_eq!(
            session.fetch_color().await,
            Err(SessionError::RequestPending(RequestKind::Color))
        );
        assert!(device.try_next_write().is_none());

        device.notify(b"Col\x02".to_vec()).await.unwrap();
        assert_eq!(first.await.unwrap(), Ok(Color::Green));
    }

    #[tokio::test]
    async fn test_abandoned_request_frees_slot() {
        let (transport, mut device) = memory_transport();
        let config = SessionConfig {
            response_timeout_ms: Some(100),
            ..SessionConfig::default()
        };
        let session = DieSession::with_config(transport, config);
        session.connect().await.unwrap();

        assert_eq!(
            session.get_battery().await,
            Err(SessionError::Timeout(Duration::from_millis(100)))
        );
        assert_eq!(device.next_write().await, Some(vec![3]));

        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.get_battery().await }
        });
        assert_eq!(device.next_write().await, Some(vec![3]));
        device.notify(b"Bat\x0a".to_vec()).await.unwrap();
        assert_eq!(pending.await.unwrap(), Ok(10));
    }

    #[tokio::test]
    async fn test_color_cached_until_refetch() {
        let (session, mut device) = ready_session(DieType::D6).await;

        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.get_color().await }
        });
        assert_eq!(device.next_write().await, Some(vec![23]));
        device.notify(b"Col\x01".to_vec()).await.unwrap();
        assert_eq!(pending.await.unwrap(), Ok(Color::Red));

        // Served from cache without touching the device
        assert_eq!(session.get_color().await, Ok(Color::Red));
        assert!(device.try_next_write().is_none());

        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.fetch_color().await }
        });
        assert_eq!(device.next_write().await, Some(vec![23]));
        device.notify(b"Col\x05".to_vec()).await.unwrap();
        assert_eq!(pending.await.unwrap(), Ok(Color::Orange));
        assert_eq!(session.get_color().await, Ok(Color::Orange));
    }

    #[tokio::test]
    async fn test_disconnect_cancels_pending_requests() {
        let (session, mut device) = ready_session(DieType::D6).await;

        let battery = tokio::spawn({
            let session = session.clone();
            async move { session.get_battery().await }
        });
        assert_eq!(device.next_write().await, Some(vec![3]));

        session.disconnect().await.unwrap();
        assert_eq!(battery.await.unwrap(), Err(SessionError::Disconnected));
    }

    #[tokio::test]
    async fn test_link_loss_cancels_pending_requests() {
        let (session, mut device) = ready_session(DieType::D6).await;
        let mut state = session.watch_state();

        let color = tokio::spawn({
            let session = session.clone();
            async move { session.get_color().await }
        });
        assert_eq!(device.next_write().await, Some(vec![23]));

        device.drop_link().await;
        assert_eq!(color.await.unwrap(), Err(SessionError::Disconnected));

        state
            .wait_for(|s| *s == SessionState::Disconnected)
            .await
            .unwrap();
        assert_eq!(
            session.set_led(Rgb::OFF, Rgb::OFF).await,
            Err(SessionError::NotReady(SessionState::Disconnected))
        );
    }

    #[tokio::test]
    async fn test_link_loss_disconnects_transport_before_reconnect() {
        let (session, mut device) = ready_session(DieType::D6).await;
        let mut state = session.watch_state();

        device.drop_link().await;
        state
            .wait_for(|s| *s == SessionState::Disconnected)
            .await
            .unwrap();
        assert_eq!(device.disconnect_count().await, 1);

        session.connect().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        session.set_led(Rgb::OFF, Rgb::OFF).await.unwrap();
        assert_eq!(device.next_write().await, Some(vec![8, 0, 0, 0, 0, 0, 0]));
    }

    #[tokio::test]
    async fn test_stable_frame_reaches_subscriber() {
        let (session, device) = ready_session(DieType::D20).await;
        let mut updates = session.subscribe_orientation_channel().await.unwrap();

        device
            .notify(encode(&NotificationEvent::Stable(Vector3::new(-64, 0, 22))))
            .await
            .unwrap();

        let update = updates.recv().await.unwrap();
        assert_eq!(update.value, Some(13));
        assert_eq!(update.stability, StabilityKind::Stable);
        assert_eq!(update.die_type, DieType::D20);
    }

    #[tokio::test]
    async fn test_rolling_and_secondary_stability() {
        let (session, device) = ready_session(DieType::D6).await;
        let mut updates = session.subscribe_orientation_channel().await.unwrap();

        device.notify(vec![b'R']).await.unwrap();
        device.notify(b"TS\x40\x00\x00".to_vec()).await.unwrap();

        let rolling = updates.recv().await.unwrap();
        assert_eq!(rolling.value, None);
        assert_eq!(rolling.stability, StabilityKind::Rolling);

        let tilt = updates.recv().await.unwrap();
        assert_eq!(tilt.value, Some(6));
        assert_eq!(tilt.stability, StabilityKind::TiltStable);
    }

    #[tokio::test]
    async fn test_die_type_change_applies_to_later_frames() {
        let (session, device) = ready_session(DieType::D20).await;
        let mut updates = session.subscribe_orientation_channel().await.unwrap();
        // Face 11 of the 20-sided housing
        let frame = encode(&NotificationEvent::Stable(Vector3::new(-42, 42, 42)));

        device.notify(frame.clone()).await.unwrap();
        assert_eq!(updates.recv().await.unwrap().value, Some(11));

        session.set_die_type(DieType::D10).await.unwrap();
        assert_eq!(session.die_type().await, Ok(DieType::D10));

        device.notify(frame).await.unwrap();
        let update = updates.recv().await.unwrap();
        assert_eq!(update.value, Some(5));
        assert_eq!(update.die_type, DieType::D10);
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_ignored() {
        let (session, device) = ready_session(DieType::D6).await;
        let mut updates = session.subscribe_orientation_channel().await.unwrap();

        device.notify(vec![0x00, 0x01]).await.unwrap();
        device.notify(b"S\x00".to_vec()).await.unwrap();
        device.notify(vec![b'R']).await.unwrap();

        assert_eq!(updates.recv().await.unwrap().stability, StabilityKind::Rolling);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_subscriber_replacement_is_not_accumulative() {
        let (session, device) = ready_session(DieType::D6).await;
        let mut first = session.subscribe_orientation_channel().await.unwrap();
        let mut second = session.subscribe_orientation_channel().await.unwrap();

        device.notify(vec![b'R']).await.unwrap();
        assert!(second.recv().await.is_some());
        // The first subscriber's sender was dropped on replacement
        assert!(first.recv().await.is_none());

        session.unsubscribe_orientation().await.unwrap();
        device.notify(vec![b'R']).await.unwrap();
        assert!(second.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_receiver_unsubscribes() {
        let (transport, _device) = memory_transport();
        let (state, _state_rx) = watch::channel(SessionState::Ready);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut actor = SessionActor {
            transport,
            die_type: DieType::D6,
            notification_buffer: 1,
            state,
            notifications: None,
            pending_battery: None,
            pending_color: None,
            cached_color: None,
            subscriber: Some(Subscriber::Channel(tx)),
        };

        actor.handle_frame(b"R");
        assert!(actor.subscriber.is_some());

        drop(rx);
        actor.handle_frame(b"R");
        assert!(actor.subscriber.is_none());
    }
}
