//! EventSub websocket client.
//!
//! The client performs the welcome handshake, registers the topic catalog for
//! the new session, and then feeds every inbound frame through the codec and
//! the handler registry. Reconnects always start a fresh session and
//! re-subscribe the whole catalog.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::auth::{AuthError, CredentialProvider};
use crate::helix::{HelixClient, HelixError};
use crate::retry::{retry_async, with_timeout, RetryPolicy};
use crate::stream::deadline::{DeadlineReader, KeepaliveDeadline};
use crate::stream::dispatch::HandlerRegistry;
use crate::stream::proto::{self, Envelope, MessageType};
use crate::stream::topics::{build_requests, SubscriptionRequest};

/// Production EventSub websocket endpoint.
pub const EVENTSUB_ENDPOINT: &str = "wss://eventsub.wss.twitch.tv/ws";
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Largest keepalive period accepted from a welcome.
const MAX_KEEPALIVE_SECS: u64 = 600;
const MIN_RECONNECT_BACKOFF: Duration = Duration::from_millis(100);
const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Channel whose events are subscribed to, and the user reading its chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamTarget {
    pub broadcaster_id: String,
    pub viewer_id: String,
}

impl StreamTarget {
    pub fn new(broadcaster_id: impl Into<String>, viewer_id: impl Into<String>) -> Self {
        Self {
            broadcaster_id: broadcaster_id.into(),
            viewer_id: viewer_id.into(),
        }
    }

    /// The broadcaster reads their own chat.
    pub fn broadcaster(broadcaster_id: impl Into<String>) -> Self {
        let broadcaster_id = broadcaster_id.into();
        Self::new(broadcaster_id.clone(), broadcaster_id)
    }
}

/// Connection lifecycle state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Handshaking,
    Subscribing,
    Listening,
    Closing,
    Reconnecting,
}

/// Identity issued by a `session_welcome` message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub keepalive: Duration,
}

/// Why the receive loop asked for a new connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconnectReason {
    /// The server sent `session_reconnect`.
    ServerRequested,
    /// A watchdog saw the keepalive deadline pass.
    KeepaliveTimeout,
    /// A handle asked for a reconnect.
    Requested,
    TransportLost(String),
    ProtocolViolation(String),
}

impl fmt::Display for ReconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerRequested => f.write_str("server requested reconnect"),
            Self::KeepaliveTimeout => f.write_str("keepalive timeout"),
            Self::Requested => f.write_str("reconnect requested"),
            Self::TransportLost(detail) => write!(f, "transport lost: {detail}"),
            Self::ProtocolViolation(detail) => write!(f, "protocol violation: {detail}"),
        }
    }
}

/// How [`EventStreamClient::listen`] ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListenOutcome {
    Closed,
    Reconnect(ReconnectReason),
}

/// Errors produced by the stream transport and protocol handling.
#[derive(Debug, Error)]
pub enum StreamClientError {
    /// Websocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),

    #[error("credential error: {0}")]
    Auth(#[from] AuthError),

    #[error("helix request failed: {0}")]
    Helix(HelixError),

    /// Unexpected message during the handshake or an unknown message type.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timed out waiting for session_welcome")]
    HandshakeTimeout,

    #[error("authorization failed for {topic} after token refresh: {detail}")]
    AuthFailure { topic: String, detail: String },

    #[error("subscription to {topic} rejected with status {status}: {body}")]
    SubscriptionRejected {
        topic: String,
        status: u16,
        body: String,
    },

    #[error("subscription {topic} revoked: {status}")]
    Revoked { topic: String, status: String },

    #[error("transport lost: {0}")]
    TransportLost(String),

    #[error("client is not connected")]
    NotConnected,

    /// The client that owned the control queue is gone.
    #[error("control queue is closed")]
    ControlQueueClosed,
}

impl StreamClientError {
    /// Whether a fresh connection attempt might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::WebSocket(_)
            | Self::Protocol(_)
            | Self::HandshakeTimeout
            | Self::TransportLost(_)
            | Self::NotConnected => true,
            Self::Helix(err) => err.is_transient(),
            Self::Auth(_)
            | Self::AuthFailure { .. }
            | Self::SubscriptionRejected { .. }
            | Self::Revoked { .. }
            | Self::ControlQueueClosed => false,
        }
    }

    fn from_subscription(request: &SubscriptionRequest, err: HelixError) -> Self {
        let topic = request.topic_type.clone();
        match err {
            HelixError::Unauthorized(detail) => Self::AuthFailure { topic, detail },
            HelixError::HttpStatus { status, body } => Self::SubscriptionRejected {
                topic,
                status: status.as_u16(),
                body,
            },
            HelixError::Auth(err) => Self::Auth(err),
            other => Self::Helix(other),
        }
    }
}

enum Control {
    Reconnect,
    Close(oneshot::Sender<()>),
}

/// Everything needed to open a connection and register subscriptions.
///
/// Kept apart from the mutable client so connection attempts can be retried
/// through shared borrows.
struct Connector {
    endpoint: String,
    target: StreamTarget,
    credentials: Arc<dyn CredentialProvider>,
    helix: HelixClient,
    handshake_timeout: Duration,
}

impl Connector {
    async fn establish(
        &self,
        attempt: usize,
        state: &watch::Sender<ConnectionState>,
        deadline: &KeepaliveDeadline,
    ) -> Result<(WsStream, Session), StreamClientError> {
        state.send_replace(ConnectionState::Handshaking);
        debug!(event = "connect_attempt", attempt, endpoint = %self.endpoint);

        let mut request = self.endpoint.as_str().into_client_request()?;
        self.credentials
            .headers()
            .await?
            .apply(request.headers_mut())?;
        let (mut socket, _) = connect_async(request).await?;

        let session = with_timeout(self.handshake_timeout, recv_session_welcome(&mut socket))
            .await
            .map_err(|_| StreamClientError::HandshakeTimeout)??;
        info!(
            event = "session_welcome",
            session_id = %session.id,
            keepalive_secs = session.keepalive.as_secs()
        );
        deadline.arm(session.keepalive);

        state.send_replace(ConnectionState::Subscribing);
        self.subscribe_all(&session.id).await?;
        Ok((socket, session))
    }

    async fn subscribe_all(&self, session_id: &str) -> Result<(), StreamClientError> {
        let requests = build_requests(
            session_id,
            &self.target.broadcaster_id,
            &self.target.viewer_id,
        );
        for request in &requests {
            self.helix
                .create_subscription(request)
                .await
                .map_err(|err| StreamClientError::from_subscription(request, err))?;
        }
        info!(
            event = "subscriptions_registered",
            count = requests.len(),
            session_id
        );
        Ok(())
    }
}

/// Owner of the EventSub websocket connection.
pub struct EventStreamClient {
    connector: Connector,
    handlers: Arc<HandlerRegistry>,
    reconnect_policy: RetryPolicy,
    close_timeout: Duration,
    socket: Option<WsStream>,
    session: Option<Session>,
    running: bool,
    deadline: KeepaliveDeadline,
    state: watch::Sender<ConnectionState>,
    control_tx: mpsc::UnboundedSender<Control>,
    control_rx: mpsc::UnboundedReceiver<Control>,
}

impl EventStreamClient {
    /// Creates a disconnected client for the production endpoint.
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        helix: HelixClient,
        target: StreamTarget,
        handlers: Arc<HandlerRegistry>,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector: Connector {
                endpoint: EVENTSUB_ENDPOINT.to_string(),
                target,
                credentials,
                helix,
                handshake_timeout: HANDSHAKE_TIMEOUT,
            },
            handlers,
            reconnect_policy: RetryPolicy::reconnect(),
            close_timeout: CLOSE_TIMEOUT,
            socket: None,
            session: None,
            running: false,
            deadline: KeepaliveDeadline::new(),
            state,
            control_tx,
            control_rx,
        }
    }

    /// Sets an explicit websocket endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.connector.endpoint = endpoint.trim_end().to_string();
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.connector.handshake_timeout = timeout;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub fn with_reconnect_policy(mut self, policy: RetryPolicy) -> Self {
        self.reconnect_policy = policy;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.connector.endpoint
    }

    /// Returns a cloneable handle for watchdogs and shutdown paths.
    pub fn handle(&self) -> StreamHandle {
        StreamHandle {
            control: self.control_tx.clone(),
            deadline: self.deadline.reader(),
            state: self.state.subscribe(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Current session, `None` while disconnected.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// True when connected and the keepalive deadline has passed.
    pub fn is_timed_out(&self) -> bool {
        self.socket.is_some() && self.deadline.is_expired()
    }

    /// Opens a connection, completes the handshake and subscribes the catalog.
    ///
    /// A single attempt; failures leave the client disconnected.
    pub async fn connect(&mut self) -> Result<Session, StreamClientError> {
        self.drop_connection();
        self.running = true;
        let result = self
            .connector
            .establish(1, &self.state, &self.deadline)
            .await;
        self.install(result)
    }

    /// Drops the current connection and establishes a new session.
    ///
    /// Retryable failures are retried according to the reconnect policy.
    pub async fn reconnect(&mut self) -> Result<Session, StreamClientError> {
        let previous = self.session.as_ref().map(|session| session.id.clone());
        self.drop_connection();
        self.state.send_replace(ConnectionState::Reconnecting);
        info!(event = "reconnecting", previous_session = previous.as_deref());
        self.connect_with_retry().await
    }

    async fn connect_with_retry(&mut self) -> Result<Session, StreamClientError> {
        self.running = true;
        let connector = &self.connector;
        let state = &self.state;
        let deadline = &self.deadline;
        let result = retry_async(
            &self.reconnect_policy,
            move |attempt| connector.establish(attempt, state, deadline),
            StreamClientError::is_retryable,
        )
        .await;
        self.install(result)
    }

    /// Receives and dispatches frames until the connection needs replacing or
    /// the client is closed.
    pub async fn listen(&mut self) -> Result<ListenOutcome, StreamClientError> {
        loop {
            let event = {
                let Some(socket) = self.socket.as_mut() else {
                    if !self.running {
                        return Ok(ListenOutcome::Closed);
                    }
                    return Err(StreamClientError::NotConnected);
                };
                tokio::select! {
                    biased;
                    control = self.control_rx.recv() => LoopEvent::Control(control),
                    frame = socket.next() => LoopEvent::Frame(frame),
                }
            };

            let outcome = match event {
                LoopEvent::Control(Some(Control::Reconnect)) => {
                    let reason = if self.deadline.is_expired() {
                        ReconnectReason::KeepaliveTimeout
                    } else {
                        ReconnectReason::Requested
                    };
                    Some(ListenOutcome::Reconnect(reason))
                }
                LoopEvent::Control(Some(Control::Close(ack))) => {
                    self.close().await;
                    let _ = ack.send(());
                    Some(ListenOutcome::Closed)
                }
                LoopEvent::Control(None) => Some(ListenOutcome::Closed),
                LoopEvent::Frame(frame) => self.on_frame(frame).await?,
            };

            if let Some(outcome) = outcome {
                return Ok(outcome);
            }
        }
    }

    /// Connects, listens and reconnects until closed or a fatal error.
    ///
    /// The first connection is bounded by the reconnect policy. Once a
    /// session has been established, retryable failures are retried with
    /// capped backoff until they succeed or the client is closed.
    pub async fn run(mut self) -> Result<(), StreamClientError> {
        if let Err(err) = self.connect_with_retry().await {
            error!(event = "stream_connect_failed", error = %err);
            return Err(err);
        }

        loop {
            match self.listen().await {
                Ok(ListenOutcome::Closed) => return Ok(()),
                Ok(ListenOutcome::Reconnect(reason)) => {
                    warn!(event = "connection_replaced", reason = %reason);
                    match self.reestablish().await {
                        Ok(true) => {}
                        Ok(false) => return Ok(()),
                        Err(err) => {
                            error!(event = "stream_reconnect_failed", error = %err);
                            return Err(err);
                        }
                    }
                }
                Err(err) => {
                    error!(event = "stream_fatal", error = %err);
                    self.close().await;
                    return Err(err);
                }
            }
        }
    }

    /// Reconnects until a session is installed. Returns false if a close was
    /// requested while waiting between attempts.
    async fn reestablish(&mut self) -> Result<bool, StreamClientError> {
        let mut backoff = MIN_RECONNECT_BACKOFF;
        loop {
            let err = match self.reconnect().await {
                Ok(_) => return Ok(true),
                Err(err) if err.is_retryable() => err,
                Err(err) => return Err(err),
            };
            warn!(
                event = "reconnect_deferred",
                error = %err,
                delay_ms = backoff.as_millis() as u64
            );
            if !self.wait_before_reconnect(backoff).await {
                return Ok(false);
            }
            backoff = std::cmp::min(backoff.saturating_mul(2), MAX_RECONNECT_BACKOFF);
        }
    }

    /// Sleeps for `delay` while serving control requests. Returns false if
    /// the client was closed in the meantime.
    async fn wait_before_reconnect(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                biased;
                control = self.control_rx.recv() => match control {
                    Some(Control::Reconnect) => {}
                    Some(Control::Close(ack)) => {
                        self.close().await;
                        let _ = ack.send(());
                        return false;
                    }
                    None => {
                        self.running = false;
                        return false;
                    }
                },
                _ = &mut sleep => return true,
            }
        }
    }

    /// Sends a close frame, waits for the server to confirm, and releases the
    /// connection. Closing a closed client does nothing.
    pub async fn close(&mut self) {
        self.running = false;
        let Some(mut socket) = self.socket.take() else {
            return;
        };

        self.state.send_replace(ConnectionState::Closing);
        self.deadline.disarm();
        let session_id = self.session.take().map(|session| session.id);
        info!(event = "closing_connection", session_id = session_id.as_deref());

        if socket.close(None).await.is_ok() {
            let confirmed = with_timeout(self.close_timeout, async {
                while let Some(Ok(_)) = socket.next().await {}
            })
            .await;
            if confirmed.is_err() {
                warn!(event = "close_unconfirmed", timeout_ms = self.close_timeout.as_millis() as u64);
            }
        }

        self.state.send_replace(ConnectionState::Disconnected);
        info!(event = "connection_closed");
    }

    fn install(
        &mut self,
        result: Result<(WsStream, Session), StreamClientError>,
    ) -> Result<Session, StreamClientError> {
        match result {
            Ok((socket, session)) => {
                self.discard_stale_reconnects();
                self.deadline.arm(session.keepalive);
                self.socket = Some(socket);
                self.session = Some(session.clone());
                self.state.send_replace(ConnectionState::Listening);
                Ok(session)
            }
            Err(err) => {
                self.drop_connection();
                Err(err)
            }
        }
    }

    /// Drops reconnect requests queued against the connection that was just
    /// replaced. Close requests stay queued.
    fn discard_stale_reconnects(&mut self) {
        let mut kept = Vec::new();
        let mut discarded = 0usize;
        while let Ok(control) = self.control_rx.try_recv() {
            match control {
                Control::Reconnect => discarded += 1,
                close @ Control::Close(_) => kept.push(close),
            }
        }
        if discarded > 0 {
            debug!(event = "stale_reconnects_discarded", count = discarded);
        }
        for control in kept {
            let _ = self.control_tx.send(control);
        }
    }

    /// Releases the connection without a close handshake.
    fn drop_connection(&mut self) {
        self.socket = None;
        self.session = None;
        self.deadline.disarm();
        self.state.send_replace(ConnectionState::Disconnected);
    }

    async fn on_frame(
        &mut self,
        frame: Option<Result<Message, WsError>>,
    ) -> Result<Option<ListenOutcome>, StreamClientError> {
        let lost = |detail: String| -> Result<Option<ListenOutcome>, StreamClientError> {
            Ok(Some(ListenOutcome::Reconnect(
                ReconnectReason::TransportLost(detail),
            )))
        };
        match frame {
            Some(Ok(Message::Text(text))) => self.on_text(&text).await,
            Some(Ok(Message::Ping(payload))) => {
                let Some(socket) = self.socket.as_mut() else {
                    return Ok(None);
                };
                match socket.send(Message::Pong(payload)).await {
                    Ok(()) => Ok(None),
                    Err(err) => lost(err.to_string()),
                }
            }
            Some(Ok(Message::Pong(_))) => Ok(None),
            Some(Ok(Message::Close(frame))) => lost(format!("closed by server: {frame:?}")),
            Some(Ok(_)) => {
                warn!(event = "frame_dropped", reason = "non-text frame");
                Ok(None)
            }
            Some(Err(err)) => lost(err.to_string()),
            None => lost("stream ended".to_string()),
        }
    }

    async fn on_text(&mut self, text: &str) -> Result<Option<ListenOutcome>, StreamClientError> {
        let envelope = match proto::decode(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(event = "frame_dropped", error = %err);
                return Ok(None);
            }
        };

        if envelope.message_type().resets_keepalive() {
            self.deadline.reset();
        }

        if let MessageType::Other(kind) = envelope.message_type() {
            return Ok(Some(ListenOutcome::Reconnect(
                ReconnectReason::ProtocolViolation(format!("unknown message type {kind:?}")),
            )));
        }

        debug!(
            event = "frame_received",
            message_type = %envelope.message_type(),
            message_id = envelope.message_id()
        );
        self.handlers.dispatch(&envelope).await;

        match envelope.message_type() {
            MessageType::SessionReconnect => {
                let reconnect_url = envelope
                    .session()
                    .and_then(|session| session.reconnect_url.as_deref());
                info!(event = "session_reconnect", reconnect_url);
                Ok(Some(ListenOutcome::Reconnect(ReconnectReason::ServerRequested)))
            }
            MessageType::Revocation => {
                let (topic, status) = envelope
                    .as_subscription()
                    .map(|sub| {
                        (
                            sub.subscription_type().to_string(),
                            sub.subscription_status().to_string(),
                        )
                    })
                    .unwrap_or_default();
                error!(event = "subscription_revoked", topic = %topic, status = %status);
                Err(StreamClientError::Revoked { topic, status })
            }
            MessageType::SessionWelcome => {
                debug!(event = "unexpected_welcome_ignored");
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

impl fmt::Debug for EventStreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStreamClient")
            .field("endpoint", &self.connector.endpoint)
            .field("target", &self.connector.target)
            .field("state", &self.state())
            .field("session", &self.session)
            .field("handlers", &self.handlers)
            .finish()
    }
}

enum LoopEvent {
    Control(Option<Control>),
    Frame(Option<Result<Message, WsError>>),
}

/// Cloneable view of a running client.
///
/// Handles never touch the connection. They read the deadline and send
/// requests that the client acts on from its receive loop.
#[derive(Clone, Debug)]
pub struct StreamHandle {
    control: mpsc::UnboundedSender<Control>,
    deadline: DeadlineReader,
    state: watch::Receiver<ConnectionState>,
}

impl StreamHandle {
    pub fn is_timed_out(&self) -> bool {
        self.deadline.is_expired()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Waits until the client reports `target`. Returns false if the client
    /// was dropped first.
    pub async fn wait_for_state(&self, target: ConnectionState) -> bool {
        let mut state = self.state.clone();
        let reached = state.wait_for(|current| *current == target).await.is_ok();
        reached
    }

    /// Asks the client to replace its connection.
    pub fn request_reconnect(&self) -> Result<(), StreamClientError> {
        self.control
            .send(Control::Reconnect)
            .map_err(|_| StreamClientError::ControlQueueClosed)
    }

    /// Asks the client to close gracefully and waits for it to finish.
    ///
    /// Resolves immediately if the client is already gone.
    pub async fn close(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.control.send(Control::Close(ack_tx)).is_err() {
            return;
        }
        let _ = ack_rx.await;
    }
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconnect => f.write_str("Reconnect"),
            Self::Close(_) => f.write_str("Close"),
        }
    }
}

async fn recv_session_welcome<S>(
    socket: &mut WebSocketStream<S>,
) -> Result<Session, StreamClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => {
                let envelope = proto::decode(&text).map_err(|err| {
                    StreamClientError::Protocol(format!("malformed handshake frame: {err}"))
                })?;
                return session_from_welcome(&envelope);
            }
            Some(Ok(Message::Ping(payload))) => {
                socket.send(Message::Pong(payload)).await?;
            }
            Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) => {
                return Err(StreamClientError::Protocol(
                    "socket closed before session_welcome".to_string(),
                ));
            }
            Some(Ok(_)) => {
                return Err(StreamClientError::Protocol(
                    "received non-text frame before session_welcome".to_string(),
                ));
            }
            Some(Err(err)) => return Err(StreamClientError::WebSocket(err)),
            None => {
                return Err(StreamClientError::Protocol(
                    "socket ended before session_welcome".to_string(),
                ));
            }
        }
    }
}

fn session_from_welcome(envelope: &Envelope) -> Result<Session, StreamClientError> {
    if envelope.message_type() != &MessageType::SessionWelcome {
        return Err(StreamClientError::Protocol(format!(
            "expected first message to be session_welcome, got {}",
            envelope.message_type()
        )));
    }

    let session = envelope.session().ok_or_else(|| {
        StreamClientError::Protocol("session_welcome without payload.session".to_string())
    })?;
    if session.id.is_empty() {
        return Err(StreamClientError::Protocol(
            "session_welcome with empty session id".to_string(),
        ));
    }
    let keepalive_secs = session
        .keepalive_timeout_seconds
        .filter(|secs| *secs > 0)
        .ok_or_else(|| {
            StreamClientError::Protocol("session_welcome without keepalive period".to_string())
        })?;
    if keepalive_secs > MAX_KEEPALIVE_SECS {
        return Err(StreamClientError::Protocol(format!(
            "session_welcome keepalive period {keepalive_secs}s exceeds {MAX_KEEPALIVE_SECS}s"
        )));
    }

    Ok(Session {
        id: session.id.clone(),
        keepalive: Duration::from_secs(keepalive_secs),
    })
}
