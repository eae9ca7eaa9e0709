//! Persistent hub channel shared by the whole client.
//!
//! Provides:
//! - Connection lifecycle (connect, disconnect, automatic reconnect)
//! - Invocations that await the hub's completion
//! - Typed event subscriptions, dispatched in subscription order
//! - Connection status broadcast for sessions that must refetch on reconnect
//!
//! ```text
//!   ChannelManager::send ──► outgoing mpsc ──► writer task ──► WebSocket
//!          ▲                                                      │
//!          └── oneshot (completion) ◄── supervisor task ◄─────────┘
//!                                         │  reader loop
//!                                         ├─► handlers[event kind]
//!                                         └─► reconnect on drop
//! ```
//!
//! State machine:
//! `Disconnected -> Connecting -> Connected -> (Reconnecting -> Connected | Disconnected)`

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use quill_core::{
    BlockImage, BlockImageRequest, CreateDocumentRequest, DocumentId, EditBlockRequest, FileUpload,
    SendBlockRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::events::{EventKind, HubEvent, HubMethod};
use crate::protocol::{
    decode_handshake_response, encode_handshake_request, split_records, HubMessage, ProtocolError,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Interval between client keep-alive pings while connected.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Channel connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Lifecycle notifications broadcast to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    /// An explicit `connect()` succeeded
    Connected,
    /// The transport dropped; reconnect attempt `attempt` is about to start
    Reconnecting { attempt: u32 },
    /// The transport was re-established. Events sent while it was down are
    /// lost: observers must refetch authoritative state.
    Reconnected,
    /// The channel is down. `error` is `None` after an explicit disconnect.
    Disconnected { error: Option<ChannelError> },
}

/// Why a handshake did not produce a connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectFailure {
    #[error("no access credential stored")]
    MissingCredential,
    #[error("credential rejected: {0}")]
    Unauthorized(String),
    #[error("hub rejected handshake: {0}")]
    HandshakeRejected(String),
    #[error("invalid hub url: {0}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Network(String),
}

/// Channel errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// `send` was called while the channel was not `Connected`.
    #[error("channel is not connected")]
    NotConnected,
    #[error("connect failed: {0}")]
    ConnectFailed(#[from] ConnectFailure),
    /// The transport went away while a reply was outstanding.
    #[error("transport dropped")]
    TransportDropped,
    /// The hub completed the invocation with an error.
    #[error("hub rejected {method}: {message}")]
    RemoteRejected { method: String, message: String },
    /// `disconnect()` was called while a reply was outstanding.
    #[error("channel closed")]
    Closed,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ChannelError {
    /// True when the user must re-authenticate rather than wait for the network.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed(ConnectFailure::Unauthorized(_) | ConnectFailure::MissingCredential)
        )
    }
}

/// Handle returned by [`ChannelManager::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&HubEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

struct PendingReply {
    method: HubMethod,
    reply: oneshot::Sender<Result<Value, ChannelError>>,
}

/// A freshly handshaken transport plus any records that arrived in the same
/// frame as the handshake answer.
struct Established {
    stream: WsStream,
    leftover: Vec<String>,
}

/// How a read loop ended.
enum ReadEnd {
    Dropped,
    Closed { error: Option<String> },
}

/// Clears the single-flight connect flag on every exit path.
struct ConnectGuard<'a>(&'a AtomicBool);

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner {
    config: ClientConfig,
    credentials: Arc<CredentialStore>,
    state: RwLock<ConnectionState>,
    /// Single-flight guard for `connect()`
    connecting: AtomicBool,
    /// Sender to the current writer task (None while not connected)
    outgoing: Mutex<Option<mpsc::Sender<Message>>>,
    pending: Mutex<HashMap<u64, PendingReply>>,
    next_invocation_id: AtomicU64,
    handlers: Mutex<HashMap<EventKind, Vec<Subscription>>>,
    next_subscription_id: AtomicU64,
    status_tx: broadcast::Sender<ConnectionStatus>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    /// Number of completed WebSocket handshakes, for diagnostics
    handshakes: AtomicU64,
}

/// The hub channel.
///
/// One instance lives for the whole client and is shared by `Arc`; document
/// sessions borrow it and never own it. Must be used inside a tokio runtime.
pub struct ChannelManager {
    inner: Arc<Inner>,
}

impl ChannelManager {
    pub fn new(config: ClientConfig, credentials: Arc<CredentialStore>) -> Self {
        let (status_tx, _) = broadcast::channel(config.status_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                credentials,
                state: RwLock::new(ConnectionState::Disconnected),
                connecting: AtomicBool::new(false),
                outgoing: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                next_invocation_id: AtomicU64::new(1),
                handlers: Mutex::new(HashMap::new()),
                next_subscription_id: AtomicU64::new(1),
                status_tx,
                supervisor: Mutex::new(None),
                handshakes: AtomicU64::new(0),
            }),
        }
    }

    /// Connect to the hub.
    ///
    /// Returns `Ok` immediately without doing anything unless the channel is
    /// `Disconnected`. Failures leave the channel `Disconnected` and are not
    /// retried here.
    pub async fn connect(&self) -> Result<(), ChannelError> {
        {
            let mut state = self.inner.state.write().await;
            if *state != ConnectionState::Disconnected {
                log::debug!("connect() ignored in state {:?}", *state);
                return Ok(());
            }
            if self.inner.connecting.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }
        let _guard = ConnectGuard(&self.inner.connecting);

        match self.inner.open_transport().await {
            Ok(established) => {
                let source = self.inner.install(established);
                *self.inner.state.write().await = ConnectionState::Connected;
                let supervisor = tokio::spawn(Inner::supervise(self.inner.clone(), source));
                if let Some(previous) = lock(&self.inner.supervisor).replace(supervisor) {
                    previous.abort();
                }
                log::info!("Hub connected: {}", self.inner.config.hub_url);
                let _ = self.inner.status_tx.send(ConnectionStatus::Connected);
                Ok(())
            }
            Err(failure) => {
                *self.inner.state.write().await = ConnectionState::Disconnected;
                log::warn!("Hub connect failed: {failure}");
                Err(ChannelError::ConnectFailed(failure))
            }
        }
    }

    /// Tear the channel down.
    ///
    /// No-op while `Disconnected` or `Connecting`. From `Reconnecting` it also
    /// stops the pending reconnect attempts.
    pub async fn disconnect(&self) {
        {
            let mut state = self.inner.state.write().await;
            match *state {
                ConnectionState::Connected | ConnectionState::Reconnecting => {}
                other => {
                    log::debug!("disconnect() ignored in state {other:?}");
                    return;
                }
            }
            *state = ConnectionState::Disconnected;
        }

        if let Some(supervisor) = lock(&self.inner.supervisor).take() {
            supervisor.abort();
        }
        // Dropping the sender lets the writer flush and close the socket.
        lock(&self.inner.outgoing).take();
        self.inner.fail_pending(ChannelError::Closed);

        log::info!("Hub disconnected");
        let _ = self
            .inner
            .status_tx
            .send(ConnectionStatus::Disconnected { error: None });
    }

    /// Invoke a hub method and await its completion.
    ///
    /// Fails with [`ChannelError::NotConnected`] without touching the
    /// transport unless the channel is `Connected`. Nothing is queued.
    pub async fn send(&self, method: HubMethod, arguments: Vec<Value>) -> Result<Value, ChannelError> {
        if *self.inner.state.read().await != ConnectionState::Connected {
            return Err(ChannelError::NotConnected);
        }
        let invocation_id = self.inner.next_invocation_id.fetch_add(1, Ordering::Relaxed);
        let record = HubMessage::invocation(invocation_id, method.as_str(), arguments).encode()?;

        // Teardown takes the writer before draining `pending`, so a reply
        // registered first is either drained or finds no writer.
        let (reply, reply_rx) = oneshot::channel();
        lock(&self.inner.pending).insert(invocation_id, PendingReply { method, reply });
        let Some(outgoing) = lock(&self.inner.outgoing).clone() else {
            lock(&self.inner.pending).remove(&invocation_id);
            return Err(ChannelError::NotConnected);
        };

        if outgoing.send(Message::text(record)).await.is_err() {
            lock(&self.inner.pending).remove(&invocation_id);
            return Err(ChannelError::TransportDropped);
        }
        log::trace!("Invoked {method} (#{invocation_id})");

        reply_rx.await.unwrap_or(Err(ChannelError::TransportDropped))
    }

    /// [`send`](Self::send) and decode the completion result.
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        method: HubMethod,
        arguments: Vec<Value>,
    ) -> Result<T, ChannelError> {
        let value = self.send(method, arguments).await?;
        serde_json::from_value(value)
            .map_err(|e| ChannelError::Protocol(ProtocolError::Deserialization(e.to_string())))
    }

    pub async fn create_document(&self, request: &CreateDocumentRequest) -> Result<(), ChannelError> {
        self.send(HubMethod::CreateDocument, vec![to_arg(request)?]).await?;
        Ok(())
    }

    pub async fn delete_document(&self, document_id: DocumentId) -> Result<(), ChannelError> {
        self.send(HubMethod::DeleteDocument, vec![to_arg(&document_id)?]).await?;
        Ok(())
    }

    pub async fn send_block(&self, request: &SendBlockRequest) -> Result<(), ChannelError> {
        self.send(HubMethod::SendBlock, vec![to_arg(request)?]).await?;
        Ok(())
    }

    pub async fn edit_block(&self, request: &EditBlockRequest) -> Result<(), ChannelError> {
        self.send(HubMethod::EditBlock, vec![to_arg(request)?]).await?;
        Ok(())
    }

    /// Upload an image for a block; resolves with the created descriptor.
    pub async fn send_block_image(
        &self,
        request: &BlockImageRequest,
        upload: &FileUpload,
    ) -> Result<BlockImage, ChannelError> {
        self.invoke(HubMethod::SendBlockImage, vec![to_arg(request)?, to_arg(upload)?])
            .await
    }

    /// Append a handler for `kind`. Handlers run on the channel's reader task,
    /// in subscription order, and must not block.
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&HubEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_subscription_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.handlers)
            .entry(kind)
            .or_default()
            .push(Subscription {
                id,
                handler: Arc::new(handler),
            });
        id
    }

    /// Remove one handler. Returns whether it was registered.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut handlers = lock(&self.inner.handlers);
        let Some(subs) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.id != id);
        before != subs.len()
    }

    /// Remove every handler for `kind`. Returns how many were removed.
    pub fn unsubscribe_all(&self, kind: EventKind) -> usize {
        lock(&self.inner.handlers)
            .remove(&kind)
            .map_or(0, |subs| subs.len())
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        lock(&self.inner.handlers).get(&kind).map_or(0, Vec::len)
    }

    /// Observe lifecycle changes.
    pub fn subscribe_status(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn emit_status(&self, status: ConnectionStatus) {
        let _ = self.inner.status_tx.send(status);
    }

    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.read().await
    }

    /// Number of successful transport handshakes so far.
    pub fn handshake_count(&self) -> u64 {
        self.inner.handshakes.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.inner.credentials
    }

    /// Run the event dispatcher on a decoded invocation, as the reader task
    /// does. Lets front ends replay recorded traffic.
    pub fn dispatch(&self, target: &str, arguments: &[Value]) {
        self.inner.dispatch(target, arguments);
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        if let Some(supervisor) = lock(&self.inner.supervisor).take() {
            supervisor.abort();
        }
        lock(&self.inner.outgoing).take();
    }
}

impl Inner {
    /// Authenticate, open the WebSocket and complete the hub handshake.
    async fn open_transport(&self) -> Result<Established, ConnectFailure> {
        let token = self
            .credentials
            .access_token()
            .ok_or(ConnectFailure::MissingCredential)?;
        let url = hub_url_with_token(&self.config.hub_url, &token)?;

        let established = tokio::time::timeout(self.config.handshake_timeout, handshake(&url))
            .await
            .map_err(|_| ConnectFailure::Network("handshake timed out".to_string()))??;
        self.handshakes.fetch_add(1, Ordering::Relaxed);
        Ok(established)
    }

    /// Start the writer for a new transport and hand back its read half.
    fn install(&self, established: Established) -> (WsSource, Vec<String>) {
        let (sink, source) = established.stream.split();
        let (out_tx, out_rx) = mpsc::channel(self.config.outgoing_capacity.max(1));
        spawn_writer(sink, out_rx, KEEPALIVE_INTERVAL);
        *lock(&self.outgoing) = Some(out_tx);
        (source, established.leftover)
    }

    /// Own the read half for the channel's lifetime, reconnecting on drops.
    async fn supervise(self: Arc<Self>, (mut source, mut leftover): (WsSource, Vec<String>)) {
        loop {
            let end = self.read_loop(&mut source, std::mem::take(&mut leftover)).await;
            lock(&self.outgoing).take();
            self.fail_pending(ChannelError::TransportDropped);

            if let ReadEnd::Closed { error } = end {
                log::warn!("Hub closed the channel: {}", error.as_deref().unwrap_or("no reason"));
                self.finish_disconnected(error.map(|message| ChannelError::RemoteRejected {
                    method: "Close".to_string(),
                    message,
                }))
                .await;
                return;
            }

            {
                let mut state = self.state.write().await;
                if *state != ConnectionState::Connected {
                    return;
                }
                *state = ConnectionState::Reconnecting;
            }
            log::warn!("Hub transport dropped; reconnecting");

            match self.reconnect().await {
                Ok(established) => {
                    let mut state = self.state.write().await;
                    if *state != ConnectionState::Reconnecting {
                        // disconnect() won the race; drop the new transport.
                        return;
                    }
                    let (new_source, new_leftover) = self.install(established);
                    source = new_source;
                    leftover = new_leftover;
                    *state = ConnectionState::Connected;
                    drop(state);
                    log::info!("Hub reconnected");
                    let _ = self.status_tx.send(ConnectionStatus::Reconnected);
                }
                Err(error) => {
                    log::error!("Hub reconnect gave up: {error}");
                    self.finish_disconnected(Some(error)).await;
                    return;
                }
            }
        }
    }

    async fn finish_disconnected(&self, error: Option<ChannelError>) {
        {
            let mut state = self.state.write().await;
            if *state == ConnectionState::Disconnected {
                return;
            }
            *state = ConnectionState::Disconnected;
        }
        let _ = self.status_tx.send(ConnectionStatus::Disconnected { error });
    }

    async fn reconnect(&self) -> Result<Established, ChannelError> {
        for (index, delay) in self.config.reconnect_delays.iter().enumerate() {
            let attempt = index as u32 + 1;
            let _ = self.status_tx.send(ConnectionStatus::Reconnecting { attempt });
            tokio::time::sleep(*delay).await;

            if *self.state.read().await != ConnectionState::Reconnecting {
                return Err(ChannelError::Closed);
            }
            match self.open_transport().await {
                Ok(established) => return Ok(established),
                Err(failure @ (ConnectFailure::Unauthorized(_) | ConnectFailure::MissingCredential)) => {
                    return Err(ChannelError::ConnectFailed(failure));
                }
                Err(failure) => log::warn!("Reconnect attempt {attempt} failed: {failure}"),
            }
        }
        Err(ChannelError::TransportDropped)
    }

    async fn read_loop(&self, source: &mut WsSource, leftover: Vec<String>) -> ReadEnd {
        for record in &leftover {
            if let Some(end) = self.handle_record(record) {
                return end;
            }
        }

        while let Some(frame) = source.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    for record in split_records(text.as_str()) {
                        if let Some(end) = self.handle_record(record) {
                            return end;
                        }
                    }
                }
                Ok(Message::Close(_)) => return ReadEnd::Dropped,
                Ok(_) => {}
                Err(e) => {
                    log::debug!("Hub read error: {e}");
                    return ReadEnd::Dropped;
                }
            }
        }
        ReadEnd::Dropped
    }

    fn handle_record(&self, record: &str) -> Option<ReadEnd> {
        match HubMessage::decode(record) {
            Ok(HubMessage::Invocation { target, arguments, .. }) => self.dispatch(&target, &arguments),
            Ok(HubMessage::Completion { invocation_id, result }) => self.complete(&invocation_id, result),
            Ok(HubMessage::Ping) => {}
            Ok(HubMessage::Close { error, allow_reconnect }) => {
                return Some(if allow_reconnect {
                    ReadEnd::Dropped
                } else {
                    ReadEnd::Closed { error }
                });
            }
            Err(e) => log::warn!("Dropping undecodable hub record: {e}"),
        }
        None
    }

    fn dispatch(&self, target: &str, arguments: &[Value]) {
        let event = match HubEvent::decode(target, arguments) {
            Ok(Some(event)) => event,
            Ok(None) => {
                log::debug!("Ignoring unknown hub method {target}");
                return;
            }
            Err(e) => {
                log::warn!("Dropping {target}: {e}");
                return;
            }
        };

        // Snapshot so handlers may (un)subscribe without deadlocking.
        let handlers: Vec<Handler> = lock(&self.handlers)
            .get(&event.kind())
            .map(|subs| subs.iter().map(|s| s.handler.clone()).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            log::trace!("No handlers for {}", event.kind());
        }
        for handler in handlers {
            handler(&event);
        }
    }

    fn complete(&self, invocation_id: &str, result: Result<Value, String>) {
        let pending = invocation_id
            .parse::<u64>()
            .ok()
            .and_then(|id| lock(&self.pending).remove(&id));
        let Some(PendingReply { method, reply }) = pending else {
            log::debug!("Completion for unknown invocation {invocation_id}");
            return;
        };
        let result = result.map_err(|message| ChannelError::RemoteRejected {
            method: method.as_str().to_string(),
            message,
        });
        let _ = reply.send(result);
    }

    fn fail_pending(&self, error: ChannelError) {
        let drained: Vec<PendingReply> = lock(&self.pending).drain().map(|(_, p)| p).collect();
        if !drained.is_empty() {
            log::debug!("Failing {} outstanding invocations: {error}", drained.len());
        }
        for pending in drained {
            let _ = pending.reply.send(Err(error.clone()));
        }
    }
}

/// Open the WebSocket and exchange the hub handshake records.
async fn handshake(url: &str) -> Result<Established, ConnectFailure> {
    let (mut ws, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(classify_ws_error)?;

    ws.send(Message::text(encode_handshake_request()))
        .await
        .map_err(|e| ConnectFailure::Network(e.to_string()))?;

    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                let mut records = split_records(text.as_str());
                let Some(first) = records.next() else {
                    continue;
                };
                return match decode_handshake_response(first) {
                    Ok(Ok(())) => {
                        let leftover = records.map(str::to_string).collect();
                        Ok(Established { stream: ws, leftover })
                    }
                    Ok(Err(message)) => Err(ConnectFailure::HandshakeRejected(message)),
                    Err(e) => Err(ConnectFailure::HandshakeRejected(e.to_string())),
                };
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(ConnectFailure::Network("closed during handshake".to_string()))
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(ConnectFailure::Network(e.to_string())),
        }
    }
}

/// Forward outgoing frames to the socket, pinging while idle.
fn spawn_writer(mut sink: WsSink, mut out_rx: mpsc::Receiver<Message>, keepalive: Duration) {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + keepalive;
        let mut ticker = tokio::time::interval_at(start, keepalive);
        loop {
            let message = tokio::select! {
                next = out_rx.recv() => match next {
                    Some(message) => message,
                    None => break,
                },
                _ = ticker.tick() => match HubMessage::Ping.encode() {
                    Ok(record) => Message::text(record),
                    Err(_) => continue,
                },
            };
            if let Err(e) = sink.send(message).await {
                log::debug!("Hub write failed: {e}");
                break;
            }
        }
        let _ = sink.close().await;
    });
}

fn to_arg<T: Serialize>(value: &T) -> Result<Value, ChannelError> {
    serde_json::to_value(value)
        .map_err(|e| ChannelError::Protocol(ProtocolError::Serialization(e.to_string())))
}

/// The hub reads the bearer token from the `access_token` query parameter.
fn hub_url_with_token(hub_url: &str, token: &str) -> Result<String, ConnectFailure> {
    let mut url = reqwest::Url::parse(hub_url).map_err(|e| ConnectFailure::InvalidUrl(e.to_string()))?;
    url.query_pairs_mut().append_pair("access_token", token);
    Ok(url.into())
}

fn classify_ws_error(error: tungstenite::Error) -> ConnectFailure {
    match error {
        tungstenite::Error::Http(response)
            if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) =>
        {
            ConnectFailure::Unauthorized(format!("HTTP {}", response.status()))
        }
        tungstenite::Error::Url(e) => ConnectFailure::InvalidUrl(e.to_string()),
        other => ConnectFailure::Network(other.to_string()),
    }
}
