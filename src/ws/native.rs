//! Native WebSocket connection — `tokio-tungstenite`.
//!
//! One background task per connection owns the socket and the subscription
//! routes. It handles:
//! - keepalive (adapter text ping or protocol ping) with a pong deadline
//! - exponential backoff reconnection with jitter
//! - replay of every tracked subscription after a reconnect
//! - per-subscription bounded queues, so a slow consumer only drops its own
//!   messages

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::WsError;
use crate::exchange::ExchangeAdapter;
use crate::ws::subscriptions::{RouteChange, RouteId, Routes};
use crate::ws::{Channel, ConnectionState, Subscription, WsConfig, WsEvent, WsMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

const COMMAND_CAPACITY: usize = 256;

// ─── Commands from public API to background task ─────────────────────────────

enum Command {
    Subscribe {
        subscription: Subscription,
        route: RouteId,
        sink: mpsc::Sender<WsEvent>,
    },
    Unsubscribe {
        subscription: Subscription,
        route: RouteId,
    },
    /// Unsubscribe and subscribe again on the wire, keeping the routes.
    Resubscribe(Subscription),
    Disconnect,
}

// ─── Disconnect reasons for reconnection decision ────────────────────────────

enum DisconnectReason {
    UserRequested,
    Closed { code: u16, reason: String },
    RateLimited,
    PongTimeout,
    Error(String),
}

impl DisconnectReason {
    fn into_error(self) -> WsError {
        match self {
            DisconnectReason::UserRequested => WsError::NotConnected,
            DisconnectReason::Closed { code, reason } => WsError::Closed {
                code: Some(code),
                reason,
            },
            DisconnectReason::RateLimited => WsError::Closed {
                code: Some(1008),
                reason: "rate limited".into(),
            },
            DisconnectReason::PongTimeout => WsError::ConnectionFailed("pong timeout".into()),
            DisconnectReason::Error(reason) => WsError::ConnectionFailed(reason),
        }
    }
}

// ─── Background task state ───────────────────────────────────────────────────

struct TaskState {
    url: String,
    config: WsConfig,
    adapter: Arc<dyn ExchangeAdapter>,
    cmd_rx: mpsc::Receiver<Command>,
    routes: Routes,
    reconnect_attempts: u32,
    next_request_id: u64,
    /// Subscribe requests awaiting an ack, for exchanges whose rejections
    /// only echo the request id.
    pending: HashMap<u64, Subscription>,
    connection_state: Arc<AtomicU16>,
}

impl TaskState {
    fn set_state(&self, state: ConnectionState) {
        self.connection_state.store(state as u16, Ordering::SeqCst);
    }

    fn should_reconnect(&self) -> bool {
        self.config.reconnect && self.reconnect_attempts < self.config.max_reconnect_attempts
    }

    fn request_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.next_request_id
    }

    /// Terminal failure: every subscriber gets `Failed` and its queue closes.
    fn fail_all(&mut self, error: WsError) {
        let subscriptions: Vec<_> = self.routes.subscriptions().cloned().collect();
        for subscription in subscriptions {
            for sink in self.routes.remove_all(&subscription) {
                let _ = sink.try_send(WsEvent::Failed(error.clone()));
            }
        }
    }

    /// Apply a command while no socket is open. Returns `false` on shutdown.
    fn apply_offline(&mut self, cmd: Option<Command>) -> bool {
        match cmd {
            Some(Command::Subscribe {
                subscription,
                route,
                sink,
            }) => {
                self.routes.add(subscription, route, sink);
                true
            }
            Some(Command::Unsubscribe { subscription, route }) => {
                self.routes.remove(&subscription, route);
                true
            }
            // Replayed on connect anyway.
            Some(Command::Resubscribe(_)) => true,
            Some(Command::Disconnect) | None => false,
        }
    }
}

// ─── Public handles ──────────────────────────────────────────────────────────

/// A multiplexed exchange stream connection.
///
/// Cheap to share behind an `Arc`; each `subscribe` call gets its own queue.
pub struct WsConnection {
    url: String,
    dispatch_capacity: usize,
    cmd_tx: mpsc::Sender<Command>,
    next_route: AtomicU64,
    connection_state: Arc<AtomicU16>,
    task: async_lock::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection")
            .field("url", &self.url)
            .field("state", &self.state())
            .finish()
    }
}

impl WsConnection {
    /// Spawn the connection task. Must be called within a tokio runtime.
    pub fn connect(
        url: impl Into<String>,
        config: WsConfig,
        adapter: Arc<dyn ExchangeAdapter>,
    ) -> Self {
        let url = url.into();
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let connection_state = Arc::new(AtomicU16::new(ConnectionState::Connecting as u16));

        let state = TaskState {
            url: url.clone(),
            config: config.clone(),
            adapter,
            cmd_rx,
            routes: Routes::new(),
            reconnect_attempts: 0,
            next_request_id: 0,
            pending: HashMap::new(),
            connection_state: Arc::clone(&connection_state),
        };
        let handle = tokio::spawn(run_task(state));

        Self {
            url,
            dispatch_capacity: config.dispatch_capacity.max(1),
            cmd_tx,
            next_route: AtomicU64::new(1),
            connection_state,
            task: async_lock::Mutex::new(Some(handle)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from(self.connection_state.load(Ordering::SeqCst))
    }

    /// Whether the task has stopped for good.
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    /// Open a route to `subscription`. The exchange is only asked to
    /// subscribe for the first route of a stream.
    pub async fn subscribe(&self, subscription: Subscription) -> Result<SubscriptionHandle, WsError> {
        let (sink, events) = mpsc::channel(self.dispatch_capacity);
        let route = self.next_route.fetch_add(1, Ordering::Relaxed);
        self.cmd_tx
            .send(Command::Subscribe {
                subscription: subscription.clone(),
                route,
                sink,
            })
            .await
            .map_err(|_| WsError::NotConnected)?;
        tracing::debug!(%subscription, route, "Route opened");

        Ok(SubscriptionHandle {
            subscription,
            route,
            events,
            cmd_tx: self.cmd_tx.clone(),
        })
    }

    /// Stop the task, closing the socket and every subscriber queue.
    pub async fn close(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect).await;
        if let Some(handle) = self.task.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
        self.connection_state
            .store(ConnectionState::Disconnected as u16, Ordering::SeqCst);
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

/// One subscriber's view of a stream. Dropping it unsubscribes.
pub struct SubscriptionHandle {
    subscription: Subscription,
    route: RouteId,
    events: mpsc::Receiver<WsEvent>,
    cmd_tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("subscription", &self.subscription)
            .field("route", &self.route)
            .finish()
    }
}

impl SubscriptionHandle {
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Next event; `None` once the connection is closed or failed.
    pub async fn recv(&mut self) -> Option<WsEvent> {
        self.events.recv().await
    }

    /// Ask the exchange to restart this stream (e.g. for a fresh snapshot).
    pub async fn resubscribe(&self) -> Result<(), WsError> {
        self.cmd_tx
            .send(Command::Resubscribe(self.subscription.clone()))
            .await
            .map_err(|_| WsError::NotConnected)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        let cmd = Command::Unsubscribe {
            subscription: self.subscription.clone(),
            route: self.route,
        };
        if self.cmd_tx.try_send(cmd).is_err() {
            // The route is pruned on the next dispatch once the queue is seen closed.
            tracing::debug!(subscription = %self.subscription, "Deferred unsubscribe");
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_task(mut state: TaskState) {
    let mut connected_before = false;

    loop {
        state.set_state(if connected_before {
            ConnectionState::Resubscribing
        } else {
            ConnectionState::Connecting
        });

        // ── 1. Attempt connection ────────────────────────────────────────
        let timeout = Duration::from_millis(state.config.connect_timeout_ms);
        let (mut sink, stream) = match attempt_connect(&state.url, timeout).await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!(url = %state.url, error = %e, "WebSocket connection failed");
                if state.should_reconnect() {
                    let delay = next_backoff(&mut state, false);
                    if wait_offline(&mut state, delay).await {
                        continue;
                    }
                    break;
                }
                let error = if state.config.reconnect {
                    WsError::MaxReconnectReached
                } else {
                    WsError::ConnectionFailed(e)
                };
                state.fail_all(error);
                break;
            }
        };

        // ── 2. Connected: replay subscriptions ───────────────────────────
        state.reconnect_attempts = 0;
        state.pending.clear();
        subscribe_all(&mut state, &mut sink).await;
        state.set_state(ConnectionState::Subscribed);
        if connected_before {
            tracing::info!(url = %state.url, "Reconnected");
            for orphan in state.routes.broadcast(&WsEvent::Resubscribed) {
                send_unsubscribe(&mut state, &mut sink, &orphan).await;
            }
        } else {
            tracing::info!(url = %state.url, "Connected");
        }
        connected_before = true;

        // ── 3. Inner select! loop ────────────────────────────────────────
        let reason = run_connected(&mut state, sink, stream).await;

        // ── 4. Post-disconnect decision ──────────────────────────────────
        let rate_limited = match reason {
            DisconnectReason::UserRequested => break,
            DisconnectReason::RateLimited => true,
            _ => false,
        };
        if state.should_reconnect() {
            state.set_state(ConnectionState::Resubscribing);
            let delay = next_backoff(&mut state, rate_limited);
            if wait_offline(&mut state, delay).await {
                continue;
            }
            break;
        }
        let error = if state.config.reconnect {
            WsError::MaxReconnectReached
        } else {
            reason.into_error()
        };
        state.fail_all(error);
        break;
    }

    state.set_state(ConnectionState::Disconnected);
    tracing::debug!(url = %state.url, "WebSocket task stopped");
}

/// The inner connected loop. Runs until the connection breaks.
async fn run_connected(
    state: &mut TaskState,
    mut sink: WsSink,
    mut stream: SplitStream<WsStream>,
) -> DisconnectReason {
    let ping_dur = Duration::from_millis(state.config.ping_interval_ms.max(1));
    let pong_dur = Duration::from_millis(state.config.pong_timeout_ms);

    let mut ping_interval = tokio::time::interval(ping_dur);
    ping_interval.reset(); // skip immediate first tick

    let mut pong_deadline: Option<tokio::time::Instant> = None;

    // Re-armed whenever a ping goes out; parked far in the future otherwise.
    let far_future = tokio::time::Instant::now() + Duration::from_secs(86400);
    let pong_sleep = tokio::time::sleep_until(far_future);
    tokio::pin!(pong_sleep);

    loop {
        tokio::select! {
            // ── a) Incoming WS message ───────────────────────────────────
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let text: &str = text.as_ref();
                        let messages = match state.adapter.parse_ws_message(text) {
                            Ok(messages) => messages,
                            Err(e) => {
                                tracing::warn!(error = %e, raw = text, "Unparseable WebSocket frame");
                                continue;
                            }
                        };
                        for message in messages {
                            if message == WsMessage::Pong {
                                pong_deadline = None;
                                pong_sleep.as_mut().reset(far_future);
                                continue;
                            }
                            handle_message(state, &mut sink, message).await;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        pong_deadline = None;
                        pong_sleep.as_mut().reset(far_future);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = extract_close(frame.as_ref());
                        tracing::info!(code, %reason, "WebSocket closed by server");
                        return match code {
                            1008 => DisconnectReason::RateLimited,
                            _ => DisconnectReason::Closed { code, reason },
                        };
                    }
                    Some(Ok(_)) => {} // Binary, Frame: ignored
                    Some(Err(e)) => {
                        let reason = e.to_string();
                        tracing::error!(error = %reason, "WebSocket error");
                        return DisconnectReason::Error(reason);
                    }
                    None => {
                        return DisconnectReason::Error("stream ended".into());
                    }
                }
            }

            // ── b) Command from public API ───────────────────────────────
            cmd = state.cmd_rx.recv() => {
                match cmd {
                    Some(Command::Subscribe { subscription, route, sink: events }) => {
                        match state.routes.add(subscription.clone(), route, events) {
                            RouteChange::Subscribe => {
                                send_subscribe(state, &mut sink, &subscription).await;
                            }
                            // A late joiner of a snapshot-on-subscribe book stream needs a fresh snapshot.
                            _ if subscription.channel == Channel::OrderBook
                                && state.adapter.book_resync() == crate::exchange::BookResync::Resubscribe =>
                            {
                                send_unsubscribe(state, &mut sink, &subscription).await;
                                send_subscribe(state, &mut sink, &subscription).await;
                            }
                            _ => {}
                        }
                    }
                    Some(Command::Unsubscribe { subscription, route }) => {
                        if state.routes.remove(&subscription, route) == RouteChange::Unsubscribe {
                            send_unsubscribe(state, &mut sink, &subscription).await;
                        }
                    }
                    Some(Command::Resubscribe(subscription)) => {
                        if state.routes.contains(&subscription) {
                            tracing::debug!(%subscription, "Resubscribing");
                            send_unsubscribe(state, &mut sink, &subscription).await;
                            send_subscribe(state, &mut sink, &subscription).await;
                        }
                    }
                    Some(Command::Disconnect) | None => {
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "Client disconnect".into(),
                        }))).await;
                        return DisconnectReason::UserRequested;
                    }
                }
            }

            // ── c) Ping interval ─────────────────────────────────────────
            _ = ping_interval.tick() => {
                let ping = match state.adapter.ping_message() {
                    Some(text) => Message::Text(text.into()),
                    None => Message::Ping(Default::default()),
                };
                if let Err(e) = sink.send(ping).await {
                    tracing::warn!(error = %e, "Failed to send ping");
                } else if pong_deadline.is_none() {
                    let deadline = tokio::time::Instant::now() + pong_dur;
                    pong_deadline = Some(deadline);
                    pong_sleep.as_mut().reset(deadline);
                }
            }

            // ── d) Pong timeout ──────────────────────────────────────────
            () = &mut pong_sleep, if pong_deadline.is_some() => {
                tracing::warn!(
                    timeout_ms = state.config.pong_timeout_ms,
                    "Pong timeout"
                );
                let _ = sink.close().await;
                return DisconnectReason::PongTimeout;
            }
        }
    }
}

async fn handle_message(state: &mut TaskState, sink: &mut WsSink, message: WsMessage) {
    match message {
        WsMessage::Pong => {}
        WsMessage::Ack { request_id } => {
            if let Some(id) = request_id {
                state.pending.remove(&id);
            }
            tracing::trace!(?request_id, "Subscription acknowledged");
        }
        WsMessage::Error {
            subscription,
            request_id,
            code,
            message,
        } => {
            let pending = request_id.and_then(|id| state.pending.remove(&id));
            let Some(subscription) = subscription.or(pending) else {
                tracing::warn!(?request_id, %code, %message, "Exchange stream error");
                return;
            };
            tracing::warn!(%subscription, %code, %message, "Subscription rejected");
            let error = WsError::SubscriptionRejected { code, message };
            for events in state.routes.remove_all(&subscription) {
                let _ = events.try_send(WsEvent::Failed(error.clone()));
            }
        }
        data => {
            let Some(subscription) = data.subscription().cloned() else {
                return;
            };
            if state.routes.dispatch(&subscription, &WsEvent::Message(data)) {
                send_unsubscribe(state, sink, &subscription).await;
            }
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn attempt_connect(
    url: &str,
    timeout: Duration,
) -> Result<(WsSink, SplitStream<WsStream>), String> {
    let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| "connection timeout".to_string())?
        .map_err(|e| e.to_string())?;

    Ok(ws_stream.split())
}

async fn send_text(sink: &mut WsSink, text: String) -> Result<(), WsError> {
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| WsError::SendFailed(e.to_string()))
}

async fn send_subscribe(state: &mut TaskState, sink: &mut WsSink, subscription: &Subscription) {
    let id = state.request_id();
    let result = match state.adapter.subscribe_message(subscription, id) {
        Ok(text) => send_text(sink, text).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            state.pending.insert(id, subscription.clone());
        }
        Err(e) => tracing::warn!(%subscription, error = %e, "Failed to subscribe"),
    }
}

async fn send_unsubscribe(state: &mut TaskState, sink: &mut WsSink, subscription: &Subscription) {
    state.pending.retain(|_, pending| pending != subscription);
    let id = state.request_id();
    let result = match state.adapter.unsubscribe_message(subscription, id) {
        Ok(text) => send_text(sink, text).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::warn!(%subscription, error = %e, "Failed to unsubscribe");
    }
}

async fn subscribe_all(state: &mut TaskState, sink: &mut WsSink) {
    let subscriptions: Vec<_> = state.routes.subscriptions().cloned().collect();
    if subscriptions.is_empty() {
        return;
    }
    tracing::info!(count = subscriptions.len(), "Subscribing to tracked streams");
    for subscription in &subscriptions {
        send_subscribe(state, sink, subscription).await;
    }
}

/// Extract close code and reason from an optional CloseFrame.
fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.to_string()),
        None => (1006, "No close frame".into()),
    }
}

// ─── Reconnection backoff ────────────────────────────────────────────────────

fn next_backoff(state: &mut TaskState, rate_limited: bool) -> Duration {
    state.reconnect_attempts += 1;
    let jitter = if state.config.max_jitter_ms == 0 {
        0
    } else {
        rand::random::<u64>() % state.config.max_jitter_ms
    };
    let delay = backoff_delay(&state.config, state.reconnect_attempts, rate_limited, jitter);

    tracing::info!(
        attempt = state.reconnect_attempts,
        max = state.config.max_reconnect_attempts,
        delay_ms = delay.as_millis() as u64,
        rate_limited,
        "Scheduling reconnect"
    );
    delay
}

/// `base * 2^(attempt-1) + jitter`, capped. Rate-limited closes allow a cap
/// five times longer.
fn backoff_delay(config: &WsConfig, attempt: u32, rate_limited: bool, jitter_ms: u64) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let base = config.base_reconnect_delay_ms.saturating_mul(1u64 << exp);
    let cap = if rate_limited {
        config.max_reconnect_delay_ms.saturating_mul(5)
    } else {
        config.max_reconnect_delay_ms
    };
    Duration::from_millis(base.saturating_add(jitter_ms).min(cap))
}

/// Sleep out a backoff while still accepting commands. Returns `false` on
/// shutdown.
async fn wait_offline(state: &mut TaskState, delay: Duration) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => return true,
            cmd = state.cmd_rx.recv() => {
                if !state.apply_offline(cmd) {
                    return false;
                }
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
