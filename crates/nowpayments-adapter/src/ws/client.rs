/*
[INPUT]:  WebSocket configuration, caller commands (connect / subscribe / close)
[OUTPUT]: Authenticated connection, routed status events, lifecycle notifications
[POS]:    WebSocket layer - connection worker and its public handle
[UPDATE]: When changing handshake, reconnection flow or shutdown semantics
*/

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::{SANDBOX_WS_URL, WS_URL};
use crate::error::{NowPaymentsError, Result};

use super::dispatcher::{EventDispatcher, Notification, Observer};
use super::message::{ControlFrame, HandshakeReply, InboundEvent, classify_handshake_reply};
use super::reconnect::{ReconnectConfig, ReconnectStrategy};
use super::subscription::{Listener, Removal, SubscriptionHandle, SubscriptionRegistry, listener};
use super::transport::{Connector, TungsteniteConnector, WsTransport};

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);
const CLOSE_REASON: &str = "closed by client";

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub url: String,
    pub api_key: String,
    /// Bound on connect + auth acknowledgement
    pub handshake_timeout: Duration,
    /// Heartbeat ping period; `None` disables it
    pub ping_interval: Option<Duration>,
    pub reconnect: ReconnectConfig,
}

impl WebSocketConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            url: WS_URL.to_string(),
            api_key: api_key.into(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            ping_interval: Some(DEFAULT_PING_INTERVAL),
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn sandbox(api_key: impl Into<String>) -> Self {
        Self {
            url: SANDBOX_WS_URL.to_string(),
            ..Self::new(api_key)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Terminal
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Command {
    Connect {
        reply: oneshot::Sender<Result<ConnectionState>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
    Update(Update),
}

/// Registry changes; accepted in every non-terminal phase
enum Update {
    Subscribe {
        key: String,
        listener: Listener,
        reply: oneshot::Sender<Result<SubscriptionHandle>>,
    },
    Unsubscribe {
        handle: SubscriptionHandle,
        reply: oneshot::Sender<bool>,
    },
    AddObserver {
        observer: Observer,
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a NOWPayments WebSocket connection.
///
/// All connection state lives in a single worker task; this handle only
/// sends it commands. Subscriptions registered while disconnected are kept
/// and sent once the connection is (re-)established. Dropping the handle
/// shuts the worker down.
pub struct NowPaymentsWebSocket {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown: CancellationToken,
    worker: JoinHandle<()>,
}

impl NowPaymentsWebSocket {
    pub fn new(config: WebSocketConfig) -> Result<Self> {
        Self::with_connector(config, Arc::new(TungsteniteConnector))
    }

    /// Build with a custom transport connector. Must be called inside a
    /// tokio runtime.
    pub fn with_connector(config: WebSocketConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(NowPaymentsError::validation("api_key", "API key is required"));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|err| {
            NowPaymentsError::websocket_with_source("no tokio runtime available", err)
        })?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let shutdown = CancellationToken::new();

        let worker = ConnectionWorker {
            strategy: ReconnectStrategy::new(config.reconnect),
            config,
            connector,
            cmd_rx,
            state_tx,
            shutdown: shutdown.clone(),
            registry: SubscriptionRegistry::new(),
            dispatcher: EventDispatcher::new(),
            close_waiters: Vec::new(),
        };
        let worker = runtime.spawn(worker.run());

        Ok(Self {
            cmd_tx,
            state_rx,
            shutdown,
            worker,
        })
    }

    /// Open and authenticate the connection.
    ///
    /// Only the very first failure is returned here; once connected, drops
    /// are handled by the reconnect loop and reported as notifications.
    /// Calling this while already connecting, connected or reconnecting
    /// returns the current state without side effects.
    pub async fn connect(&self) -> Result<ConnectionState> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Connect { reply })?;
        rx.await.map_err(|_| closed_error())?
    }

    /// Close the connection for good. Idempotent.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Close { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Register `listener` for events routed to `key` (a payment id, or an
    /// event type such as `payment_status` for every event of that type).
    pub async fn subscribe(
        &self,
        key: impl Into<String>,
        listener: Listener,
    ) -> Result<SubscriptionHandle> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(NowPaymentsError::validation("key", "subscription key must not be empty"));
        }
        let (reply, rx) = oneshot::channel();
        self.send(Command::Update(Update::Subscribe {
            key,
            listener,
            reply,
        }))?;
        rx.await.map_err(|_| closed_error())?
    }

    /// Returns true if the listener was registered
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Update(Update::Unsubscribe {
            handle: handle.clone(),
            reply,
        }))?;
        rx.await.map_err(|_| closed_error())
    }

    /// Subscribe with a listener that forwards every event into a channel
    pub async fn subscribe_channel(
        &self,
        key: impl Into<String>,
    ) -> Result<(SubscriptionHandle, mpsc::UnboundedReceiver<InboundEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let forward = listener(move |event| {
            // receiver gone means the caller stopped listening
            let _ = tx.send(event.clone());
            Ok(())
        });
        let handle = self.subscribe(key, forward).await?;
        Ok((handle, rx))
    }

    /// Register a lifecycle observer; observers run in registration order
    pub async fn on_notification(&self, observer: Observer) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Update(Update::AddObserver { observer, reply }))?;
        rx.await.map_err(|_| closed_error())
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx.send(cmd).map_err(|_| closed_error())
    }
}

impl fmt::Debug for NowPaymentsWebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NowPaymentsWebSocket")
            .field("state", &self.state())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl Drop for NowPaymentsWebSocket {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn closed_error() -> NowPaymentsError {
    NowPaymentsError::websocket("client closed")
}

enum Phase {
    /// Not connected and not trying to; waits for `connect()`
    Idle,
    Live(Box<dyn WsTransport>),
    Backoff {
        deadline: Instant,
    },
    Closed,
}

enum LiveEvent {
    Shutdown,
    Command(Option<Command>),
    Frame(Option<Result<String>>),
    Heartbeat,
}

enum WaitEvent {
    Shutdown,
    Command(Option<Command>),
    Elapsed,
}

struct ConnectionWorker {
    config: WebSocketConfig,
    connector: Arc<dyn Connector>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
    registry: SubscriptionRegistry,
    dispatcher: EventDispatcher,
    strategy: ReconnectStrategy,
    /// `close()` calls that arrived mid-handshake
    close_waiters: Vec<oneshot::Sender<()>>,
}

impl ConnectionWorker {
    async fn run(mut self) {
        let mut phase = Phase::Idle;
        loop {
            phase = match phase {
                Phase::Idle => self.idle().await,
                Phase::Live(transport) => self.live(transport).await,
                Phase::Backoff { deadline } => self.backoff(deadline).await,
                Phase::Closed => break,
            };
        }
        self.drain().await;
        debug!("ws worker stopped");
    }

    async fn idle(&mut self) -> Phase {
        loop {
            let cmd = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => None,
                cmd = self.cmd_rx.recv() => cmd,
            };
            let Some(cmd) = cmd else {
                return self.shut_down(None).await;
            };

            match cmd {
                Command::Connect { reply } => match self.handshake().await {
                    Ok(transport) => {
                        let phase = self.establish(transport).await;
                        let _ = reply.send(Ok(self.current_state()));
                        return phase;
                    }
                    Err(err) if self.shutdown.is_cancelled() => {
                        let _ = reply.send(Err(err));
                        return self.shut_down(None).await;
                    }
                    Err(err) => {
                        warn!(url = %self.config.url, error = %err, "ws connect failed");
                        self.set_state(ConnectionState::Disconnected);
                        let _ = reply.send(Err(err));
                    }
                },
                Command::Close { reply } => {
                    let phase = self.shut_down(None).await;
                    let _ = reply.send(());
                    return phase;
                }
                Command::Update(update) => self.apply_offline(update),
            }
        }
    }

    async fn live(&mut self, mut transport: Box<dyn WsTransport>) -> Phase {
        let mut heartbeat = self.config.ping_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => LiveEvent::Shutdown,
                cmd = self.cmd_rx.recv() => LiveEvent::Command(cmd),
                frame = transport.next_text() => LiveEvent::Frame(frame),
                _ = tick(&mut heartbeat) => LiveEvent::Heartbeat,
            };

            match event {
                LiveEvent::Shutdown | LiveEvent::Command(None) => {
                    return self.shut_down(Some(transport)).await;
                }
                LiveEvent::Command(Some(Command::Connect { reply })) => {
                    let _ = reply.send(Ok(ConnectionState::Connected));
                }
                LiveEvent::Command(Some(Command::Close { reply })) => {
                    let phase = self.shut_down(Some(transport)).await;
                    let _ = reply.send(());
                    return phase;
                }
                LiveEvent::Command(Some(Command::Update(update))) => {
                    if let Err(err) = self.apply_live(update, transport.as_mut()).await {
                        return self.connection_lost(format!("send failed: {err}"));
                    }
                }
                LiveEvent::Frame(Some(Ok(raw))) => {
                    self.dispatcher.on_frame(&raw, &self.registry);
                }
                LiveEvent::Frame(Some(Err(err))) => {
                    return self.connection_lost(err.to_string());
                }
                LiveEvent::Frame(None) => {
                    return self.connection_lost("connection closed by server".to_string());
                }
                LiveEvent::Heartbeat => {
                    if let Err(err) = send_frame(transport.as_mut(), &ControlFrame::Ping).await {
                        return self.connection_lost(format!("heartbeat failed: {err}"));
                    }
                }
            }
        }
    }

    async fn backoff(&mut self, deadline: Instant) -> Phase {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => WaitEvent::Shutdown,
                cmd = self.cmd_rx.recv() => WaitEvent::Command(cmd),
                _ = tokio::time::sleep_until(deadline) => WaitEvent::Elapsed,
            };

            match event {
                WaitEvent::Shutdown | WaitEvent::Command(None) => return self.shut_down(None).await,
                WaitEvent::Command(Some(Command::Connect { reply })) => {
                    let _ = reply.send(Ok(ConnectionState::Reconnecting));
                }
                WaitEvent::Command(Some(Command::Close { reply })) => {
                    let phase = self.shut_down(None).await;
                    let _ = reply.send(());
                    return phase;
                }
                WaitEvent::Command(Some(Command::Update(update))) => self.apply_offline(update),
                WaitEvent::Elapsed => return self.reconnect().await,
            }
        }
    }

    async fn reconnect(&mut self) -> Phase {
        match self.handshake().await {
            Ok(transport) => self.establish(transport).await,
            Err(_) if self.shutdown.is_cancelled() => self.shut_down(None).await,
            Err(err) => {
                warn!(attempt = self.strategy.attempts(), error = %err, "ws reconnect failed");
                self.dispatcher.notify(&Notification::Error(err));
                self.schedule_reconnect()
            }
        }
    }

    /// Connect and wait for the auth acknowledgement. Commands keep being
    /// served meanwhile: `connect()` gets the current state, registry
    /// changes are recorded for the replay and `close()` aborts the attempt.
    async fn handshake(&mut self) -> Result<Box<dyn WsTransport>> {
        self.set_state(ConnectionState::Connecting);
        info!(url = %self.config.url, "ws connecting");

        let attempt = authenticate(
            Arc::clone(&self.connector),
            self.config.url.clone(),
            self.config.api_key.clone(),
            self.config.handshake_timeout,
        );
        tokio::pin!(attempt);

        loop {
            let cmd = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Err(closed_error()),
                result = &mut attempt => return result,
                cmd = self.cmd_rx.recv() => cmd,
            };

            match cmd {
                Some(Command::Connect { reply }) => {
                    let _ = reply.send(Ok(self.current_state()));
                }
                Some(Command::Close { reply }) => {
                    self.close_waiters.push(reply);
                    self.shutdown.cancel();
                    return Err(closed_error());
                }
                Some(Command::Update(update)) => self.apply_offline(update),
                None => {
                    self.shutdown.cancel();
                    return Err(closed_error());
                }
            }
        }
    }

    /// Enter Connected and replay every tracked key
    async fn establish(&mut self, mut transport: Box<dyn WsTransport>) -> Phase {
        self.set_state(ConnectionState::Connected);
        info!(
            url = %self.config.url,
            keys = self.registry.keys().count(),
            "ws connected"
        );
        self.dispatcher.notify(&Notification::Connected);

        let keys: Vec<String> = self.registry.keys().map(str::to_string).collect();
        for key in keys {
            let frame = ControlFrame::Subscribe { key };
            if let Err(err) = send_frame(transport.as_mut(), &frame).await {
                return self.connection_lost(format!("resubscribe failed: {err}"));
            }
        }

        self.strategy.reset();
        Phase::Live(transport)
    }

    fn connection_lost(&mut self, reason: String) -> Phase {
        warn!(%reason, "ws connection lost");
        self.dispatcher.notify(&Notification::Disconnected { reason });
        self.schedule_reconnect()
    }

    fn schedule_reconnect(&mut self) -> Phase {
        match self.strategy.next_delay() {
            Some(delay) => {
                let attempt = self.strategy.attempts();
                self.set_state(ConnectionState::Reconnecting);
                info!(attempt, ?delay, "ws reconnect scheduled");
                self.dispatcher
                    .notify(&Notification::Reconnecting { attempt, delay });
                Phase::Backoff {
                    deadline: Instant::now() + delay,
                }
            }
            None => {
                let attempts = self.strategy.attempts();
                warn!(attempts, "ws reconnect attempts exhausted");
                self.set_state(ConnectionState::Closed);
                self.dispatcher
                    .notify(&Notification::ReconnectFailed { attempts });
                Phase::Closed
            }
        }
    }

    async fn shut_down(&mut self, transport: Option<Box<dyn WsTransport>>) -> Phase {
        if let Some(mut transport) = transport {
            if tokio::time::timeout(self.config.handshake_timeout, transport.close())
                .await
                .is_err()
            {
                debug!("ws close handshake timed out");
            }
            self.dispatcher.notify(&Notification::Disconnected {
                reason: CLOSE_REASON.to_string(),
            });
        }
        self.set_state(ConnectionState::Closed);
        info!("ws closed");
        for waiter in self.close_waiters.drain(..) {
            let _ = waiter.send(());
        }
        Phase::Closed
    }

    async fn apply_live(&mut self, update: Update, transport: &mut dyn WsTransport) -> Result<()> {
        match update {
            Update::Subscribe {
                key,
                listener,
                reply,
            } => {
                let (handle, is_new_key) = self.registry.add(&key, listener);
                let _ = reply.send(Ok(handle));
                if is_new_key {
                    send_frame(transport, &ControlFrame::Subscribe { key }).await?;
                }
            }
            Update::Unsubscribe { handle, reply } => {
                let removal = self.registry.remove(&handle);
                let _ = reply.send(removal != Removal::NotFound);
                if removal == Removal::LastForKey {
                    let frame = ControlFrame::Unsubscribe {
                        key: handle.key().to_string(),
                    };
                    if let Err(err) = send_frame(transport, &frame).await {
                        warn!(key = handle.key(), error = %err, "ws unsubscribe not sent");
                    }
                }
            }
            Update::AddObserver { observer, reply } => {
                self.dispatcher.add_observer(observer);
                let _ = reply.send(());
            }
        }
        Ok(())
    }

    /// Record the change; it reaches the server on the next connect
    fn apply_offline(&mut self, update: Update) {
        match update {
            Update::Subscribe {
                key,
                listener,
                reply,
            } => {
                let (handle, is_new_key) = self.registry.add(&key, listener);
                debug!(%key, is_new_key, "ws subscription recorded");
                let _ = reply.send(Ok(handle));
            }
            Update::Unsubscribe { handle, reply } => {
                let removal = self.registry.remove(&handle);
                let _ = reply.send(removal != Removal::NotFound);
            }
            Update::AddObserver { observer, reply } => {
                self.dispatcher.add_observer(observer);
                let _ = reply.send(());
            }
        }
    }

    /// Answer commands until every handle is gone
    async fn drain(&mut self) {
        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                Command::Connect { reply } => {
                    let _ = reply.send(Err(closed_error()));
                }
                Command::Close { reply } => {
                    let _ = reply.send(());
                }
                Command::Update(Update::Subscribe { reply, .. }) => {
                    let _ = reply.send(Err(closed_error()));
                }
                Command::Update(update) => self.apply_offline(update),
            }
        }
    }

    fn current_state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "ws state changed");
        }
    }
}

async fn authenticate(
    connector: Arc<dyn Connector>,
    url: String,
    api_key: String,
    timeout: Duration,
) -> Result<Box<dyn WsTransport>> {
    let attempt = async {
        let mut transport = connector.connect(&url).await?;
        transport
            .send_text(ControlFrame::Auth { api_key }.to_text())
            .await?;

        loop {
            match transport.next_text().await {
                Some(Ok(raw)) => match classify_handshake_reply(&raw) {
                    HandshakeReply::Ack => return Ok(transport),
                    HandshakeReply::Rejected(message) => {
                        transport.close().await;
                        return Err(NowPaymentsError::websocket(format!(
                            "authentication rejected: {message}"
                        )));
                    }
                    HandshakeReply::Ignored => {
                        debug!(bytes = raw.len(), "ws frame before auth ack ignored");
                    }
                },
                Some(Err(err)) => return Err(err),
                None => {
                    return Err(NowPaymentsError::websocket(
                        "connection closed during handshake",
                    ));
                }
            }
        }
    };

    tokio::time::timeout(timeout, attempt)
        .await
        .unwrap_or_else(|_| {
            Err(NowPaymentsError::websocket(format!(
                "handshake timed out after {timeout:?}"
            )))
        })
}

async fn send_frame(transport: &mut dyn WsTransport, frame: &ControlFrame) -> Result<()> {
    debug!(action = frame.action(), "ws send");
    transport.send_text(frame.to_text()).await
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
