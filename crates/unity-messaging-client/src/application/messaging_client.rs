//! The messaging client: a cloneable facade over one actor task.
//!
//! # Overview
//!
//! ```text
//!   MessagingClient (Clone) ──Command──▶ ClientActor (one tokio task)
//!         ▲                                 │  owns: session flags, queue,
//!         │ oneshot replies                 │  rate limits, pending requests,
//!         └─────────────────────────────────┘  heartbeat, transport handle
//!
//!   LivenessSource ──mpsc──▶ actor ──TransportFactory::open──▶ Transport
//!   Transport ──TransportEvent──▶ actor ──▶ Subjects / HandlerRegistry
//! ```
//!
//! All mutable state lives in the actor and is only touched between `.await`
//! points of its single `select!` loop, so no locks guard it.  The heartbeat
//! and request timeouts are deadlines held as data; the loop sleeps until the
//! earliest one.  Oversized frames travel over short-lived TCP exchanges that
//! run in a [`JoinSet`] owned by the actor and are aborted on dispose.
//!
//! # Connection lifecycle
//!
//! 1. The liveness source reports a running editor with pid `P`.
//! 2. The actor opens a transport towards `peer_host:(base + P mod 1000)`,
//!    marks the session connected and sends the first ping.
//! 3. The first ping reply (or an explicit `Online`) marks the session online
//!    and flushes every queued send in FIFO order.
//! 4. A socket failure, a close, or the liveness source reporting the editor
//!    gone ends the session.  Reconnecting is left to the liveness source.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};
use unity_messaging_core::{
    decode_message, encode_message, peer_port,
    protocol::{messages::needs_tcp_fallback, SequenceCounter},
    Message, MessageType, ProcessFlags, ProcessState, TcpCoordination, TestMode,
};

use crate::application::{
    error::MessagingError,
    events::{HandlerRegistry, Subject, Subscription},
    heartbeat::{HeartbeatEvent, HeartbeatScheduler},
    liveness::LivenessSource,
    pending::{parse_state_reply, PendingRequests, StateReply},
    queue::{complete, MessageQueue, QueuedMessage, SendReply},
    rate_limit::RateLimiter,
    settings::ClientSettings,
    transport::{Transport, TransportEvent, TransportFactory},
};

// ── Public types ──────────────────────────────────────────────────────────────

/// Snapshot of the client's connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    /// A transport is open towards a live editor process.
    pub connected: bool,
    /// The editor has answered since the current connection began.
    pub online: bool,
    pub process_id: Option<u32>,
    pub port: Option<u16>,
}

enum Command {
    Send {
        message: Message,
        reply: SendReply,
    },
    RequestState {
        timeout: Duration,
        sent: SendReply,
        reply: StateReply,
    },
    Dispose {
        done: oneshot::Sender<()>,
    },
}

/// Handle to a running messaging client.
///
/// Cloning is cheap; every clone talks to the same actor.  When the last
/// clone is dropped the actor tears down as if [`dispose`](Self::dispose)
/// had been called.
#[derive(Clone)]
pub struct MessagingClient {
    commands: mpsc::UnboundedSender<Command>,
    registry: HandlerRegistry,
    connection_changed: Subject<bool>,
    online_changed: Subject<bool>,
    status: watch::Receiver<ConnectionStatus>,
    disposed: Arc<AtomicBool>,
    request_timeout: Duration,
}

impl MessagingClient {
    /// Starts the actor on the current tokio runtime.
    ///
    /// The state currently held by `liveness` is applied immediately, so a
    /// client created while the editor is already running connects at once.
    pub fn spawn(
        settings: ClientSettings,
        liveness: &dyn LivenessSource,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let registry = HandlerRegistry::new();
        let connection_changed = Subject::new();
        let online_changed = Subject::new();
        let request_timeout = settings.request_timeout;

        let actor = ClientActor {
            heartbeat: HeartbeatScheduler::new(settings.heartbeat),
            rate_limiter: RateLimiter::new(settings.rate_limits.iter().copied()),
            settings,
            factory,
            commands: commands_rx,
            liveness: liveness.subscribe(),
            liveness_open: true,
            transport: None,
            events: None,
            session: None,
            generation: 0,
            queue: MessageQueue::new(),
            pending: PendingRequests::new(),
            request_ids: SequenceCounter::new(),
            tcp_tasks: JoinSet::new(),
            registry: registry.clone(),
            connection_changed: connection_changed.clone(),
            online_changed: online_changed.clone(),
            status: status_tx,
        };
        tokio::spawn(actor.run());

        Self {
            commands: commands_tx,
            registry,
            connection_changed,
            online_changed,
            status: status_rx,
            disposed: Arc::new(AtomicBool::new(false)),
            request_timeout,
        }
    }

    // ── Sending ───────────────────────────────────────────────────────────────

    /// Sends one message.
    ///
    /// Resolves once the frame was handed to the transport.  While the editor
    /// is not online a non-heartbeat message is queued and the future stays
    /// pending until the queue is flushed.  A rate-limited type sent too soon
    /// fails at once with [`MessagingError::RateLimited`].
    pub async fn send(
        &self,
        message_type: MessageType,
        value: impl Into<String>,
    ) -> Result<(), MessagingError> {
        let (reply, outcome) = oneshot::channel();
        self.command(Command::Send {
            message: Message::new(message_type, value),
            reply,
        })?;
        outcome.await.unwrap_or(Err(MessagingError::Disposed))
    }

    /// Asks the editor for the tests of `mode`.
    ///
    /// The answer arrives asynchronously as a `TestListRetrieved` message.
    pub async fn request_test_list(&self, mode: TestMode) -> Result<(), MessagingError> {
        self.send(MessageType::RetrieveTestList, mode.as_str()).await
    }

    /// Runs the tests matching `name` in `mode`.
    pub async fn execute_tests(&self, mode: TestMode, name: &str) -> Result<(), MessagingError> {
        self.send(MessageType::ExecuteTests, mode.with_name(name))
            .await
    }

    /// Asks the editor to refresh its asset database.
    pub async fn refresh_remote_state(&self) -> Result<(), MessagingError> {
        self.send(MessageType::Refresh, "").await
    }

    pub async fn play(&self) -> Result<(), MessagingError> {
        self.send(MessageType::Play, "").await
    }

    pub async fn stop(&self) -> Result<(), MessagingError> {
        self.send(MessageType::Stop, "").await
    }

    pub async fn pause(&self) -> Result<(), MessagingError> {
        self.send(MessageType::Pause, "").await
    }

    pub async fn unpause(&self) -> Result<(), MessagingError> {
        self.send(MessageType::Unpause, "").await
    }

    pub async fn build(&self) -> Result<(), MessagingError> {
        self.send(MessageType::Build, "").await
    }

    /// Queries the editor's play state.
    ///
    /// Resolves to `Ok(None)` when no matching reply arrives within
    /// `timeout`.  Fails only if the probe itself could not be sent or the
    /// client was disposed.
    pub async fn request_state(&self, timeout: Duration) -> Result<Option<String>, MessagingError> {
        let (sent, mut sent_outcome) = oneshot::channel();
        let (reply, mut state) = oneshot::channel();
        self.command(Command::RequestState {
            timeout,
            sent,
            reply,
        })?;

        tokio::select! {
            biased;
            result = &mut state => result.unwrap_or(Err(MessagingError::Disposed)),
            sent = &mut sent_outcome => match sent {
                Ok(Err(error)) => Err(error),
                _ => state.await.unwrap_or(Err(MessagingError::Disposed)),
            },
        }
    }

    /// [`request_state`](Self::request_state) with the configured timeout.
    pub async fn request_state_default(&self) -> Result<Option<String>, MessagingError> {
        self.request_state(self.request_timeout).await
    }

    // ── Observing ─────────────────────────────────────────────────────────────

    /// Routes inbound messages of `message_type` to `handler`.
    ///
    /// Only one handler per type is kept; registering again replaces it.
    pub fn on_message<F>(&self, message_type: MessageType, handler: F) -> Subscription
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.registry.register(message_type, handler)
    }

    /// Observes every change of the `connected` flag.
    pub fn on_connection_changed<F>(&self, observer: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.connection_changed.subscribe(move |connected| observer(*connected))
    }

    /// Observes every change of the `online` flag.
    pub fn on_online_changed<F>(&self, observer: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.online_changed.subscribe(move |online| observer(*online))
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// A receiver that can await status transitions.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Stops the client.
    ///
    /// Timers stop, queued sends and pending requests are rejected with
    /// [`MessagingError::Disposed`], and the socket is released before this
    /// returns.  Calling it again is a no-op.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let (done, finished) = oneshot::channel();
        if self.commands.send(Command::Dispose { done }).is_ok() {
            let _ = finished.await;
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn command(&self, command: Command) -> Result<(), MessagingError> {
        if self.is_disposed() {
            return Err(MessagingError::Disposed);
        }
        self.commands
            .send(command)
            .map_err(|_| MessagingError::Disposed)
    }
}

// ── Actor ─────────────────────────────────────────────────────────────────────

/// The live connection, present between connect and loss.
#[derive(Debug, Clone, Copy)]
struct Session {
    process_id: u32,
    port: u16,
    online: bool,
}

enum TcpOutcome {
    /// An outbound large frame finished; its caller was already answered.
    /// `socket_failed` is set when the coordination datagram could not be
    /// sent on the primary socket of connection `generation`.
    Sent { generation: u64, socket_failed: bool },
    /// An inbound large frame was fetched for connection `generation`.
    Fetched {
        generation: u64,
        result: Result<Message, MessagingError>,
    },
}

struct ClientActor {
    settings: ClientSettings,
    factory: Arc<dyn TransportFactory>,
    commands: mpsc::UnboundedReceiver<Command>,
    liveness: mpsc::UnboundedReceiver<ProcessState>,
    liveness_open: bool,
    transport: Option<Arc<dyn Transport>>,
    events: Option<mpsc::Receiver<TransportEvent>>,
    session: Option<Session>,
    /// Bumped on every connect so late TCP results from an old peer are dropped.
    generation: u64,
    heartbeat: HeartbeatScheduler,
    rate_limiter: RateLimiter,
    queue: MessageQueue,
    pending: PendingRequests,
    request_ids: SequenceCounter,
    tcp_tasks: JoinSet<TcpOutcome>,
    registry: HandlerRegistry,
    connection_changed: Subject<bool>,
    online_changed: Subject<bool>,
    status: watch::Sender<ConnectionStatus>,
}

impl ClientActor {
    async fn run(mut self) {
        if let Ok(initial) = self.liveness.try_recv() {
            self.on_liveness(initial).await;
        }

        loop {
            let heartbeat_due = self.heartbeat.next_deadline();
            let request_due = self.pending.next_deadline();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send { message, reply }) => {
                        self.handle_send(message, Some(reply), None).await;
                    }
                    Some(Command::RequestState { timeout, sent, reply }) => {
                        self.request_state(timeout, sent, reply).await;
                    }
                    Some(Command::Dispose { done }) => {
                        self.teardown();
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        debug!("all client handles dropped; shutting down");
                        self.teardown();
                        break;
                    }
                },

                state = self.liveness.recv(), if self.liveness_open => match state {
                    Some(state) => self.on_liveness(state).await,
                    None => {
                        debug!("liveness source dropped; no further reconnects");
                        self.liveness_open = false;
                    }
                },

                event = next_event(&mut self.events) => self.on_transport_event(event).await,

                Some(joined) = self.tcp_tasks.join_next(), if !self.tcp_tasks.is_empty() => {
                    self.on_tcp_outcome(joined).await;
                }

                _ = sleep_until_opt(heartbeat_due.map(|(at, _)| at)) => {
                    if let Some((_, event)) = heartbeat_due {
                        self.on_heartbeat(event).await;
                    }
                }

                _ = sleep_until_opt(request_due) => {
                    let expired = self.pending.expire(Instant::now());
                    debug!(expired, "state requests timed out");
                    self.drop_orphaned_state_queries();
                }
            }
        }
    }

    // ── Liveness and connection ───────────────────────────────────────────────

    async fn on_liveness(&mut self, state: ProcessState) {
        match state.live_process_id() {
            Some(process_id) => {
                if let Some(session) = self.session {
                    if session.process_id == process_id {
                        return;
                    }
                    self.on_connection_lost("editor process changed");
                }
                self.connect(process_id, state.flags).await;
            }
            None => {
                if self.session.is_some() {
                    self.on_connection_lost("editor process exited");
                }
            }
        }
    }

    async fn connect(&mut self, process_id: u32, flags: ProcessFlags) {
        let Some(port) = peer_port(self.settings.messaging_base_port, process_id) else {
            warn!(
                process_id,
                base = self.settings.messaging_base_port,
                "derived messaging port is out of range; not connecting"
            );
            return;
        };
        let peer = SocketAddr::new(self.settings.peer_host, port);

        let opened = match self.factory.open(peer).await {
            Ok(opened) => opened,
            Err(error) => {
                warn!(%peer, %error, "failed to open messaging transport");
                return;
            }
        };

        self.generation += 1;
        self.transport = Some(opened.transport);
        self.events = Some(opened.events);
        self.session = Some(Session {
            process_id,
            port,
            online: false,
        });
        info!(process_id, %peer, "connected to editor");
        self.publish_status();
        self.connection_changed.emit(&true);

        self.heartbeat.start(Instant::now(), flags.custom_peer);
        self.send_heartbeat().await;
    }

    /// Ends the current session.  A no-op when already disconnected.
    fn on_connection_lost(&mut self, reason: &str) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
        self.events = None;
        self.heartbeat.stop();

        info!(process_id = session.process_id, reason, "disconnected from editor");
        self.publish_status();
        self.connection_changed.emit(&false);
        if session.online {
            self.online_changed.emit(&false);
        }
    }

    async fn go_online(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.online {
            return;
        }
        session.online = true;
        let process_id = session.process_id;

        info!(process_id, "editor is online");
        self.publish_status();
        self.online_changed.emit(&true);
        self.flush_queue().await;
    }

    fn go_offline(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.online {
            return;
        }
        session.online = false;
        let process_id = session.process_id;

        info!(process_id, "editor reported offline");
        self.publish_status();
        self.online_changed.emit(&false);
    }

    fn is_online(&self) -> bool {
        self.session.is_some_and(|session| session.online)
    }

    fn publish_status(&self) {
        let status = match self.session {
            Some(session) => ConnectionStatus {
                connected: true,
                online: session.online,
                process_id: Some(session.process_id),
                port: Some(session.port),
            },
            None => ConnectionStatus::default(),
        };
        self.status.send_replace(status);
    }

    // ── Outbound ──────────────────────────────────────────────────────────────

    async fn handle_send(
        &mut self,
        message: Message,
        reply: Option<SendReply>,
        request_id: Option<u64>,
    ) {
        let message_type = message.message_type;
        if let Err(retry_after) = self.rate_limiter.try_acquire(message_type, Instant::now()) {
            debug!(%message_type, ?retry_after, "send discarded by rate limit");
            complete(
                reply,
                Err(MessagingError::RateLimited {
                    message_type,
                    retry_after,
                }),
            );
            return;
        }

        if message_type.is_heartbeat() || self.is_online() {
            self.transmit(message, reply).await;
        } else {
            debug!(%message_type, queued = self.queue.len() + 1, "editor not online; queueing");
            self.queue.push(QueuedMessage {
                message,
                reply,
                request_id,
            });
        }
    }

    async fn request_state(&mut self, timeout: Duration, sent: SendReply, reply: StateReply) {
        let request_id = self.request_ids.next();
        self.pending
            .insert(request_id, Instant::now() + timeout, reply);
        let probe = Message::new(MessageType::IsPlaying, request_id.to_string());
        self.handle_send(probe, Some(sent), Some(request_id)).await;
    }

    /// Removes queued state queries whose request already settled.
    fn drop_orphaned_state_queries(&mut self) {
        let pending = &self.pending;
        let abandoned = self
            .queue
            .take_where(|item| item.request_id.is_some_and(|id| !pending.contains(id)));
        if !abandoned.is_empty() {
            debug!(count = abandoned.len(), "dropping queued state queries nobody awaits");
        }
        for item in abandoned {
            complete(item.reply, Err(MessagingError::NotConnected));
        }
    }

    async fn flush_queue(&mut self) {
        self.drop_orphaned_state_queries();
        let queued = self.queue.take_all();
        if queued.is_empty() {
            return;
        }
        debug!(count = queued.len(), "flushing queued messages");
        for item in queued {
            self.transmit(item.message, item.reply).await;
        }
    }

    /// Sends immediately, over UDP or the TCP fallback depending on size.
    ///
    /// A failed datagram ends the session; a failed TCP exchange only fails
    /// its own caller.
    async fn transmit(&mut self, message: Message, reply: Option<SendReply>) {
        let Some(transport) = self.transport.clone() else {
            complete(reply, Err(MessagingError::NotConnected));
            return;
        };
        let frame = match encode_message(&message) {
            Ok(frame) => frame,
            Err(error) => {
                complete(reply, Err(error.into()));
                return;
            }
        };

        if needs_tcp_fallback(frame.len(), self.settings.udp_ceiling) {
            debug!(message_type = %message.message_type, bytes = frame.len(), "sending over TCP fallback");
            let generation = self.generation;
            self.tcp_tasks.spawn(async move {
                let outcome = transport.send_large(frame).await;
                let socket_failed = matches!(&outcome, Err(error) if error.is_primary_send_failure());
                if let Err(error) = &outcome {
                    warn!(%error, "large message was not delivered");
                }
                complete(reply, outcome.map_err(MessagingError::from));
                TcpOutcome::Sent {
                    generation,
                    socket_failed,
                }
            });
            return;
        }

        match transport.send_datagram(&frame).await {
            Ok(()) => {
                debug!(message_type = %message.message_type, bytes = frame.len(), "sent");
                complete(reply, Ok(()));
            }
            Err(error) => {
                warn!(message_type = %message.message_type, %error, "datagram send failed");
                self.on_connection_lost("send failed");
                complete(reply, Err(error.into()));
            }
        }
    }

    async fn send_heartbeat(&mut self) {
        self.transmit(Message::new(MessageType::Ping, ""), None)
            .await;
    }

    async fn on_heartbeat(&mut self, event: HeartbeatEvent) {
        if self.heartbeat.fire(event, Instant::now()) {
            self.send_heartbeat().await;
        } else if event == HeartbeatEvent::Relax {
            debug!(interval = ?self.heartbeat.interval(), "heartbeat relaxed");
        }
    }

    // ── Inbound ───────────────────────────────────────────────────────────────

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Datagram { bytes, origin } => match decode_message(&bytes) {
                Ok((message, consumed)) => {
                    if consumed < bytes.len() {
                        debug!(%origin, trailing = bytes.len() - consumed, "ignoring bytes after frame");
                    }
                    self.on_inbound(message.with_origin(origin)).await;
                }
                Err(error) => warn!(%origin, %error, "dropping malformed datagram"),
            },
            TransportEvent::Closed { reason } => {
                self.on_connection_lost(reason.as_deref().unwrap_or("transport closed"));
            }
        }
    }

    async fn on_inbound(&mut self, message: Message) {
        if self.session.is_none() {
            return;
        }
        let message_type = message.message_type;
        debug!(%message_type, bytes = message.value.len(), "received");

        if self.heartbeat.on_response(Instant::now()) {
            debug!("first reply on this connection; heartbeat will relax");
        }
        if message_type.is_online_indicator() {
            self.go_online().await;
        }

        match message_type {
            MessageType::Offline => self.go_offline(),
            MessageType::Ping => {
                // The editor probes us too.
                let pong = Message::new(MessageType::Pong, message.value.clone());
                self.transmit(pong, None).await;
            }
            MessageType::Tcp => {
                self.start_fetch(&message);
                return;
            }
            MessageType::IsPlaying => {
                if let Some((request_id, state)) = parse_state_reply(&message.value) {
                    if !self.pending.resolve(request_id, state) {
                        debug!(request_id, "state reply for unknown or expired request");
                    }
                }
            }
            MessageType::Info => info!(target: "unity", "{}", message.value),
            MessageType::Warning => warn!(target: "unity", "{}", message.value),
            MessageType::Error => error!(target: "unity", "{}", message.value),
            _ => {}
        }

        self.dispatch(&message);
    }

    fn start_fetch(&mut self, message: &Message) {
        let coordination = match TcpCoordination::parse(&message.value) {
            Ok(coordination) => coordination,
            Err(error) => {
                warn!(%error, "dropping malformed TCP coordination message");
                return;
            }
        };
        let (Some(transport), Some(origin)) = (self.transport.clone(), message.origin) else {
            return;
        };
        if coordination.length < self.settings.udp_ceiling {
            debug!(length = coordination.length, "peer used TCP for a frame that fits a datagram");
        }

        let generation = self.generation;
        self.tcp_tasks.spawn(async move {
            let result = async {
                let frame = transport.fetch_large(origin, coordination).await?;
                let (message, _) = decode_message(&frame)?;
                Ok::<_, MessagingError>(message.with_origin(origin))
            }
            .await;
            TcpOutcome::Fetched { generation, result }
        });
    }

    async fn on_tcp_outcome(&mut self, joined: Result<TcpOutcome, JoinError>) {
        match joined {
            Ok(TcpOutcome::Sent {
                generation,
                socket_failed,
            }) => {
                if socket_failed && generation == self.generation {
                    self.on_connection_lost("coordination send failed");
                }
            }
            Ok(TcpOutcome::Fetched { generation, result }) => {
                if generation != self.generation || self.session.is_none() {
                    debug!("discarding large message from a previous connection");
                    return;
                }
                match result {
                    Ok(message) => self.on_inbound(message).await,
                    Err(error) => warn!(%error, "large message fetch failed"),
                }
            }
            Err(error) if error.is_cancelled() => {}
            Err(error) => error!(%error, "TCP fallback task panicked"),
        }
    }

    fn dispatch(&self, message: &Message) {
        let message_type = message.message_type;
        if message_type.is_unknown() {
            debug!(code = message_type.code(), "no handler for unknown message type");
            return;
        }
        match self.registry.get(message_type) {
            Some(handler) => handler(message),
            None => debug!(%message_type, "no handler registered"),
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────────────

    fn teardown(&mut self) {
        self.heartbeat.stop();
        self.tcp_tasks.abort_all();

        for item in self.queue.take_all() {
            complete(item.reply, Err(MessagingError::Disposed));
        }
        self.pending.reject_all(|| MessagingError::Disposed);

        if let Some(transport) = self.transport.take() {
            transport.close();
        }
        self.events = None;

        if let Some(session) = self.session.take() {
            self.publish_status();
            self.connection_changed.emit(&false);
            if session.online {
                self.online_changed.emit(&false);
            }
        }
        info!("messaging client disposed");

        self.registry.clear();
        self.connection_changed.clear();
        self.online_changed.clear();
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<TransportEvent>>) -> TransportEvent {
    match events {
        Some(events) => events
            .recv()
            .await
            .unwrap_or(TransportEvent::Closed { reason: None }),
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
