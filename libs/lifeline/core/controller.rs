//! Connection controller
//!
//! One Tokio task owns the transport handle, the reconnect scheduler, the
//! heartbeat monitor and every flag of the state machine. Everything that can
//! change that state arrives as an [`Input`] on a single queue and is handled
//! to completion before the next one is looked at:
//!
//! ```text
//!  ConnectionManager ──Command──┐
//!  TransportEvents ──Transport──┤
//!  retry timer ─────RetryDue────┼──> queue ──> Controller::run
//!  heartbeat ticker ─Tick───────┘
//! ```
//!
//! Transport events and ticks carry the session of the transport instance
//! they belong to; retry firings carry a ticket. Anything tagged with a
//! superseded session or a cancelled ticket is dropped on arrival.

use crate::core::config::ConnectionConfig;
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::core::events::{ConnectionEvent, EventDispatcher};
use crate::core::heartbeat::{HeartbeatMonitor, TickOutcome};
use crate::core::scheduler::ReconnectScheduler;
use crate::traits::{LifelineError, Transport, TransportEvent, TransportEvents, TransportHandle};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Close code used for every close the manager initiates itself
pub(crate) const NORMAL_CLOSURE: u16 = 1000;

/// Lifecycle chatter: `info` with verbose logging, `debug` otherwise
macro_rules! lifecycle {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// Everything the controller task reacts to
#[derive(Debug)]
pub(crate) enum Input {
    /// Request from the public handle
    Command(Command),
    /// Event reported by the transport instance opened for `session`
    Transport { session: u64, event: TransportEvent },
    /// A reconnect timer elapsed
    RetryDue { ticket: u64 },
    /// The heartbeat ticker of `session` ticked
    HeartbeatTick { session: u64 },
}

/// Requests issued through `ConnectionManager`
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Send(String),
    Close(u16),
    SetAddress(Option<String>),
    Shutdown,
}

/// State the controller publishes for the handle to read
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) state: AtomicConnectionState,
    pub(crate) metrics: AtomicMetrics,
    pub(crate) address: RwLock<Option<String>>,
    pub(crate) last_request: RwLock<Option<String>>,
    pub(crate) last_response: RwLock<Option<String>>,
    pub(crate) last_error: RwLock<Option<LifelineError>>,
}

impl Shared {
    pub(crate) fn new(address: Option<String>) -> Self {
        Self {
            state: AtomicConnectionState::new(ConnectionState::Idle),
            metrics: AtomicMetrics::new(),
            address: RwLock::new(address),
            last_request: RwLock::new(None),
            last_response: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }
}

pub(crate) struct Controller {
    config: ConnectionConfig,
    transport: Box<dyn Transport>,
    handle: Option<Box<dyn TransportHandle>>,
    /// Address the current handle was opened with
    connected_address: Option<String>,
    session: u64,
    force_close: bool,
    scheduler: ReconnectScheduler,
    heartbeat: HeartbeatMonitor,
    dispatcher: EventDispatcher,
    shared: Arc<Shared>,
    input_tx: UnboundedSender<Input>,
}

impl Controller {
    pub(crate) fn new(
        config: ConnectionConfig,
        transport: Box<dyn Transport>,
        scheduler: ReconnectScheduler,
        heartbeat: HeartbeatMonitor,
        dispatcher: EventDispatcher,
        shared: Arc<Shared>,
        input_tx: UnboundedSender<Input>,
    ) -> Self {
        Self {
            config,
            transport,
            handle: None,
            connected_address: None,
            session: 0,
            force_close: false,
            scheduler,
            heartbeat,
            dispatcher,
            shared,
            input_tx,
        }
    }

    fn verbose(&self) -> bool {
        self.config.verbose_logging
    }

    /// Main controller loop
    ///
    /// Runs until a `Shutdown` command arrives, then tears everything down.
    pub(crate) async fn run(mut self, mut input_rx: UnboundedReceiver<Input>) {
        lifecycle!(self.verbose(), "Connection controller started");

        while let Some(input) = input_rx.recv().await {
            match input {
                Input::Command(Command::Shutdown) => break,
                Input::Command(command) => self.handle_command(command),
                Input::Transport { session, event } => self.handle_transport(session, event),
                Input::RetryDue { ticket } => self.on_retry(ticket),
                Input::HeartbeatTick { session } => self.on_tick(session),
            }
        }

        // Nothing queued after this point is ever looked at
        input_rx.close();
        self.teardown();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect(),
            Command::Send(payload) => self.send(payload),
            Command::Close(code) => self.close(code),
            Command::SetAddress(address) => self.set_address(address),
            Command::Shutdown => {}
        }
    }

    fn handle_transport(&mut self, session: u64, event: TransportEvent) {
        if session != self.session || self.handle.is_none() {
            debug!(
                session,
                current = self.session,
                ?event,
                "Ignoring event from superseded transport"
            );
            return;
        }

        match event {
            TransportEvent::Opened => self.on_open(),
            TransportEvent::Closed { code } => self.on_close(code),
            TransportEvent::Errored(detail) => self.on_error(detail),
            TransportEvent::Message(text) => self.on_message(text),
        }
    }

    fn connect(&mut self) {
        debug_assert_eq!(
            self.handle.is_some(),
            self.shared.state.get().has_transport(),
            "transport handle out of step with connection state"
        );
        if self.handle.is_some() {
            warn!(
                state = %self.shared.state.get(),
                "connect() ignored: a connection is already active"
            );
            return;
        }

        if self.scheduler.cancel() {
            lifecycle!(self.verbose(), "Pending reconnect cancelled by connect()");
        }

        let configured = self
            .shared
            .address
            .read()
            .clone()
            .filter(|address| !address.trim().is_empty());
        let Some(address) = configured else {
            error!("connect() requested but no address is configured");
            *self.shared.last_error.write() = Some(LifelineError::MissingAddress);
            return;
        };

        lifecycle!(self.verbose(), address = %address, "Connecting");
        self.shared.state.set(ConnectionState::Connecting);
        self.force_close = false;
        self.session += 1;

        let events = TransportEvents::new(self.session, self.input_tx.clone());
        match self.transport.open(&address, &self.config.protocols, events) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.connected_address = Some(address);
            }
            Err(e) => {
                error!(address = %address, "Failed to create transport: {}", e);
                self.shared.state.set(ConnectionState::Closed);
                self.report_error(e);
                self.schedule_retry();
            }
        }
    }

    fn send(&mut self, payload: String) {
        let state = self.shared.state.get();
        let ready = state.is_open() && self.handle.as_ref().is_some_and(|handle| handle.is_open());
        let Some(handle) = self.handle.as_mut().filter(|_| ready) else {
            warn!(%state, "send() ignored: connection is not open");
            return;
        };

        match handle.send(&payload) {
            Ok(()) => {
                self.shared.metrics.increment_sent();
                *self.shared.last_request.write() = Some(payload);
            }
            Err(e) => error!("Failed to send message: {}", e),
        }
    }

    fn close(&mut self, code: u16) {
        if self.scheduler.cancel() {
            lifecycle!(self.verbose(), "Pending reconnect cancelled by close()");
        }

        let state = self.shared.state.get();
        if !state.is_open() {
            warn!(%state, "close() ignored: connection is not open");
            return;
        }

        lifecycle!(self.verbose(), code, "Closing connection");
        self.force_close = true;
        self.begin_closing(code);
    }

    fn begin_closing(&mut self, code: u16) {
        self.shared.state.set(ConnectionState::Closing);
        if let Some(handle) = self.handle.as_mut() {
            handle.close(code);
        }
    }

    fn set_address(&mut self, address: Option<String>) {
        lifecycle!(self.verbose(), address = ?address, "Address updated");
        *self.shared.address.write() = address;

        if self.handle.is_some() {
            self.close(NORMAL_CLOSURE);
        }
    }

    fn on_open(&mut self) {
        let address = self.connected_address.clone().unwrap_or_default();
        info!(address = %address, "Connection open");

        self.shared.state.set(ConnectionState::Open);
        self.scheduler.reset();
        self.shared.metrics.set_reconnect_attempts(0);

        if self.config.heartbeat_enabled {
            lifecycle!(
                self.verbose(),
                interval = ?self.heartbeat.interval(),
                timeout = ?self.heartbeat.timeout(),
                "Starting heartbeat"
            );
            self.heartbeat.start(self.session, self.input_tx.clone());
        }

        self.dispatcher.fire(ConnectionEvent::Open { address });
    }

    fn on_close(&mut self, code: u16) {
        let previous = self.shared.state.get();

        self.shared.state.set(ConnectionState::Closed);
        self.heartbeat.stop();
        self.handle = None;
        self.connected_address = None;
        *self.shared.last_response.write() = None;

        if !self.force_close && previous != ConnectionState::Closing {
            *self.shared.last_error.write() = Some(LifelineError::UnexpectedClose { code });
        }

        self.dispatcher.fire(ConnectionEvent::Close);

        if self.force_close {
            info!(code, "Connection closed");
        } else {
            warn!(code, "Connection closed unexpectedly");
            self.schedule_retry();
        }
    }

    fn on_error(&mut self, detail: String) {
        error!("Transport error: {}", detail);
        self.report_error(LifelineError::Transport(detail));
    }

    fn on_message(&mut self, text: String) {
        if self.heartbeat.classify(&text, Instant::now()) {
            self.shared.metrics.increment_pongs();
            lifecycle!(self.verbose(), "Pong received");
            return;
        }

        self.shared.metrics.increment_received();
        *self.shared.last_response.write() = Some(text.clone());
        self.dispatcher.fire(ConnectionEvent::Message { data: text });
    }

    fn on_tick(&mut self, session: u64) {
        if !self.heartbeat.owns_tick(session) || !self.shared.state.get().is_open() {
            debug!(session, "Ignoring heartbeat tick");
            return;
        }

        let epoch_ms = chrono::Utc::now().timestamp_millis();
        match self.heartbeat.evaluate(Instant::now(), epoch_ms) {
            TickOutcome::Probe(payload) => {
                if let Some(handle) = self.handle.as_mut() {
                    match handle.send(&payload) {
                        Ok(()) => lifecycle!(self.verbose(), "Heartbeat probe sent"),
                        Err(e) => warn!("Failed to send heartbeat probe: {}", e),
                    }
                }
            }
            TickOutcome::Expired { elapsed } => {
                let threshold = self.heartbeat.timeout();
                warn!(
                    ?elapsed,
                    ?threshold,
                    last_pong = ?self.heartbeat.last_pong(),
                    "No pong within the heartbeat timeout, closing connection"
                );
                self.heartbeat.stop();
                self.report_error(LifelineError::HeartbeatTimeout { elapsed, threshold });
                // Not forced: the resulting close schedules a retry
                self.begin_closing(NORMAL_CLOSURE);
            }
        }
    }

    fn on_retry(&mut self, ticket: u64) {
        if !self.scheduler.fire(ticket) {
            debug!(ticket, "Ignoring cancelled reconnect");
            return;
        }

        let attempt = self.scheduler.attempts();
        self.shared.metrics.set_reconnect_attempts(attempt);
        info!(attempt, "Reconnecting");
        self.connect();
    }

    fn schedule_retry(&mut self) {
        let delay = self.scheduler.schedule(self.input_tx.clone());
        let attempt = self.scheduler.attempts().saturating_add(1);
        lifecycle!(self.verbose(), attempt, ?delay, "Reconnect scheduled");
    }

    fn report_error(&mut self, error: LifelineError) {
        *self.shared.last_error.write() = Some(error.clone());
        self.dispatcher.fire(ConnectionEvent::Error { error });
    }

    fn teardown(&mut self) {
        self.scheduler.cancel();
        self.heartbeat.stop();
        // Detach the sink of the current transport
        self.session += 1;

        if let Some(mut handle) = self.handle.take() {
            handle.close(NORMAL_CLOSURE);
        }
        self.connected_address = None;
        self.shared.state.set(ConnectionState::Closed);

        info!("Connection controller stopped");
    }
}
