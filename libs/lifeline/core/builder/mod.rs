pub mod states;

use crate::core::client::ConnectionManager;
use crate::core::config::ConnectionConfig;
use crate::core::controller::{Command, Controller, Input, Shared};
use crate::core::events::{ConnectionEvent, EventDispatcher};
use crate::core::heartbeat::HeartbeatMonitor;
use crate::core::scheduler::ReconnectScheduler;
use crate::traits::*;
use crossbeam_channel::Sender;
use states::*;
use std::sync::Arc;
use std::time::Duration;

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Type-state builder for ConnectionManager
///
/// This builder uses Rust's type system to enforce that a transport is set
/// before the manager can be built. Everything else falls back to
/// [`ConnectionConfig::default`].
pub struct ConnectionManagerBuilder<T>
where
    T: TransportState,
{
    _state: TypeState<T>,
    transport: Option<Box<dyn Transport>>,
    config: ConnectionConfig,
    pong_detector: Option<Arc<dyn PongDetector>>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    upstream: Option<Sender<ConnectionEvent>>,
}

impl ConnectionManagerBuilder<NoTransport> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            transport: None,
            config: ConnectionConfig::default(),
            pong_detector: None,
            reconnect_strategy: None,
            upstream: None,
        }
    }

    pub fn transport(self, transport: impl Transport) -> ConnectionManagerBuilder<HasTransport> {
        ConnectionManagerBuilder {
            _state: TypeState::new(),
            transport: Some(Box::new(transport)),
            config: self.config,
            pong_detector: self.pong_detector,
            reconnect_strategy: self.reconnect_strategy,
            upstream: self.upstream,
        }
    }
}

impl Default for ConnectionManagerBuilder<NoTransport> {
    fn default() -> Self {
        Self::new()
    }
}

// Optional configuration methods
impl<T> ConnectionManagerBuilder<T>
where
    T: TransportState,
{
    /// Replace the whole configuration
    ///
    /// Settings applied earlier through the individual setters are discarded.
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = Some(address.into());
        self
    }

    /// Sub-protocols offered during the handshake, in order of preference
    pub fn protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Enable the heartbeat
    ///
    /// A probe is sent every `interval` while the connection is open; if no
    /// reply has been seen for longer than `timeout` the connection is closed
    /// and retried.
    pub fn heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.config.heartbeat_enabled = true;
        self.config.heartbeat_interval_ms = duration_ms(interval);
        self.config.heartbeat_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set a custom detector for heartbeat replies
    ///
    /// Defaults to [`JsonPongDetector`], which matches any JSON object with a
    /// `pong` field.
    pub fn pong_detector(mut self, detector: Arc<dyn PongDetector>) -> Self {
        self.pong_detector = Some(detector);
        self
    }

    /// Override the backoff described by the configuration
    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Channel that receives every notification when bubbling is enabled
    ///
    /// # Example
    /// ```ignore
    /// let (upstream_tx, upstream_rx) = crossbeam_channel::unbounded();
    ///
    /// let manager = lifeline::builder()
    ///     .transport(WebSocketTransport::default())
    ///     .address("wss://api.example.com/stream")
    ///     .upstream(upstream_tx)
    ///     .bubbles(true)
    ///     .build()?;
    /// ```
    pub fn upstream(mut self, sender: Sender<ConnectionEvent>) -> Self {
        self.upstream = Some(sender);
        self
    }

    pub fn bubbles(mut self, enabled: bool) -> Self {
        self.config.bubbles = enabled;
        self
    }

    pub fn verbose(mut self, enabled: bool) -> Self {
        self.config.verbose_logging = enabled;
        self
    }

    /// Connect as soon as the manager is built
    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.config.auto_connect = enabled;
        self
    }
}

// Build method - only available once a transport is set
impl ConnectionManagerBuilder<HasTransport> {
    /// Validate the configuration and start the controller task
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<ConnectionManager> {
        self.config
            .validate()
            .map_err(|e| LifelineError::Configuration(e.to_string()))?;

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            LifelineError::Configuration(format!("build() requires a Tokio runtime: {e}"))
        })?;

        let transport = self
            .transport
            .ok_or_else(|| LifelineError::Configuration("transport must be set".to_string()))?;

        let strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| Box::new(self.config.backoff()));
        let detector = self
            .pong_detector
            .unwrap_or_else(|| Arc::new(JsonPongDetector::default()));

        let (input_tx, input_rx) = tokio::sync::mpsc::unbounded_channel::<Input>();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();

        let shared = Arc::new(Shared::new(self.config.address.clone()));
        let dispatcher = EventDispatcher::new(
            event_tx,
            self.upstream,
            self.config.bubbles,
            self.config.verbose_logging,
        );
        let heartbeat = HeartbeatMonitor::new(
            self.config.heartbeat_interval(),
            self.config.heartbeat_timeout(),
            detector,
        );
        let auto_connect = self.config.auto_connect;

        let controller = Controller::new(
            self.config,
            transport,
            ReconnectScheduler::new(strategy),
            heartbeat,
            dispatcher,
            Arc::clone(&shared),
            input_tx.clone(),
        );

        if auto_connect {
            // Queued before the task starts, so it is the first input handled
            let _ = input_tx.send(Input::Command(Command::Connect));
        }

        let task_handle = runtime.spawn(controller.run(input_rx));

        Ok(ConnectionManager::new(input_tx, event_rx, shared, task_handle))
    }
}
