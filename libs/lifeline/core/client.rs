use crate::core::builder::{states::NoTransport, ConnectionManagerBuilder};
use crate::core::connection_state::{ConnectionState, Metrics};
use crate::core::controller::{Command, Input, Shared, NORMAL_CLOSURE};
use crate::core::events::ConnectionEvent;
use crate::traits::*;
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

/// Resilient client around one persistent connection
///
/// The manager is a handle onto the controller task:
/// - Commands (`connect`, `send`, `close`, `set_address`) are queued and
///   handled in order; none of them block or wait for the network
/// - State, metrics and the last request/response/error are published by the
///   controller and read here without touching the queue
/// - Notifications arrive on an unbounded crossbeam channel
///
/// Dropping the manager shuts the controller down; use [`shutdown`] to wait
/// for the teardown to finish.
///
/// [`shutdown`]: ConnectionManager::shutdown
pub struct ConnectionManager {
    /// Controller queue
    input_tx: UnboundedSender<Input>,
    /// Local notification receiver
    event_rx: Receiver<ConnectionEvent>,
    /// State published by the controller
    shared: Arc<Shared>,
    /// Controller task handle
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ConnectionManager {
    /// Start configuring a manager
    pub fn builder() -> ConnectionManagerBuilder<NoTransport> {
        ConnectionManagerBuilder::new()
    }

    pub(crate) fn new(
        input_tx: UnboundedSender<Input>,
        event_rx: Receiver<ConnectionEvent>,
        shared: Arc<Shared>,
        task_handle: tokio::task::JoinHandle<()>,
    ) -> Self {
        Self {
            input_tx,
            event_rx,
            shared,
            task_handle: Some(task_handle),
        }
    }

    fn command(&self, command: Command) -> Result<()> {
        self.input_tx
            .send(Input::Command(command))
            .map_err(|e| LifelineError::ChannelSend(e.to_string()))
    }

    /// Open a connection to the configured address
    ///
    /// Ignored while a connection is already active. Cancels a pending
    /// automatic reconnect.
    pub fn connect(&self) -> Result<()> {
        self.command(Command::Connect)
    }

    /// Send a text payload
    ///
    /// Dropped with a warning unless the connection is open.
    pub fn send(&self, payload: impl Into<String>) -> Result<()> {
        self.command(Command::Send(payload.into()))
    }

    /// Close with the normal closure code (1000)
    ///
    /// An explicit close never triggers a reconnect.
    pub fn close(&self) -> Result<()> {
        self.close_with_code(NORMAL_CLOSURE)
    }

    pub fn close_with_code(&self, code: u16) -> Result<()> {
        self.command(Command::Close(code))
    }

    /// Change the address used by the next connect
    ///
    /// An active connection is closed first and not reopened automatically.
    pub fn set_address(&self, address: impl Into<String>) -> Result<()> {
        self.command(Command::SetAddress(Some(address.into())))
    }

    pub fn clear_address(&self) -> Result<()> {
        self.command(Command::SetAddress(None))
    }

    /// Get current connection state
    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.shared.state.is_open()
    }

    pub fn address(&self) -> Option<String> {
        self.shared.address.read().clone()
    }

    /// Most recent payload accepted by `send`
    pub fn last_request(&self) -> Option<String> {
        self.shared.last_request.read().clone()
    }

    /// Most recent application payload received on the current connection
    pub fn last_response(&self) -> Option<String> {
        self.shared.last_response.read().clone()
    }

    pub fn last_error(&self) -> Option<LifelineError> {
        self.shared.last_error.read().clone()
    }

    /// Retries fired since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.metrics.reconnect_attempts()
    }

    /// Get current metrics
    pub fn metrics(&self) -> Metrics {
        self.shared.metrics.snapshot(self.shared.state.get())
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ConnectionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv_event(&self) -> std::result::Result<ConnectionEvent, RecvError> {
        self.event_rx.recv()
    }

    /// Receive an event, giving up after `timeout` (blocking)
    pub fn recv_event_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<ConnectionEvent, RecvTimeoutError> {
        self.event_rx.recv_timeout(timeout)
    }

    /// The notification receiver, for `select!` or handing to another thread
    pub fn events(&self) -> &Receiver<ConnectionEvent> {
        &self.event_rx
    }

    /// Shutdown the manager
    ///
    /// Cancels every timer, closes and releases the transport and waits for
    /// the controller task to finish. No notification is delivered afterwards.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down connection manager");

        let _ = self.command(Command::Shutdown);

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| LifelineError::ChannelSend(format!("controller task failed: {e}")))?;
        }

        Ok(())
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if self.task_handle.take().is_some() {
            let _ = self.command(Command::Shutdown);
        }
    }
}
