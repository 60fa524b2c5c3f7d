//! Transport collaborator
//!
//! The connection state machine never touches a socket directly. It asks a
//! [`Transport`] to open a connection and receives back a [`TransportHandle`]
//! for sending and closing. Everything the connection reports afterwards
//! (open, message, error, close) is pushed through the [`TransportEvents`]
//! sink that was handed to `open`.
//!
//! # Ordering contract
//!
//! Events are delivered one at a time, in the order they are emitted. An
//! implementation that reports an error followed by a close must emit
//! `Errored` before `Closed`; the manager handles them in exactly that order
//! and assumes nothing else about atomicity.

use crate::core::controller::Input;
use super::error::Result;
use tokio::sync::mpsc::UnboundedSender;

/// Something that happened on the underlying connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established and ready to send
    Opened,
    /// The connection is gone; no further events follow
    Closed { code: u16 },
    /// Asynchronous failure; a `Closed` may or may not follow
    Errored(String),
    /// A text frame arrived
    Message(String),
}

/// Event sink for one transport instance
///
/// Every instance opened by the manager gets its own sink tagged with a
/// session number. Once the manager moves on to another instance, or shuts
/// down, events emitted through an old sink are dropped.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    session: u64,
    tx: UnboundedSender<Input>,
}

impl TransportEvents {
    pub(crate) fn new(session: u64, tx: UnboundedSender<Input>) -> Self {
        Self { session, tx }
    }

    /// Session this sink belongs to
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Deliver an event to the manager
    ///
    /// Returns `false` once the manager has shut down.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(Input::Transport {
                session: self.session,
                event,
            })
            .is_ok()
    }
}

/// Opens connections
pub trait Transport: Send + Sync + 'static {
    /// Start opening a connection to `address`
    ///
    /// Must not block. An `Err` means the connection could not even be
    /// attempted; the outcome of an attempt that did start is reported later
    /// through `events` (`Opened`, or `Errored` followed by `Closed`).
    fn open(
        &self,
        address: &str,
        protocols: &[String],
        events: TransportEvents,
    ) -> Result<Box<dyn TransportHandle>>;
}

/// A live (or in-progress) connection
///
/// Dropping the handle must release the connection without emitting any
/// further events.
pub trait TransportHandle: Send {
    /// Queue a text frame
    fn send(&mut self, text: &str) -> Result<()>;

    /// Start the closing handshake; `Closed` is reported through the sink
    fn close(&mut self, code: u16);

    /// Readiness query: `true` between `Opened` and the start of closing
    fn is_open(&self) -> bool;
}
