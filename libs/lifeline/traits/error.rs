use std::time::Duration;
use thiserror::Error;

/// Main error type for lifeline
///
/// Apart from `Configuration`, none of these escape the public API as a
/// returned error. They are recorded as the manager's last error and
/// delivered to observers through `ConnectionEvent::Error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifelineError {
    /// The transport could not even be created (bad address, bad header, ...)
    #[error("Transport creation failed: {0}")]
    TransportCreation(String),

    /// Asynchronous error reported by a live transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport closed without the application asking for it
    #[error("Connection closed unexpectedly (code {code})")]
    UnexpectedClose { code: u16 },

    /// No heartbeat reply arrived within the timeout threshold
    #[error("Heartbeat timeout: no pong for {elapsed:?} (threshold {threshold:?})")]
    HeartbeatTimeout { elapsed: Duration, threshold: Duration },

    /// Send or close attempted while the connection is not open
    #[error("Connection not open: {0}")]
    NotOpen(String),

    /// `connect` was requested without an address
    #[error("No address configured")]
    MissingAddress,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),
}

/// Result type for lifeline operations
pub type Result<T> = std::result::Result<T, LifelineError>;
