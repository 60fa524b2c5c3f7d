//! # Lifeline
//!
//! A resilient client around one persistent WebSocket connection.
//!
//! ## Features
//!
//! - **Single event loop**: every command, transport event and timer firing is
//!   handled in order by one controller task, so the state machine needs no locks
//! - **Exponential backoff**: unexpected closes schedule exactly one retry,
//!   `min(base * growth^attempt, max)` later
//! - **Heartbeat**: optional `{"ping": ms}` probes, `{"pong": ms}` replies are
//!   swallowed, silent connections are closed and retried
//! - **Pluggable transport**: the state machine talks to a [`Transport`] trait,
//!   [`WebSocketTransport`] is the `tokio-tungstenite` implementation

pub mod traits;
pub mod core;
pub mod transport;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use self::core::{
    builder, client, config, connection_state, events, heartbeat, scheduler,
    builder::{states, ConnectionManagerBuilder},
    client::ConnectionManager,
    config::{ConfigError, ConnectionConfig},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics},
    events::ConnectionEvent,
};

// Re-export the production transport
pub use transport::WebSocketTransport;

/// Type alias for Result with LifelineError
pub type Result<T> = std::result::Result<T, traits::LifelineError>;
