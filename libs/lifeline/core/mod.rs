//! # Lifeline core
//!
//! The connection manager and the pieces it is made of.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lifeline::{ConnectionConfig, ConnectionEvent, ConnectionManager, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> lifeline::Result<()> {
//!     let manager = ConnectionManager::builder()
//!         .transport(WebSocketTransport::default())
//!         .config(ConnectionConfig::default())
//!         .address("wss://api.example.com/stream")
//!         .heartbeat(Duration::from_millis(2500), Duration::from_secs(10))
//!         .build()?;
//!
//!     manager.connect();
//!
//!     while let Ok(event) = manager.events().recv() {
//!         if let ConnectionEvent::Message { data } = event {
//!             println!("{data}");
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub(crate) mod controller;
pub mod events;
pub mod heartbeat;
pub mod scheduler;

// Re-export main types
pub use builder::{states, ConnectionManagerBuilder};
pub use client::ConnectionManager;
pub use config::{ConfigError, ConnectionConfig};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
pub use events::ConnectionEvent;
pub use heartbeat::HeartbeatMonitor;
pub use scheduler::ReconnectScheduler;

// Re-export traits for convenience
pub use crate::traits::*;

/// Create a new connection manager builder
///
/// This is a convenience function for starting the builder pattern.
///
/// # Example
/// ```ignore
/// let manager = lifeline::core::builder()
///     .transport(WebSocketTransport::default())
///     .address("wss://api.example.com")
///     .build()?;
/// ```
pub fn builder() -> ConnectionManagerBuilder<builder::states::NoTransport> {
    ConnectionManagerBuilder::new()
}
