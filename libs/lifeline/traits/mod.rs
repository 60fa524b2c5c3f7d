//! # Lifeline Traits
//!
//! The seams between the connection state machine and its collaborators:
//!
//! - **Transport / TransportHandle**: open, send to and close the underlying socket
//! - **PongDetector**: decide whether an inbound payload is a heartbeat reply
//! - **ReconnectionStrategy**: compute the delay before the next connect attempt

pub mod error;
pub mod pong_detector;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use error::{LifelineError, Result};
pub use pong_detector::{JsonPongDetector, PongDetector};
pub use reconnect::{ExponentialBackoff, ReconnectionStrategy};
pub use transport::{Transport, TransportEvent, TransportEvents, TransportHandle};
