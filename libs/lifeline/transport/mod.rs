//! # Transports
//!
//! Production implementations of the [`Transport`](crate::traits::Transport)
//! collaborator.

pub mod websocket;

pub use websocket::WebSocketTransport;
