//! Lifeline - Main Library
//!
//! Thin application layer on top of the `lifeline` connection manager.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, logging, runners)
//! - **lifeline**: Resilient WebSocket connection manager (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use lifeline_app::bin_common::{init_tracing, load_config_from_env, ConfigType};
//! use lifeline_app::lifeline::{ConnectionConfig, ConnectionManager, WebSocketTransport};
//! ```

// Re-export workspace libraries for convenience
pub use lifeline;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;
    pub mod runner;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use logging::init_tracing;
    pub use runner::{BinaryRunner, RunConfig};
}
