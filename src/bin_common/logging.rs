//! Logging initialization

use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is not set
pub const DEFAULT_DIRECTIVES: &str = "info";

/// Initialize tracing with standard configuration
///
/// Honours `RUST_LOG` (e.g. `RUST_LOG=lifeline=debug`).
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .init();
}
