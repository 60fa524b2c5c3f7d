//! Lifecycle state and counters shared between the controller task and
//! the `ConnectionManager` handle.
//!
//! Only the controller task writes; handles read lock-free.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

/// Connection lifecycle
///
/// ```text
/// Idle -> Connecting -> Open -> Closing -> Closed -> (retry) -> Connecting
/// ```
///
/// A transport handle exists exactly while the state is `Connecting`, `Open`
/// or `Closing`. `Closed` is not terminal: it always permits a new connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Open = 2,
    Closing = 3,
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Closing,
            4 => Self::Closed,
            _ => Self::Idle,
        }
    }

    /// States in which a transport handle exists
    #[inline]
    pub fn has_transport(self) -> bool {
        matches!(self, Self::Connecting | Self::Open | Self::Closing)
    }

    #[inline]
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Lock-free cell holding a [`ConnectionState`]
#[derive(Debug)]
pub struct AtomicConnectionState(AtomicU8);

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.get().is_open()
    }
}

/// Client metrics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub pongs_received: u64,
    /// Retries fired since the last successful open
    pub reconnect_attempts: u32,
    pub connection_state: ConnectionState,
}

/// Atomic counters behind [`Metrics`]
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    pongs_received: AtomicU64,
    reconnect_attempts: AtomicU32,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pongs(&self) {
        self.pongs_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_reconnect_attempts(&self, attempts: u32) {
        self.reconnect_attempts.store(attempts, Ordering::Release);
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn pongs_received(&self) -> u64 {
        self.pongs_received.load(Ordering::Relaxed)
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Acquire)
    }

    pub fn snapshot(&self, connection_state: ConnectionState) -> Metrics {
        Metrics {
            messages_sent: self.messages_sent(),
            messages_received: self.messages_received(),
            pongs_received: self.pongs_received(),
            reconnect_attempts: self.reconnect_attempts(),
            connection_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_atomic() {
        let cell = AtomicConnectionState::new(ConnectionState::Idle);
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closing,
            ConnectionState::Closed,
            ConnectionState::Idle,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn test_transport_exists_only_in_active_states() {
        assert!(!ConnectionState::Idle.has_transport());
        assert!(ConnectionState::Connecting.has_transport());
        assert!(ConnectionState::Open.has_transport());
        assert!(ConnectionState::Closing.has_transport());
        assert!(!ConnectionState::Closed.has_transport());
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = AtomicMetrics::new();
        metrics.increment_sent();
        metrics.increment_received();
        metrics.increment_received();
        metrics.increment_pongs();
        metrics.set_reconnect_attempts(3);

        let snapshot = metrics.snapshot(ConnectionState::Closed);
        assert_eq!(snapshot.messages_sent, 1);
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.pongs_received, 1);
        assert_eq!(snapshot.reconnect_attempts, 3);
        assert_eq!(snapshot.connection_state, ConnectionState::Closed);
    }
}
