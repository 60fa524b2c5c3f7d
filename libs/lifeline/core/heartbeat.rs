//! Heartbeat monitor
//!
//! # Architecture
//!
//! The ticker is a dedicated Tokio task that only produces ticks. The
//! decision of what a tick means is made inside the controller task, so it
//! is serialized with every other event:
//!
//! ```text
//! ┌─────────────────────┐
//! │  Ticker Task        │
//! │  (Tokio spawn)      │
//! │                     │
//! │  Every interval:    │
//! │  post HeartbeatTick ┼──> Controller queue ──> HeartbeatMonitor::evaluate
//! └─────────────────────┘                              │
//!                                   ┌──────────────────┴─────────────────┐
//!                            silent > timeout                       otherwise
//!                                   │                                     │
//!                     HeartbeatTimeout + close()             send {"ping": <ms>}
//! ```
//!
//! Replies (`{"pong": <ms>}`) are recognised by a [`PongDetector`] before
//! the payload reaches the application, refresh the liveness timestamp and
//! are then dropped.
//!
//! Until the first reply arrives, silence is measured from the moment the
//! monitor started, so a server that never answers is detected as well.

use crate::core::controller::Input;
use crate::traits::PongDetector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Build the probe payload for the given wall-clock timestamp
pub fn probe_payload(epoch_ms: i64) -> String {
    serde_json::json!({ "ping": epoch_ms }).to_string()
}

/// What the controller should do with a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Connection looks alive; send this probe
    Probe(String),
    /// Nothing heard for longer than the threshold
    Expired { elapsed: Duration },
}

/// Liveness state for one open connection
pub struct HeartbeatMonitor {
    interval: Duration,
    timeout: Duration,
    detector: Arc<dyn PongDetector>,
    started_at: Option<Instant>,
    last_pong: Option<Instant>,
    session: Option<u64>,
    ticker: Option<JoinHandle<()>>,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration, timeout: Duration, detector: Arc<dyn PongDetector>) -> Self {
        Self {
            interval,
            timeout,
            detector,
            started_at: None,
            last_pong: None,
            session: None,
            ticker: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the monitor is watching a connection
    pub(crate) fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    /// Time of the most recent reply, if any since start
    pub(crate) fn last_pong(&self) -> Option<Instant> {
        self.last_pong
    }

    /// Start watching the connection identified by `session`
    ///
    /// Any previous ticker is cancelled first.
    pub(crate) fn start(&mut self, session: u64, input_tx: UnboundedSender<Input>) {
        self.stop();
        self.arm(session, Instant::now());

        let interval = self.interval;
        self.ticker = Some(tokio::spawn(async move {
            ticker_task(interval, session, input_tx).await;
        }));
    }

    pub(crate) fn arm(&mut self, session: u64, now: Instant) {
        self.session = Some(session);
        self.started_at = Some(now);
        self.last_pong = None;
    }

    /// Cancel the ticker and forget all liveness state
    pub(crate) fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.session = None;
        self.started_at = None;
        self.last_pong = None;
    }

    /// Whether a tick posted for `session` still belongs to this monitor
    pub(crate) fn owns_tick(&self, session: u64) -> bool {
        self.session == Some(session)
    }

    /// Offer an inbound payload; returns `true` if it was a heartbeat reply
    /// and must not be forwarded.
    pub(crate) fn classify(&mut self, payload: &str, now: Instant) -> bool {
        if !self.detector.is_pong(payload) {
            return false;
        }
        if self.is_active() {
            self.last_pong = Some(now);
        }
        true
    }

    /// Decide what a tick at `now` means
    pub(crate) fn evaluate(&self, now: Instant, epoch_ms: i64) -> TickOutcome {
        let reference = self.last_pong.or(self.started_at).unwrap_or(now);
        let elapsed = now.saturating_duration_since(reference);

        if elapsed > self.timeout {
            TickOutcome::Expired { elapsed }
        } else {
            TickOutcome::Probe(probe_payload(epoch_ms))
        }
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ticker task that posts a tick into the controller queue every interval
///
/// The task will:
/// 1. Skip the immediate first tick so the first probe goes out one interval after open
/// 2. On each tick, post `HeartbeatTick` for its session
/// 3. Exit when the controller queue is gone (or when aborted by `stop`)
async fn ticker_task(interval: Duration, session: u64, input_tx: UnboundedSender<Input>) {
    let mut ticker = tokio::time::interval(interval);
    // Skip the first immediate tick - wait for the first interval
    ticker.tick().await;
    // If we miss ticks due to slow processing, skip them rather than bursting
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!(session, "Heartbeat ticker started with interval: {:?}", interval);

    loop {
        ticker.tick().await;

        if input_tx.send(Input::HeartbeatTick { session }).is_err() {
            debug!(session, "Controller queue closed, shutting down heartbeat ticker");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::JsonPongDetector;

    fn monitor() -> HeartbeatMonitor {
        HeartbeatMonitor::new(
            Duration::from_millis(2500),
            Duration::from_secs(10),
            Arc::new(JsonPongDetector::default()),
        )
    }

    #[test]
    fn test_probe_payload_shape() {
        let payload = probe_payload(1508493238375);
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();
        let fields = parsed.as_object().unwrap();

        assert_eq!(fields.len(), 1);
        assert_eq!(fields["ping"].as_i64(), Some(1508493238375));
    }

    #[test]
    fn test_probe_until_threshold_then_expire() {
        let mut monitor = monitor();
        let start = Instant::now();
        monitor.arm(1, start);

        assert!(matches!(
            monitor.evaluate(start + Duration::from_millis(2500), 0),
            TickOutcome::Probe(_)
        ));
        // Exactly at the threshold is still alive
        assert!(matches!(
            monitor.evaluate(start + Duration::from_secs(10), 0),
            TickOutcome::Probe(_)
        ));
        assert_eq!(
            monitor.evaluate(start + Duration::from_millis(12_500), 0),
            TickOutcome::Expired {
                elapsed: Duration::from_millis(12_500)
            }
        );
    }

    #[test]
    fn test_reply_refreshes_liveness() {
        let mut monitor = monitor();
        let start = Instant::now();
        monitor.arm(1, start);

        assert!(monitor.classify(r#"{"pong": 1}"#, start + Duration::from_secs(9)));
        assert_eq!(monitor.last_pong(), Some(start + Duration::from_secs(9)));

        assert!(matches!(
            monitor.evaluate(start + Duration::from_millis(12_500), 0),
            TickOutcome::Probe(_)
        ));
        assert!(matches!(
            monitor.evaluate(start + Duration::from_millis(19_500), 0),
            TickOutcome::Expired { .. }
        ));
    }

    #[test]
    fn test_probe_carries_given_timestamp() {
        let mut monitor = monitor();
        let start = Instant::now();
        monitor.arm(1, start);

        assert_eq!(
            monitor.evaluate(start, 42),
            TickOutcome::Probe(r#"{"ping":42}"#.to_string())
        );
    }

    #[test]
    fn test_ordinary_payloads_are_not_replies() {
        let mut monitor = monitor();
        let start = Instant::now();
        monitor.arm(1, start);

        assert!(!monitor.classify(r#"{"foo": 1}"#, start));
        assert!(!monitor.classify("plain text", start));
        assert!(!monitor.classify(r#"{"pong""#, start));
        assert_eq!(monitor.last_pong(), None);
    }

    #[test]
    fn test_reply_consumed_even_when_inactive() {
        let mut monitor = monitor();
        let now = Instant::now();

        assert!(monitor.classify(r#"{"pong": 1}"#, now));
        assert!(!monitor.is_active());
        assert_eq!(monitor.last_pong(), None);
    }

    #[test]
    fn test_stop_clears_state_and_session() {
        let mut monitor = monitor();
        let start = Instant::now();
        monitor.arm(7, start);
        monitor.classify(r#"{"pong": 1}"#, start);

        assert!(monitor.owns_tick(7));
        monitor.stop();

        assert!(!monitor.is_active());
        assert!(!monitor.owns_tick(7));
        assert_eq!(monitor.last_pong(), None);
    }
}
