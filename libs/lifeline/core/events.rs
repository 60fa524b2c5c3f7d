//! Observer notifications
//!
//! Every manager owns a local event channel. When `bubbles` is enabled and an
//! upstream sender was configured on the builder, each notification is also
//! forwarded there, so a parent component can watch several managers through
//! one receiver.

use crate::traits::LifelineError;
use crossbeam_channel::Sender;
use tracing::{debug, info};

/// Notification delivered to observers
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The transport reported open
    Open { address: String },
    /// An application payload arrived (heartbeat replies are never delivered)
    Message { data: String },
    /// Something failed; the manager keeps running
    Error { error: LifelineError },
    /// The transport reported closed
    Close,
}

impl ConnectionEvent {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Message { .. } => "message",
            Self::Error { .. } => "error",
            Self::Close => "close",
        }
    }
}

pub(crate) struct EventDispatcher {
    local: Sender<ConnectionEvent>,
    upstream: Option<Sender<ConnectionEvent>>,
    bubbles: bool,
    verbose: bool,
}

impl EventDispatcher {
    pub(crate) fn new(
        local: Sender<ConnectionEvent>,
        upstream: Option<Sender<ConnectionEvent>>,
        bubbles: bool,
        verbose: bool,
    ) -> Self {
        Self {
            local,
            upstream,
            bubbles,
            verbose,
        }
    }

    pub(crate) fn fire(&self, event: ConnectionEvent) {
        if self.verbose {
            info!(event = event.name(), bubbles = self.bubbles, "Event fired");
        } else {
            debug!(event = event.name(), bubbles = self.bubbles, "Event fired");
        }

        if self.bubbles {
            if let Some(upstream) = &self.upstream {
                // A parent that stopped listening is not our problem
                let _ = upstream.send(event.clone());
            }
        }

        // The handle owns the receiver; failure means the manager is being dropped
        let _ = self.local.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_local_only_by_default() {
        let (local_tx, local_rx) = unbounded();
        let (upstream_tx, upstream_rx) = unbounded();
        let dispatcher = EventDispatcher::new(local_tx, Some(upstream_tx), false, false);

        dispatcher.fire(ConnectionEvent::Close);

        assert_eq!(local_rx.try_recv().ok(), Some(ConnectionEvent::Close));
        assert!(upstream_rx.try_recv().is_err());
    }

    #[test]
    fn test_bubbles_to_upstream() {
        let (local_tx, local_rx) = unbounded();
        let (upstream_tx, upstream_rx) = unbounded();
        let dispatcher = EventDispatcher::new(local_tx, Some(upstream_tx), true, false);

        let event = ConnectionEvent::Message {
            data: "hello".to_string(),
        };
        dispatcher.fire(event.clone());

        assert_eq!(local_rx.try_recv().ok(), Some(event.clone()));
        assert_eq!(upstream_rx.try_recv().ok(), Some(event));
    }

    #[test]
    fn test_bubbles_without_upstream_is_harmless() {
        let (local_tx, local_rx) = unbounded();
        let dispatcher = EventDispatcher::new(local_tx, None, true, true);

        dispatcher.fire(ConnectionEvent::Close);
        assert_eq!(local_rx.try_recv().ok(), Some(ConnectionEvent::Close));
    }
}
