//! Reconnect scheduler
//!
//! After an unexpected close the controller asks the scheduler for exactly one
//! future connect attempt. The scheduler owns at most one pending timer; each
//! timer carries a ticket so a firing that raced with a cancellation is
//! recognised and ignored.
//!
//! The attempt counter is bumped when a retry fires, right before the
//! controller calls `connect`, never when it is scheduled. A successful open
//! resets it to zero.

use crate::core::controller::Input;
use crate::traits::ReconnectionStrategy;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

struct PendingRetry {
    ticket: u64,
    delay: Duration,
    timer: JoinHandle<()>,
}

pub struct ReconnectScheduler {
    strategy: Box<dyn ReconnectionStrategy>,
    attempts: u32,
    next_ticket: u64,
    pending: Option<PendingRetry>,
}

impl ReconnectScheduler {
    pub fn new(strategy: Box<dyn ReconnectionStrategy>) -> Self {
        Self {
            strategy,
            attempts: 0,
            next_ticket: 0,
            pending: None,
        }
    }

    /// Retries fired since the last successful open
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay the next scheduled retry would use
    pub fn next_delay(&self) -> Duration {
        self.strategy.next_delay(self.attempts)
    }

    /// Delay of the retry currently waiting to fire
    #[cfg(test)]
    pub(crate) fn pending_delay(&self) -> Option<Duration> {
        self.pending.as_ref().map(|pending| pending.delay)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Arm a retry timer, replacing any pending one
    ///
    /// Returns the delay that was scheduled.
    pub(crate) fn schedule(&mut self, input_tx: UnboundedSender<Input>) -> Duration {
        self.cancel();

        let delay = self.next_delay();
        self.next_ticket += 1;
        let ticket = self.next_ticket;

        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = input_tx.send(Input::RetryDue { ticket });
        });

        self.pending = Some(PendingRetry {
            ticket,
            delay,
            timer,
        });
        delay
    }

    /// Accept a firing for `ticket`
    ///
    /// Returns `true` (and counts the attempt) only if the ticket is the one
    /// currently pending.
    pub(crate) fn fire(&mut self, ticket: u64) -> bool {
        if self.pending.as_ref().map(|pending| pending.ticket) != Some(ticket) {
            return false;
        }
        self.pending = None;
        self.attempts = self.attempts.saturating_add(1);
        true
    }

    /// Drop the pending retry, if any; returns whether one was pending
    pub(crate) fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Forget all consecutive failures
    pub(crate) fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Drop for ReconnectScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
