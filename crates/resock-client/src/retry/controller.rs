//! Retry controller
//!
//! Owns the single pending-retry slot. Scheduling replaces whatever was
//! pending, and every fire carries the token it was scheduled with so a fire
//! that lost a race with `cancel` is recognised and dropped.

use std::time::Duration;

use resock_core::RetryPolicy;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::machine::Input;

/// Identifies one scheduled retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Debug)]
struct PendingTimer {
    token: TimerToken,
    task: JoinHandle<()>,
}

/// Schedules reconnection attempts according to a [`RetryPolicy`]
#[derive(Debug)]
pub struct RetryController {
    policy: RetryPolicy,
    inputs: mpsc::UnboundedSender<Input>,
    pending: Option<PendingTimer>,
    next_token: u64,
}

impl RetryController {
    pub fn new(policy: RetryPolicy, inputs: mpsc::UnboundedSender<Input>) -> Self {
        Self {
            policy,
            inputs,
            pending: None,
            next_token: 0,
        }
    }

    /// Policy this controller applies
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Schedule retry number `attempt`
    ///
    /// Any pending retry is cancelled first. Returns the delay, or `None`
    /// when the policy's attempt limit is reached and nothing was scheduled.
    pub fn schedule(&mut self, attempt: u32) -> Option<(TimerToken, Duration)> {
        self.cancel();

        let delay = self.policy.delay_for(attempt)?;
        let token = TimerToken(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);

        let inputs = self.inputs.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inputs.send(Input::RetryElapsed(token));
        });

        self.pending = Some(PendingTimer { token, task });
        Some((token, delay))
    }

    /// Cancel the pending retry, if any
    ///
    /// Returns whether a retry was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(timer) => {
                timer.task.abort();
                tracing::trace!(token = timer.token.0, "Retry cancelled");
                true
            }
            None => false,
        }
    }

    /// Consume a timer fire
    ///
    /// Returns `true` only if `token` is the pending retry, which is then
    /// cleared. Fires for cancelled or replaced retries return `false`.
    pub fn fire(&mut self, token: TimerToken) -> bool {
        match &self.pending {
            Some(timer) if timer.token == token => {
                self.pending = None;
                true
            }
            _ => {
                tracing::trace!(token = token.0, "Stale retry timer ignored");
                false
            }
        }
    }

    /// Check whether a retry is pending
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for RetryController {
    fn drop(&mut self) {
        self.cancel();
    }
}
