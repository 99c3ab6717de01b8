//! One-shot turn timer for Broadside game sessions.
//!
//! A [`TurnTimer`] holds at most one pending deadline together with the
//! action to run when it passes. Arming again replaces the previous
//! deadline, so a session can never have two timers racing each other.
//!
//! # Integration
//!
//! The timer sits inside a session actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands, maybe re-arm */ }
//!         action = timer.fired() => { /* run the forced move */ }
//!     }
//! }
//! ```
//!
//! While disarmed, [`TurnTimer::fired`] pends forever and `select!` simply
//! keeps serving the other branches.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::trace;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Lifetime counters for a [`TurnTimer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    /// Calls to [`TurnTimer::arm`].
    pub armed: u64,
    /// Arms that replaced a still-pending deadline.
    pub replaced: u64,
    /// Pending deadlines removed by [`TurnTimer::cancel`].
    pub cancelled: u64,
    /// Deadlines that actually passed and yielded their action.
    pub fired: u64,
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Pending<A> {
    deadline: Instant,
    action: A,
}

/// A cancel-on-replace one-shot timer carrying an action of type `A`.
///
/// One `TurnTimer` per session actor.
#[derive(Debug)]
pub struct TurnTimer<A> {
    pending: Option<Pending<A>>,
    stats: TimerStats,
}

impl<A> Default for TurnTimer<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> TurnTimer<A> {
    /// Creates a disarmed timer.
    pub fn new() -> Self {
        Self {
            pending: None,
            stats: TimerStats::default(),
        }
    }

    /// Arms the timer to yield `action` after `delay`.
    ///
    /// Any deadline already pending is discarded and its action returned.
    pub fn arm(&mut self, delay: Duration, action: A) -> Option<A> {
        let replaced = self.pending.replace(Pending {
            deadline: Instant::now() + delay,
            action,
        });
        self.stats.armed += 1;
        if replaced.is_some() {
            self.stats.replaced += 1;
        }
        trace!(
            delay_ms = delay.as_millis() as u64,
            replaced = replaced.is_some(),
            "timer armed"
        );
        replaced.map(|p| p.action)
    }

    /// Disarms the timer, returning the action that was pending.
    pub fn cancel(&mut self) -> Option<A> {
        let pending = self.pending.take()?;
        self.stats.cancelled += 1;
        trace!("timer cancelled");
        Some(pending.action)
    }

    /// Waits for the pending deadline and yields its action.
    ///
    /// The timer is disarmed once this resolves. While disarmed the future
    /// never completes. Dropping the future before the deadline leaves the
    /// timer armed, so it is safe to use as a `select!` branch.
    pub async fn fired(&mut self) -> A {
        let Some(deadline) = self.pending.as_ref().map(|p| p.deadline) else {
            return std::future::pending::<A>().await;
        };

        time::sleep_until(deadline).await;

        match self.pending.take() {
            Some(pending) => {
                self.stats.fired += 1;
                let late = Instant::now().saturating_duration_since(deadline);
                trace!(late_us = late.as_micros() as u64, "timer fired");
                pending.action
            }
            None => std::future::pending::<A>().await,
        }
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// The pending action, if any.
    pub fn pending_action(&self) -> Option<&A> {
        self.pending.as_ref().map(|p| &p.action)
    }

    /// Time left until the pending deadline. `None` when disarmed.
    pub fn remaining(&self) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|p| p.deadline.saturating_duration_since(Instant::now()))
    }

    /// Snapshot of the lifetime counters.
    pub fn stats(&self) -> TimerStats {
        self.stats
    }
}
