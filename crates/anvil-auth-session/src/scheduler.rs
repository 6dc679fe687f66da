//! Cooperative tick scheduler.
//!
//! Used where the host does not bring its own scheduler (the replay binary
//! and tests). Tasks are plain [`ScheduledTask`] values; nothing here runs
//! them, the owner of the scheduler pulls due tasks every tick.

use std::collections::BTreeMap;

use anvil_auth_core::{ScheduledTask, Scheduler, Ticks};
use tracing::trace;

/// Tick-driven task queue.
///
/// A task scheduled with delay `d` during tick `t` is returned by the first
/// [`advance`](TickScheduler::advance) that reaches tick `t + d`, or by the
/// next one when `d` is zero. Tasks due on the same tick come out in the
/// order they were scheduled.
#[derive(Debug, Default)]
pub struct TickScheduler {
    now: Ticks,
    next_id: u64,
    queue: BTreeMap<(Ticks, u64), ScheduledTask>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current tick.
    pub fn now(&self) -> Ticks {
        self.now
    }

    /// Number of tasks not yet returned.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Pending tasks in firing order.
    pub fn tasks(&self) -> impl Iterator<Item = &ScheduledTask> {
        self.queue.values()
    }

    /// Move to the next tick and take every task that is due.
    pub fn advance(&mut self) -> Vec<ScheduledTask> {
        self.now += 1;
        let later = self.queue.split_off(&(self.now + 1, 0));
        let due = std::mem::replace(&mut self.queue, later);
        if !due.is_empty() {
            trace!(tick = self.now, count = due.len(), "Running due tasks");
        }
        due.into_values().collect()
    }
}

impl Scheduler for TickScheduler {
    fn after(&mut self, delay: Ticks, task: ScheduledTask) {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.insert((self.now + delay, id), task);
    }
}
