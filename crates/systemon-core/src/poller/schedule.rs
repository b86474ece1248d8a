// ── Poll pacing ──
//
// Deadlines and the consumer-activity clock. Pure bookkeeping: every
// method takes `now` so the pacing rules are testable without a runtime.

use std::time::{Duration, Instant};

/// Largest worker count considered for the fetch pool.
pub const MAX_WORKERS: usize = 9;

/// Mutable pacing state for one aggregator instance.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    next_discovery: Option<Instant>,
    next_iteration: Instant,
    last_activity: Instant,
    paused: bool,
}

impl PollSchedule {
    /// Everything due immediately; activity counted from `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            next_discovery: None,
            next_iteration: now,
            last_activity: now,
            paused: false,
        }
    }

    /// Record consumer activity.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
        self.paused = false;
    }

    /// Re-evaluate the pause flag: paused once the consumer has been
    /// silent for longer than `inactivity`.
    pub fn check_paused(&mut self, now: Instant, inactivity: Duration) -> bool {
        self.paused = now > self.last_activity + inactivity;
        self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn iteration_due(&self, now: Instant) -> bool {
        now >= self.next_iteration
    }

    /// Make the next per-device iteration due right away.
    pub fn force_iteration(&mut self, now: Instant) {
        self.next_iteration = now;
    }

    pub fn iteration_finished(&mut self, now: Instant, cycle_delay: Duration) {
        self.next_iteration = now + cycle_delay;
    }

    /// Listing runs when the cache is empty or the cooldown has elapsed.
    pub fn discovery_due(&self, now: Instant, cache_populated: bool) -> bool {
        match self.next_discovery {
            Some(deadline) if cache_populated => now >= deadline,
            _ => true,
        }
    }

    /// Drop the discovery cooldown so the next cycle lists again.
    pub fn expire_discovery(&mut self) {
        self.next_discovery = None;
    }

    pub fn discovery_succeeded(&mut self, now: Instant, cooldown: Duration) {
        self.next_discovery = Some(now + cooldown);
    }
}

/// Fetch-pool width for `tracked` ids in hardware-id mode: the largest
/// divisor of `tracked` that does not exceed [`MAX_WORKERS`], so the ids
/// split into equal batches. Zero ids still get one worker.
pub fn worker_pool_size(tracked: usize) -> usize {
    (1..=MAX_WORKERS.min(tracked))
        .rev()
        .find(|d| tracked % d == 0)
        .unwrap_or(1)
}
