//! Cadence scheduler.
//!
//! Two fixed-period deadlines driven by the main loop's monotonic clock:
//! the sampling cycle and the reporting interval.  The loop ticks every
//! `poll_interval_ms` and asks which of the two are due.
//!
//! ```text
//!   poll tick ──▶ CadenceScheduler::tick(now) ──▶ Due { interval, sample }
//!                                                       │
//!                   interval first, then sample ◀───────┘
//! ```
//!
//! A deadline that has slipped by more than one period (a long reconnect,
//! a slow bus) is re-anchored to `now + period`; missed cycles are not
//! replayed in a burst.

use log::debug;

/// What is due on this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Due {
    /// The reporting interval has closed.
    pub interval: bool,
    /// A sampling cycle should run.
    pub sample: bool,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    period_ms: u64,
    next_ms: u64,
}

impl Deadline {
    fn new(period_ms: u32, start_ms: u64) -> Self {
        let period_ms = u64::from(period_ms).max(1);
        Self {
            period_ms,
            next_ms: start_ms + period_ms,
        }
    }

    fn poll(&mut self, now_ms: u64, label: &str) -> bool {
        if now_ms < self.next_ms {
            return false;
        }
        self.next_ms += self.period_ms;
        if self.next_ms <= now_ms {
            debug!(
                "Scheduler: {} behind by {} ms, re-anchoring",
                label,
                now_ms - self.next_ms + self.period_ms
            );
            self.next_ms = now_ms + self.period_ms;
        }
        true
    }
}

pub struct CadenceScheduler {
    sample: Deadline,
    interval: Deadline,
}

impl CadenceScheduler {
    /// First sample is due one sample period after `start_ms`, first
    /// interval boundary one interval after it.
    pub fn new(sample_period_ms: u32, interval_ms: u32, start_ms: u64) -> Self {
        Self {
            sample: Deadline::new(sample_period_ms, start_ms),
            interval: Deadline::new(interval_ms, start_ms),
        }
    }

    /// Tick the scheduler.  Call once per poll.
    pub fn tick(&mut self, now_ms: u64) -> Due {
        Due {
            interval: self.interval.poll(now_ms, "interval"),
            sample: self.sample.poll(now_ms, "sample"),
        }
    }

    pub fn next_sample_ms(&self) -> u64 {
        self.sample.next_ms
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
