//! Indicator LED patterns for the single recalibration LED.
//!
//! The main loop asks the active pattern for the LED level on every poll
//! tick.  Timed patterns keep their own phase deadline instead of
//! sleeping, so the loop never stalls while the LED blinks.
//!
//! | Pattern   | Description                                | Ends        |
//! |-----------|--------------------------------------------|-------------|
//! | Off       | LED dark                                   | —           |
//! | Solid     | LED lit (recalibration armed)              | —           |
//! | Confirm   | N on/off blinks after a recalibration      | after N     |

/// Fixed-count on/off blink sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkSequence {
    half_period_ms: u64,
    /// Remaining half-periods, including the current one.
    phases_left: u16,
    phase_deadline_ms: u64,
}

impl BlinkSequence {
    /// Start `blinks` on/off cycles at `now_ms`, LED on first.
    pub fn start(blinks: u8, half_period_ms: u32, now_ms: u64) -> Self {
        let half_period_ms = u64::from(half_period_ms);
        Self {
            half_period_ms,
            phases_left: u16::from(blinks) * 2,
            phase_deadline_ms: now_ms + half_period_ms,
        }
    }

    /// Advance to `now_ms` and return the LED level, or `None` once the
    /// last off phase has elapsed.
    pub fn tick(&mut self, now_ms: u64) -> Option<bool> {
        while self.phases_left > 0 && now_ms >= self.phase_deadline_ms {
            self.phases_left -= 1;
            self.phase_deadline_ms += self.half_period_ms;
        }
        if self.phases_left == 0 {
            return None;
        }
        // Even count remaining = start of an on/off pair = on.
        Some(self.phases_left % 2 == 0)
    }

    pub fn is_finished(&self) -> bool {
        self.phases_left == 0
    }
}

/// What the indicator LED should be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorPattern {
    Off,
    Solid,
    Confirm(BlinkSequence),
}

impl IndicatorPattern {
    /// LED level at `now_ms`.  A finished confirmation reads as off.
    pub fn level(&mut self, now_ms: u64) -> bool {
        match self {
            Self::Off => false,
            Self::Solid => true,
            Self::Confirm(seq) => seq.tick(now_ms).unwrap_or(false),
        }
    }
}
