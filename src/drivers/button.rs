//! Polled button debouncer.
//!
//! ## Hardware
//!
//! Active-HIGH momentary switch with an external pull-down.  There is no
//! hardware debounce: the main loop samples the raw level once per poll
//! and hands it to [`ButtonDebouncer::tick`].
//!
//! ## Acceptance rule
//!
//! A raw level becomes the stable level only after it has remained
//! unchanged for longer than the debounce window, measured from the last
//! poll at which the raw level changed.  Only a LOW→HIGH change of the
//! stable level is reported.  Nothing here waits: every call returns
//! immediately.

/// Debounced button events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    /// The stable level went LOW → HIGH.
    Pressed,
}

pub struct ButtonDebouncer {
    window_ms: u64,
    /// Raw level at the previous poll.
    last_raw: bool,
    /// Time of the most recent raw level change.
    last_change_ms: u64,
    /// Accepted level.
    stable: bool,
}

impl ButtonDebouncer {
    /// Starts released (LOW) with the debounce clock at `now_ms`.
    pub fn new(window_ms: u32, now_ms: u64) -> Self {
        Self {
            window_ms: u64::from(window_ms),
            last_raw: false,
            last_change_ms: now_ms,
            stable: false,
        }
    }

    /// Feed one raw pin read.  `now_ms` is monotonic time since boot.
    pub fn tick(&mut self, raw_high: bool, now_ms: u64) -> Option<ButtonEvent> {
        if raw_high != self.last_raw {
            self.last_change_ms = now_ms;
        }
        self.last_raw = raw_high;

        if now_ms.saturating_sub(self.last_change_ms) <= self.window_ms {
            return None;
        }
        if raw_high == self.stable {
            return None;
        }
        self.stable = raw_high;
        if self.stable {
            Some(ButtonEvent::Pressed)
        } else {
            None
        }
    }

    /// Currently accepted level.
    pub fn is_pressed(&self) -> bool {
        self.stable
    }
}
