//! Operator-forced CO2 recalibration.
//!
//! ```text
//!            debounced press            warm-up elapsed,
//!   ┌──────┐ ───────────────▶ ┌───────────┐ FRC applied ┌──────────┐
//!   │ Idle │                  │ Requested │ ──────────▶ │ Applying │
//!   └──────┘ ◀─────────────── └───────────┘             └──────────┘
//!       ▲        (never: no timeout)                          │
//!       └─────────────── confirmation blinks done ────────────┘
//! ```
//!
//! Requested lights the indicator and waits, possibly forever, for the
//! warm-up threshold.  Applying plays the confirmation blinks one poll at
//! a time and then returns to Idle with the indicator dark.  Presses that
//! arrive outside Idle are ignored.

use log::{info, warn};

use crate::app::ports::SensorPort;
use crate::config::{NodeConfig, WarmupReference};
use crate::drivers::button::{ButtonDebouncer, ButtonEvent};
use crate::drivers::led_patterns::{BlinkSequence, IndicatorPattern};

/// Recalibration request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecalState {
    Idle = 0,
    Requested = 1,
    Applying = 2,
}

/// Result of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecalPoll {
    /// Indicator LED level to drive.
    pub indicator: bool,
    /// `Some((from, to))` if the state changed during this poll.
    pub transition: Option<(RecalState, RecalState)>,
}

pub struct RecalibrationMachine {
    state: RecalState,
    debouncer: ButtonDebouncer,
    pattern: IndicatorPattern,
    requested_at_ms: u64,
    warmup_ms: u64,
    warmup_reference: WarmupReference,
    reference_ppm: u16,
    confirm_blinks: u8,
    blink_half_period_ms: u32,
}

impl RecalibrationMachine {
    pub fn new(config: &NodeConfig, now_ms: u64) -> Self {
        Self {
            state: RecalState::Idle,
            debouncer: ButtonDebouncer::new(config.debounce_ms, now_ms),
            pattern: IndicatorPattern::Off,
            requested_at_ms: 0,
            warmup_ms: u64::from(config.warmup_ms),
            warmup_reference: config.warmup_reference,
            reference_ppm: config.recalibration_reference_ppm,
            confirm_blinks: config.confirm_blinks,
            blink_half_period_ms: config.blink_half_period_ms,
        }
    }

    pub fn state(&self) -> RecalState {
        self.state
    }

    /// Run one poll: debounce the raw button level, then advance.
    ///
    /// `now_ms` is monotonic time since boot.
    pub fn poll(
        &mut self,
        button_raw: bool,
        now_ms: u64,
        sensors: &mut impl SensorPort,
    ) -> RecalPoll {
        let from = self.state;

        if let Some(ButtonEvent::Pressed) = self.debouncer.tick(button_raw, now_ms) {
            if self.state == RecalState::Idle {
                info!("Recalibration: requested by button");
                self.state = RecalState::Requested;
                self.requested_at_ms = now_ms;
                self.pattern = IndicatorPattern::Solid;
            } else {
                info!("Recalibration: press ignored in {:?}", self.state);
            }
        }

        match self.state {
            RecalState::Idle => {}
            RecalState::Requested => {
                if self.warmed_up(now_ms) {
                    match sensors.force_recalibration(self.reference_ppm) {
                        Ok(()) => {
                            info!(
                                "Recalibration: forced to {} ppm, confirming",
                                self.reference_ppm
                            );
                            self.state = RecalState::Applying;
                            self.pattern = IndicatorPattern::Confirm(BlinkSequence::start(
                                self.confirm_blinks,
                                self.blink_half_period_ms,
                                now_ms,
                            ));
                        }
                        Err(e) => {
                            warn!("Recalibration: sensor rejected FRC ({}), retrying", e);
                        }
                    }
                }
            }
            RecalState::Applying => {
                if let IndicatorPattern::Confirm(seq) = &mut self.pattern {
                    if seq.tick(now_ms).is_none() {
                        info!("Recalibration: completed");
                        self.state = RecalState::Idle;
                        self.pattern = IndicatorPattern::Off;
                    }
                }
            }
        }

        let indicator = self.pattern.level(now_ms);
        let to = self.state;
        RecalPoll {
            indicator,
            transition: (from != to).then_some((from, to)),
        }
    }

    fn warmed_up(&self, now_ms: u64) -> bool {
        let elapsed = match self.warmup_reference {
            WarmupReference::SinceBoot => now_ms,
            WarmupReference::SinceRequest => now_ms.saturating_sub(self.requested_at_ms),
        };
        elapsed > self.warmup_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::tests::NullSensors;

    fn hold_button(m: &mut RecalibrationMachine, from: u64, to: u64, s: &mut NullSensors) {
        for t in (from..=to).step_by(50) {
            m.poll(true, t, s);
        }
    }

    #[test]
    fn idle_without_press() {
        let cfg = NodeConfig::default();
        let mut s = NullSensors::default();
        let mut m = RecalibrationMachine::new(&cfg, 0);
        let p = m.poll(false, 500_000, &mut s);
        assert_eq!(p.transition, None);
        assert!(!p.indicator);
        assert_eq!(m.state(), RecalState::Idle);
    }

    #[test]
    fn late_request_applies_on_the_same_poll_since_boot() {
        let cfg = NodeConfig::default();
        let mut s = NullSensors::default();
        let mut m = RecalibrationMachine::new(&cfg, 200_000);
        hold_button(&mut m, 200_000, 203_000, &mut s);
        let p = m.poll(true, 203_050, &mut s);
        assert_eq!(
            p.transition,
            Some((RecalState::Idle, RecalState::Applying))
        );
        assert_eq!(s.frc, vec![407]);
    }

    #[test]
    fn since_request_waits_full_warmup() {
        let cfg = NodeConfig {
            warmup_reference: WarmupReference::SinceRequest,
            ..Default::default()
        };
        let mut s = NullSensors::default();
        let mut m = RecalibrationMachine::new(&cfg, 200_000);
        hold_button(&mut m, 200_000, 203_050, &mut s);
        assert_eq!(m.state(), RecalState::Requested);
        let requested_at = 203_050;
        assert!(m.poll(false, requested_at + 180_000, &mut s).indicator);
        assert_eq!(m.state(), RecalState::Requested);
        m.poll(false, requested_at + 180_001, &mut s);
        assert_eq!(m.state(), RecalState::Applying);
    }

    #[test]
    fn frc_failure_stays_requested() {
        let cfg = NodeConfig::default();
        let mut s = NullSensors {
            fail_frc: true,
            ..Default::default()
        };
        let mut m = RecalibrationMachine::new(&cfg, 0);
        hold_button(&mut m, 0, 3_050, &mut s);
        m.poll(false, 190_000, &mut s);
        assert_eq!(m.state(), RecalState::Requested);
        s.fail_frc = false;
        m.poll(false, 190_050, &mut s);
        assert_eq!(m.state(), RecalState::Applying);
    }

    #[test]
    fn press_while_applying_is_ignored() {
        let cfg = NodeConfig::default();
        let mut s = NullSensors::default();
        let mut m = RecalibrationMachine::new(&cfg, 0);
        hold_button(&mut m, 0, 3_050, &mut s);
        m.poll(false, 3_100, &mut s);
        m.poll(false, 181_000, &mut s);
        assert_eq!(m.state(), RecalState::Applying);
        hold_button(&mut m, 181_050, 184_100, &mut s);
        assert_eq!(m.state(), RecalState::Applying);
        assert_eq!(s.frc.len(), 1);
    }
}
