//! Operator panel adapter: recalibration button and indicator LED.
//!
//! Implements [`PanelPort`] over any `embedded_hal::digital` pin pair, so
//! the same code drives `esp_idf_hal::gpio::PinDriver`s on the device and
//! fake pins in tests.
//!
//! A pin error is logged and read as LOW (button) or ignored (LED); a
//! flaky GPIO must not stall the poll loop.

use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

use crate::app::ports::PanelPort;

pub struct GpioPanel<B, L> {
    button: B,
    led: L,
}

impl<B: InputPin, L: OutputPin> GpioPanel<B, L> {
    pub fn new(button: B, led: L) -> Self {
        Self { button, led }
    }
}

impl<B: InputPin, L: OutputPin> PanelPort for GpioPanel<B, L> {
    fn button_raw(&mut self) -> bool {
        self.button.is_high().unwrap_or_else(|e| {
            warn!("Panel: button read failed ({:?})", e);
            false
        })
    }

    fn set_indicator(&mut self, on: bool) {
        let result = if on {
            self.led.set_high()
        } else {
            self.led.set_low()
        };
        if let Err(e) = result {
            warn!("Panel: indicator write failed ({:?})", e);
        }
    }
}
