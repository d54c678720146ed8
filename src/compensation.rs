//! Absolute-humidity compensation for the tVOC sensor.
//!
//! The SGP30 drifts with ambient moisture.  Each cycle, before the tVOC
//! read, the compensator converts the *previous* cycle's last valid
//! temperature / relative-humidity pair into absolute humidity (mg/m³)
//! and the sensor hub feeds that into the SGP30.
//!
//! Magnus approximation (g/m³):
//!
//! ```text
//!   AH = 216.7 · (RH/100 · 6.112 · exp(17.62·T / (243.12 + T))) / (273.15 + T)
//! ```

use log::warn;

use crate::sampling::{Channel, Sample};

/// Compensation value meaning "no compensation" to the SGP30.
pub const COMPENSATION_UNAVAILABLE: u32 = 0;

/// Absolute humidity in mg/m³, truncated.
pub fn absolute_humidity(temp_c: f32, humidity_pct: f32) -> u32 {
    let vapour_hpa = (humidity_pct / 100.0) * 6.112 * ((17.62 * temp_c) / (243.12 + temp_c)).exp();
    let grams_per_m3 = 216.7 * (vapour_hpa / (273.15 + temp_c));
    (1000.0 * grams_per_m3) as u32
}

/// Holds the most recent in-range temperature and humidity across cycles.
#[derive(Debug, Default)]
pub struct HumidityCompensator {
    last_temperature: Option<i32>,
    last_humidity: Option<i32>,
}

impl HumidityCompensator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compensation input for this cycle, from previously observed readings.
    ///
    /// Must be called before this cycle's readings are passed to
    /// [`observe`](Self::observe).
    pub fn compensation(&self) -> Option<u32> {
        match (self.last_temperature, self.last_humidity) {
            (Some(t), Some(h)) => Some(absolute_humidity(t as f32, h as f32)),
            _ => None,
        }
    }

    /// Like [`compensation`](Self::compensation), but logs and substitutes
    /// [`COMPENSATION_UNAVAILABLE`] when no valid pair has been seen.
    pub fn compensation_or_unavailable(&self) -> u32 {
        self.compensation().unwrap_or_else(|| {
            warn!("Compensation: no valid temperature/humidity yet, tVOC uncompensated");
            COMPENSATION_UNAVAILABLE
        })
    }

    /// Retain this cycle's temperature and humidity if they are valid.
    /// A missing reading leaves the previous value in place.
    pub fn observe(&mut self, sample: &Sample) {
        if let Some(t) = sample.temperature.filter(|&t| Channel::Temperature.accepts(t)) {
            self.last_temperature = Some(t);
        }
        if let Some(h) = sample.humidity.filter(|&h| Channel::Humidity.accepts(h)) {
            self.last_humidity = Some(h);
        }
    }

    pub fn last_temperature(&self) -> Option<i32> {
        self.last_temperature
    }

    pub fn last_humidity(&self) -> Option<i32> {
        self.last_humidity
    }
}
