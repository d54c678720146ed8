//! Sensirion SGP30 metal-oxide tVOC / eCO2 sensor.
//!
//! ## Hardware
//!
//! I2C address 0x58.  After `init_air_quality` the part expects
//! `measure_iaq` roughly once per second; its on-chip algorithm tracks a
//! baseline that drifts towards clean air over hours.  That baseline is
//! what the node persists so a reboot does not restart the learning.
//!
//! Humidity compensation takes absolute humidity as 8.8 fixed-point g/m³;
//! writing 0 switches compensation off.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::info;

use super::crc::{checked_word, word_with_crc};
use crate::baseline::Baseline;
use crate::error::SensorError;

pub const ADDRESS: u8 = 0x58;

const CMD_INIT_AIR_QUALITY: u16 = 0x2003;
const CMD_MEASURE_IAQ: u16 = 0x2008;
const CMD_GET_BASELINE: u16 = 0x2015;
const CMD_SET_BASELINE: u16 = 0x201E;
const CMD_SET_HUMIDITY: u16 = 0x2061;

const MEASURE_DELAY_MS: u32 = 12;
const COMMAND_DELAY_MS: u32 = 10;

/// Largest absolute humidity the 8.8 register can express, in mg/m³.
pub const MAX_ABSOLUTE_HUMIDITY: u32 = 256_000;

/// One IAQ measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iaq {
    pub eco2_ppm: u16,
    pub tvoc_ppb: u16,
}

/// mg/m³ → 8.8 fixed-point g/m³.
pub fn humidity_register(absolute_mg_m3: u32) -> Result<u16, SensorError> {
    if absolute_mg_m3 > MAX_ABSOLUTE_HUMIDITY {
        return Err(SensorError::OutOfRange);
    }
    Ok(((u64::from(absolute_mg_m3) * 256 * 16_777) >> 24) as u16)
}

#[derive(Debug, Default)]
pub struct Sgp30;

impl Sgp30 {
    pub fn new() -> Self {
        Self
    }

    pub fn init<I: I2c>(&mut self, bus: &mut I, delay: &mut impl DelayNs) -> Result<(), SensorError> {
        send(bus, CMD_INIT_AIR_QUALITY, &[])?;
        delay.delay_ms(COMMAND_DELAY_MS);
        info!("SGP30: air quality algorithm started");
        Ok(())
    }

    pub fn measure<I: I2c>(&mut self, bus: &mut I, delay: &mut impl DelayNs) -> Result<Iaq, SensorError> {
        let mut buf = [0u8; 6];
        send(bus, CMD_MEASURE_IAQ, &[])?;
        delay.delay_ms(MEASURE_DELAY_MS);
        bus.read(ADDRESS, &mut buf).map_err(|_| SensorError::Bus)?;
        Ok(Iaq {
            eco2_ppm: checked_word(&buf[0..3])?,
            tvoc_ppb: checked_word(&buf[3..6])?,
        })
    }

    pub fn baseline<I: I2c>(&mut self, bus: &mut I, delay: &mut impl DelayNs) -> Result<Baseline, SensorError> {
        let mut buf = [0u8; 6];
        send(bus, CMD_GET_BASELINE, &[])?;
        delay.delay_ms(COMMAND_DELAY_MS);
        bus.read(ADDRESS, &mut buf).map_err(|_| SensorError::Bus)?;
        // eCO2 word first on read.
        Ok(Baseline {
            eco2: checked_word(&buf[0..3])?,
            tvoc: checked_word(&buf[3..6])?,
        })
    }

    pub fn set_baseline<I: I2c>(
        &mut self,
        bus: &mut I,
        delay: &mut impl DelayNs,
        baseline: Baseline,
    ) -> Result<(), SensorError> {
        // tVOC word first on write.
        send(bus, CMD_SET_BASELINE, &[baseline.tvoc, baseline.eco2])?;
        delay.delay_ms(COMMAND_DELAY_MS);
        Ok(())
    }

    /// `absolute_mg_m3 == 0` disables compensation.
    pub fn set_humidity<I: I2c>(
        &mut self,
        bus: &mut I,
        delay: &mut impl DelayNs,
        absolute_mg_m3: u32,
    ) -> Result<(), SensorError> {
        let reg = humidity_register(absolute_mg_m3)?;
        send(bus, CMD_SET_HUMIDITY, &[reg])?;
        delay.delay_ms(COMMAND_DELAY_MS);
        Ok(())
    }
}

fn send<I: I2c>(bus: &mut I, cmd: u16, args: &[u16]) -> Result<(), SensorError> {
    let mut frame: heapless::Vec<u8, 8> = heapless::Vec::new();
    let fits = frame.extend_from_slice(&cmd.to_be_bytes()).is_ok()
        && args
            .iter()
            .all(|&w| frame.extend_from_slice(&word_with_crc(w)).is_ok());
    if !fits {
        return Err(SensorError::Bus);
    }
    bus.write(ADDRESS, &frame).map_err(|_| SensorError::Bus)
}
