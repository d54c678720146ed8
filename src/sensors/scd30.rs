//! Sensirion SCD30 NDIR CO2 sensor.
//!
//! ## Hardware
//!
//! I2C address 0x61, clock stretching up to 150 ms, at most 100 kHz.
//! Commands are 16-bit big-endian; arguments and results travel as
//! CRC-protected words.  The sensor needs ≥3 ms between a read command
//! and the read itself.
//!
//! Only CO2 is taken from this part; temperature and humidity come from
//! the BME280, which sits away from the SCD30's heated optics.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::info;

use super::crc::{checked_word, word_with_crc};
use crate::error::SensorError;

pub const ADDRESS: u8 = 0x61;

const CMD_START_CONTINUOUS: u16 = 0x0010;
const CMD_MEASUREMENT_INTERVAL: u16 = 0x4600;
const CMD_DATA_READY: u16 = 0x0202;
const CMD_READ_MEASUREMENT: u16 = 0x0300;
const CMD_FORCED_RECALIBRATION: u16 = 0x5204;

const READ_DELAY_MS: u32 = 3;

/// Driver state.  The bus is borrowed per call so the SCD30 can share it
/// with the other sensors.
#[derive(Debug, Default)]
pub struct Scd30;

impl Scd30 {
    pub fn new() -> Self {
        Self
    }

    /// Start continuous measurement (no pressure compensation) at
    /// `interval_secs`.
    pub fn start<I: I2c>(&mut self, bus: &mut I, interval_secs: u16) -> Result<(), SensorError> {
        write_command(bus, CMD_MEASUREMENT_INTERVAL, Some(interval_secs))?;
        write_command(bus, CMD_START_CONTINUOUS, Some(0))?;
        info!("SCD30: continuous measurement every {} s", interval_secs);
        Ok(())
    }

    pub fn data_ready<I: I2c>(&mut self, bus: &mut I, delay: &mut impl DelayNs) -> Result<bool, SensorError> {
        let mut buf = [0u8; 3];
        read_command(bus, delay, CMD_DATA_READY, &mut buf)?;
        Ok(checked_word(&buf)? == 1)
    }

    /// CO2 in ppm.  `NotReady` if no new measurement is available.
    pub fn read_co2<I: I2c>(&mut self, bus: &mut I, delay: &mut impl DelayNs) -> Result<f32, SensorError> {
        if !self.data_ready(bus, delay)? {
            return Err(SensorError::NotReady);
        }
        // CO2, temperature, humidity: three floats as word pairs.
        let mut buf = [0u8; 18];
        read_command(bus, delay, CMD_READ_MEASUREMENT, &mut buf)?;
        let hi = checked_word(&buf[0..3])?;
        let lo = checked_word(&buf[3..6])?;
        Ok(f32::from_bits((u32::from(hi) << 16) | u32::from(lo)))
    }

    /// Forced recalibration: the current concentration is `reference_ppm`.
    pub fn force_recalibration<I: I2c>(&mut self, bus: &mut I, reference_ppm: u16) -> Result<(), SensorError> {
        write_command(bus, CMD_FORCED_RECALIBRATION, Some(reference_ppm))?;
        info!("SCD30: forced recalibration to {} ppm", reference_ppm);
        Ok(())
    }
}

fn write_command<I: I2c>(bus: &mut I, cmd: u16, arg: Option<u16>) -> Result<(), SensorError> {
    let [c0, c1] = cmd.to_be_bytes();
    let result = match arg {
        Some(word) => {
            let [a0, a1, crc] = word_with_crc(word);
            bus.write(ADDRESS, &[c0, c1, a0, a1, crc])
        }
        None => bus.write(ADDRESS, &[c0, c1]),
    };
    result.map_err(|_| SensorError::Bus)
}

fn read_command<I: I2c>(
    bus: &mut I,
    delay: &mut impl DelayNs,
    cmd: u16,
    buf: &mut [u8],
) -> Result<(), SensorError> {
    write_command(bus, cmd, None)?;
    delay.delay_ms(READ_DELAY_MS);
    bus.read(ADDRESS, buf).map_err(|_| SensorError::Bus)
}
