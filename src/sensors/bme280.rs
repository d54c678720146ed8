//! Bosch BME280 temperature / humidity sensor.
//!
//! ## Hardware
//!
//! I2C address 0x76 (SDO low).  Runs in normal mode with ×1 oversampling
//! on every channel and a 1 s standby, so a burst read of `0xF7..0xFE`
//! always returns the latest conversion without triggering one.
//!
//! Compensation is the floating-point variant from the Bosch datasheet.
//! Pressure is converted by the part but not used.

use embedded_hal::i2c::I2c;
use log::info;

use crate::error::SensorError;

pub const ADDRESS: u8 = 0x76;
const CHIP_ID: u8 = 0x60;

const REG_CHIP_ID: u8 = 0xD0;
const REG_CALIB_00: u8 = 0x88;
const REG_CALIB_26: u8 = 0xE1;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_DATA: u8 = 0xF7;

/// osrs_h = ×1
const CTRL_HUM: u8 = 0x01;
/// osrs_t = ×1, osrs_p = ×1, normal mode
const CTRL_MEAS: u8 = 0x27;
/// t_sb = 1000 ms, filter off
const CONFIG: u8 = 0xA0;

/// Raw ADC values the part reports while a channel is skipped.
const ADC_T_SKIPPED: u32 = 0x8_0000;
const ADC_H_SKIPPED: u32 = 0x8000;

/// Factory trimming parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

impl Calibration {
    /// Parse the `0x88..=0xA1` and `0xE1..=0xE7` blocks.
    pub fn from_registers(block0: &[u8; 26], block1: &[u8; 7]) -> Self {
        let le_u16 = |i: usize| u16::from_le_bytes([block0[i], block0[i + 1]]);
        let le_i16 = |i: usize| i16::from_le_bytes([block0[i], block0[i + 1]]);
        Self {
            t1: le_u16(0),
            t2: le_i16(2),
            t3: le_i16(4),
            h1: block0[25],
            h2: i16::from_le_bytes([block1[0], block1[1]]),
            h3: block1[2],
            // H4 and H5 share the low/high nibbles of 0xE5.
            h4: (i16::from(block1[3] as i8) << 4) | i16::from(block1[4] & 0x0F),
            h5: (i16::from(block1[5] as i8) << 4) | i16::from(block1[4] >> 4),
            h6: block1[6] as i8,
        }
    }

    /// Returns `(°C, t_fine)`.
    pub fn compensate_temperature(&self, adc_t: u32) -> (f32, f32) {
        let adc = adc_t as f32;
        let t1 = f32::from(self.t1);
        let var1 = (adc / 16_384.0 - t1 / 1_024.0) * f32::from(self.t2);
        let d = adc / 131_072.0 - t1 / 8_192.0;
        let var2 = d * d * f32::from(self.t3);
        let t_fine = var1 + var2;
        (t_fine / 5_120.0, t_fine)
    }

    /// Relative humidity in %, clamped to 0..=100.
    pub fn compensate_humidity(&self, adc_h: u32, t_fine: f32) -> f32 {
        let mut h = t_fine - 76_800.0;
        h = (adc_h as f32 - (f32::from(self.h4) * 64.0 + f32::from(self.h5) / 16_384.0 * h))
            * (f32::from(self.h2) / 65_536.0
                * (1.0
                    + f32::from(self.h6) / 67_108_864.0
                        * h
                        * (1.0 + f32::from(self.h3) / 67_108_864.0 * h)));
        h *= 1.0 - f32::from(self.h1) * h / 524_288.0;
        h.clamp(0.0, 100.0)
    }
}

/// One compensated reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

#[derive(Debug)]
pub struct Bme280 {
    calibration: Calibration,
}

impl Bme280 {
    /// Check the chip id, read the trimming data and start normal mode.
    pub fn init<I: I2c>(bus: &mut I) -> Result<Self, SensorError> {
        let mut id = [0u8; 1];
        read_regs(bus, REG_CHIP_ID, &mut id)?;
        if id[0] != CHIP_ID {
            return Err(SensorError::UnknownDevice);
        }

        let mut block0 = [0u8; 26];
        let mut block1 = [0u8; 7];
        read_regs(bus, REG_CALIB_00, &mut block0)?;
        read_regs(bus, REG_CALIB_26, &mut block1)?;
        let calibration = Calibration::from_registers(&block0, &block1);

        // ctrl_hum only takes effect after a ctrl_meas write.
        write_reg(bus, REG_CTRL_HUM, CTRL_HUM)?;
        write_reg(bus, REG_CTRL_MEAS, CTRL_MEAS)?;
        write_reg(bus, REG_CONFIG, CONFIG)?;
        info!("BME280: ready");
        Ok(Self { calibration })
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn read<I: I2c>(&mut self, bus: &mut I) -> Result<Climate, SensorError> {
        let mut d = [0u8; 8];
        read_regs(bus, REG_DATA, &mut d)?;
        let adc_t = (u32::from(d[3]) << 12) | (u32::from(d[4]) << 4) | (u32::from(d[5]) >> 4);
        let adc_h = (u32::from(d[6]) << 8) | u32::from(d[7]);
        if adc_t == ADC_T_SKIPPED || adc_h == ADC_H_SKIPPED {
            return Err(SensorError::NotReady);
        }

        let (temperature_c, t_fine) = self.calibration.compensate_temperature(adc_t);
        Ok(Climate {
            temperature_c,
            humidity_pct: self.calibration.compensate_humidity(adc_h, t_fine),
        })
    }
}

fn read_regs<I: I2c>(bus: &mut I, reg: u8, buf: &mut [u8]) -> Result<(), SensorError> {
    bus.write_read(ADDRESS, &[reg], buf).map_err(|_| SensorError::Bus)
}

fn write_reg<I: I2c>(bus: &mut I, reg: u8, value: u8) -> Result<(), SensorError> {
    bus.write(ADDRESS, &[reg, value]).map_err(|_| SensorError::Bus)
}
