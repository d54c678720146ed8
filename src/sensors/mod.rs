//! Sensor subsystem: individual drivers and the aggregating [`SensorHub`].
//!
//! All three parts sit on one I2C bus.  The hub owns the bus and the
//! delay provider and lends them to each driver per call, so no bus
//! sharing wrapper is needed.  It implements [`SensorPort`] for the
//! node service.
//!
//! | Channel     | Part   | Address |
//! |-------------|--------|---------|
//! | CO2         | SCD30  | 0x61    |
//! | Temperature | BME280 | 0x76    |
//! | Humidity    | BME280 | 0x76    |
//! | tVOC        | SGP30  | 0x58    |

pub mod bme280;
pub mod crc;
pub mod scd30;
pub mod sgp30;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{error, warn};

use crate::app::ports::SensorPort;
use crate::baseline::Baseline;
use crate::error::SensorError;
use bme280::Bme280;
use scd30::Scd30;
use sgp30::Sgp30;

/// Owns the shared bus and every driver.
pub struct SensorHub<I2C, D> {
    bus: I2C,
    delay: D,
    scd30: Scd30,
    /// `None` until the BME280 answers with its chip id.
    bme280: Option<Bme280>,
    sgp30: Sgp30,
}

impl<I2C: I2c, D: DelayNs> SensorHub<I2C, D> {
    pub fn new(bus: I2C, delay: D) -> Self {
        Self {
            bus,
            delay,
            scd30: Scd30::new(),
            bme280: None,
            sgp30: Sgp30::new(),
        }
    }

    /// Bring up all three parts.  A part that fails to start is logged
    /// and left for its reads to report; the node keeps running on the
    /// rest.
    pub fn init(&mut self, sample_period_ms: u32) {
        let interval_secs = (sample_period_ms / 1_000).clamp(2, 1_800) as u16;
        if let Err(e) = self.scd30.start(&mut self.bus, interval_secs) {
            error!("SCD30: start failed ({})", e);
        }
        match Bme280::init(&mut self.bus) {
            Ok(bme) => self.bme280 = Some(bme),
            Err(e) => error!("BME280: init failed ({})", e),
        }
        if let Err(e) = self.sgp30.init(&mut self.bus, &mut self.delay) {
            error!("SGP30: init failed ({})", e);
        }
    }

    fn climate(&mut self) -> Result<bme280::Climate, SensorError> {
        if self.bme280.is_none() {
            // Late power-up or a loose connector: retry the init.
            self.bme280 = Some(Bme280::init(&mut self.bus)?);
        }
        match self.bme280.as_mut() {
            Some(bme) => bme.read(&mut self.bus),
            None => Err(SensorError::NotReady),
        }
    }
}

impl<I2C: I2c, D: DelayNs> SensorPort for SensorHub<I2C, D> {
    fn read_co2(&mut self) -> Result<f32, SensorError> {
        self.scd30.read_co2(&mut self.bus, &mut self.delay)
    }

    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.climate().map(|c| c.temperature_c)
    }

    fn read_humidity(&mut self) -> Result<f32, SensorError> {
        self.climate().map(|c| c.humidity_pct)
    }

    fn read_tvoc(&mut self, humidity_compensation: u32) -> Result<u16, SensorError> {
        if let Err(e) = self
            .sgp30
            .set_humidity(&mut self.bus, &mut self.delay, humidity_compensation)
        {
            warn!("SGP30: humidity compensation not applied ({})", e);
        }
        self.sgp30
            .measure(&mut self.bus, &mut self.delay)
            .map(|iaq| iaq.tvoc_ppb)
    }

    fn get_baseline(&mut self) -> Result<Baseline, SensorError> {
        self.sgp30.baseline(&mut self.bus, &mut self.delay)
    }

    fn set_baseline(&mut self, baseline: Baseline) -> Result<(), SensorError> {
        self.sgp30.set_baseline(&mut self.bus, &mut self.delay, baseline)
    }

    fn force_recalibration(&mut self, reference_ppm: u16) -> Result<(), SensorError> {
        self.scd30.force_recalibration(&mut self.bus, reference_ppm)
    }
}

/// Scripted in-memory I2C bus for driver tests.
#[cfg(test)]
pub(crate) mod fake_bus {
    use std::collections::VecDeque;

    use embedded_hal::delay::DelayNs;
    use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};

    /// Records every write and answers reads from a queue.
    #[derive(Default)]
    pub struct FakeBus {
        pub writes: Vec<(u8, Vec<u8>)>,
        reads: VecDeque<Vec<u8>>,
        pub fail: bool,
    }

    impl FakeBus {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn queue_read(&mut self, bytes: &[u8]) {
            self.reads.push_back(bytes.to_vec());
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                    Operation::Read(buf) => {
                        let data = self.reads.pop_front().ok_or(ErrorKind::Other)?;
                        if data.len() != buf.len() {
                            return Err(ErrorKind::Other);
                        }
                        buf.copy_from_slice(&data);
                    }
                }
            }
            Ok(())
        }
    }

    pub struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }
}
