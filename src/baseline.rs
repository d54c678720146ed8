//! tVOC baseline persistence.
//!
//! The SGP30 learns a drift-compensation baseline over hours of operation.
//! It is restored from storage once at boot and written back every
//! `baseline_save_every` reporting intervals, so a power cycle costs at
//! most that many intervals of learning.
//!
//! ## Storage layout (big-endian, 4 bytes at `baseline_address`)
//!
//! | Offset | Field              |
//! |--------|--------------------|
//! | 0      | tVOC baseline u16  |
//! | 2      | eCO2 baseline u16  |
//!
//! Erased storage reads 0xFFFF, which lands above [`BASELINE_SENTINEL`]
//! and therefore decodes as "nothing stored".

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};

/// tVOC baseline values at or above this mean no baseline is stored.
pub const BASELINE_SENTINEL: u16 = 65_534;

const RECORD_LEN: usize = 4;

/// SGP30 IAQ baseline pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Baseline {
    pub tvoc: u16,
    pub eco2: u16,
}

impl Baseline {
    pub fn to_bytes(self) -> [u8; RECORD_LEN] {
        let t = self.tvoc.to_be_bytes();
        let e = self.eco2.to_be_bytes();
        [t[0], t[1], e[0], e[1]]
    }

    /// Decode a stored record; `None` for the erased/sentinel range.
    pub fn from_bytes(bytes: [u8; RECORD_LEN]) -> Option<Self> {
        let tvoc = u16::from_be_bytes([bytes[0], bytes[1]]);
        if tvoc >= BASELINE_SENTINEL {
            return None;
        }
        Some(Self {
            tvoc,
            eco2: u16::from_be_bytes([bytes[2], bytes[3]]),
        })
    }
}

/// Loads the baseline at boot and decides when to write it back.
pub struct BaselineManager {
    address: u16,
    save_every: u16,
    counter: u16,
}

impl BaselineManager {
    pub fn new(address: u16, save_every: u16) -> Self {
        Self {
            address,
            save_every: save_every.max(1),
            counter: 0,
        }
    }

    /// Intervals counted towards the next save.
    pub fn counter(&self) -> u16 {
        self.counter
    }

    /// Read the stored baseline.  Storage failures are logged and treated
    /// like an empty slot.
    pub fn load(&self, storage: &impl StoragePort) -> Option<Baseline> {
        let mut buf = [0u8; RECORD_LEN];
        if let Err(e) = storage.read(self.address, &mut buf) {
            warn!("Baseline: storage read failed ({}), starting without one", e);
            return None;
        }
        let baseline = Baseline::from_bytes(buf);
        match baseline {
            Some(b) => info!("Baseline: loaded tVOC=0x{:04X} eCO2=0x{:04X}", b.tvoc, b.eco2),
            None => info!("Baseline: none stored"),
        }
        baseline
    }

    /// Count one completed interval and write `baseline` if the save
    /// cadence is reached.  Returns `Ok(true)` when a write happened.
    ///
    /// Only call this for intervals where the sensor produced a baseline.
    pub fn maybe_save(
        &mut self,
        baseline: Baseline,
        storage: &mut impl StoragePort,
    ) -> Result<bool, StorageError> {
        self.counter += 1;
        if self.counter < self.save_every {
            return Ok(false);
        }
        self.counter = 0;
        storage.write(self.address, &baseline.to_bytes())?;
        info!(
            "Baseline: saved tVOC=0x{:04X} eCO2=0x{:04X}",
            baseline.tvoc, baseline.eco2
        );
        Ok(true)
    }
}
