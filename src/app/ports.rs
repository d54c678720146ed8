//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (domain)
//! ```
//!
//! Driven adapters (sensor hub, transport, storage, panel, event sinks)
//! implement these traits.  The [`NodeService`](super::service::NodeService)
//! consumes them via generics, so the domain core never touches hardware
//! directly and every path runs on the host under test.

use crate::baseline::Baseline;
use crate::config::NodeConfig;
use crate::error::{CommsError, SensorError};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Everything the domain needs from the three gas/climate sensors.
///
/// Each read is independent; a failure of one channel never prevents the
/// others from being sampled.
pub trait SensorPort {
    /// CO2 concentration in ppm.
    fn read_co2(&mut self) -> Result<f32, SensorError>;

    /// Ambient temperature in °C.
    fn read_temperature(&mut self) -> Result<f32, SensorError>;

    /// Relative humidity in %.
    fn read_humidity(&mut self) -> Result<f32, SensorError>;

    /// tVOC in ppb after applying `humidity_compensation` (mg/m³, 0 = off).
    fn read_tvoc(&mut self, humidity_compensation: u32) -> Result<u16, SensorError>;

    /// Current IAQ baseline from the tVOC sensor.
    fn get_baseline(&mut self) -> Result<Baseline, SensorError>;

    /// Restore a previously saved IAQ baseline.
    fn set_baseline(&mut self, baseline: Baseline) -> Result<(), SensorError>;

    /// Tell the CO2 sensor its current reading equals `reference_ppm`.
    fn force_recalibration(&mut self, reference_ppm: u16) -> Result<(), SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain → collector)
// ───────────────────────────────────────────────────────────────

/// Publish/subscribe link to the remote collector.
pub trait TransportPort {
    fn is_connected(&self) -> bool;

    /// Attempt to (re)establish the session.  One attempt per call; the
    /// caller owns the retry cadence.
    fn connect(&mut self) -> Result<(), CommsError>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError>;
}

// ───────────────────────────────────────────────────────────────
// Panel port (driven adapter: operator button + indicator LED)
// ───────────────────────────────────────────────────────────────

pub trait PanelPort {
    /// Raw (undebounced) button level, `true` = HIGH.
    fn button_raw(&mut self) -> bool;

    fn set_indicator(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`NodeConfig`].
///
/// Implementations validate before persisting and reject out-of-range
/// values with [`ConfigError::ValidationFailed`] rather than clamping.
pub trait ConfigPort {
    /// Load configuration.  Returns [`NodeConfig::default()`] if nothing
    /// is stored.
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ EEPROM-style byte region)
// ───────────────────────────────────────────────────────────────

/// Byte-addressed persistent storage.
///
/// Unwritten bytes read as 0xFF, the way erased EEPROM/flash does.
pub trait StoragePort {
    /// Fill `buf` from `address`.
    fn read(&self, address: u16, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` at `address` and commit it.
    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// Access past the end of the emulated region.
    OutOfBounds,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::OutOfBounds => write!(f, "address out of bounds"),
        }
    }
}
