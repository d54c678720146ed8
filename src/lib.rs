//! AQNode firmware library.
//!
//! Exposes the sampling, calibration and reporting logic for host-side
//! testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod baseline;
pub mod compensation;
pub mod config;
pub mod error;
pub mod pins;
pub mod recalibration;
pub mod report;
pub mod sampling;
pub mod scheduler;

pub mod adapters;
pub mod drivers;
pub mod sensors;
