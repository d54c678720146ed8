//! GPIO / peripheral pin assignments for the AQNode board.
//!
//! Single source of truth: the firmware entry point references this module
//! rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Operator panel
// ---------------------------------------------------------------------------

/// Forced-recalibration push-button. Active HIGH, external pull-down,
/// debounced in software only.
pub const BUTTON_GPIO: i32 = 14;

/// Recalibration indicator LED. HIGH = lit.
pub const INDICATOR_LED_GPIO: i32 = 12;

// ---------------------------------------------------------------------------
// I²C bus (SCD30 @0x61, BME280 @0x76, SGP30 @0x58)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;

/// Standard-mode bus clock. The SCD30 clock-stretches and does not
/// tolerate fast mode.
pub const I2C_FREQ_HZ: u32 = 50_000;
