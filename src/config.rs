//! Node configuration parameters
//!
//! All tunable parameters for the air-quality node.  Injected into the
//! service at startup; values can be overridden via NVS.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::sampling::SAMPLE_DEPTH;

/// Which clock the recalibration warm-up threshold is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarmupReference {
    /// Elapsed time since boot.  Matches deployed units: a request made
    /// long after boot applies immediately.
    SinceBoot,
    /// Elapsed time since the button request was accepted.
    SinceRequest,
}

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Cadence ---
    /// Main loop poll tick (milliseconds)
    pub poll_interval_ms: u32,
    /// Sensor sampling period (milliseconds)
    pub sample_period_ms: u32,
    /// Reporting interval (milliseconds)
    pub interval_ms: u32,

    // --- Recalibration ---
    /// How long a button level must hold before it is accepted (milliseconds)
    pub debounce_ms: u32,
    /// CO2 sensor warm-up before a forced recalibration may run (milliseconds)
    pub warmup_ms: u32,
    /// Clock the warm-up threshold is compared against
    pub warmup_reference: WarmupReference,
    /// Reference gas concentration applied on forced recalibration (ppm)
    pub recalibration_reference_ppm: u16,
    /// Number of confirmation blinks after recalibration
    pub confirm_blinks: u8,
    /// LED on (and off) time of one confirmation blink (milliseconds)
    pub blink_half_period_ms: u32,

    // --- Baseline persistence ---
    /// Save the tVOC baseline every N reporting intervals
    pub baseline_save_every: u16,
    /// Byte address of the baseline record in persistent storage
    pub baseline_address: u16,

    // --- Transport ---
    /// Delay between reconnect attempts (milliseconds)
    pub reconnect_delay_ms: u32,
    /// Maximum encoded report size (bytes)
    pub payload_limit: usize,
    /// MQTT broker URL
    pub mqtt_url: heapless::String<64>,
    /// MQTT client identifier
    pub mqtt_client_id: heapless::String<32>,
    /// Topic reports are published to
    pub mqtt_topic: heapless::String<32>,
    /// WiFi network name
    pub wifi_ssid: heapless::String<32>,
    /// WiFi passphrase (empty for open networks)
    pub wifi_password: heapless::String<64>,
}

fn hstr<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    // Defaults below are all shorter than their capacity.
    let _ = out.push_str(s);
    out
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            // Cadence
            poll_interval_ms: 50,
            sample_period_ms: 2_000, // one cycle every 2 s
            interval_ms: 60_000,     // one report per minute

            // Recalibration
            debounce_ms: 3_000,
            warmup_ms: 180_000, // 3 min SCD30 warm-up
            warmup_reference: WarmupReference::SinceBoot,
            recalibration_reference_ppm: 407,
            confirm_blinks: 10,
            blink_half_period_ms: 250,

            // Baseline persistence
            baseline_save_every: 60, // ~1 hour
            baseline_address: 0,

            // Transport
            reconnect_delay_ms: 2_000,
            payload_limit: 50,
            mqtt_url: hstr("mqtt://3.104.60.108:1883"),
            mqtt_client_id: hstr("aqnode"),
            mqtt_topic: hstr("outTopic"),
            wifi_ssid: hstr(""),
            wifi_password: hstr(""),
        }
    }
}

impl NodeConfig {
    /// Number of sampling cycles that fit in one reporting interval.
    pub fn cycles_per_interval(&self) -> u32 {
        self.interval_ms / self.sample_period_ms.max(1)
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(10..=1_000).contains(&self.poll_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "poll_interval_ms must be 10–1000",
            ));
        }
        if !(500..=60_000).contains(&self.sample_period_ms) {
            return Err(ConfigError::ValidationFailed(
                "sample_period_ms must be 500–60000",
            ));
        }
        if self.poll_interval_ms >= self.sample_period_ms {
            return Err(ConfigError::ValidationFailed(
                "poll_interval_ms must be < sample_period_ms",
            ));
        }
        if self.interval_ms < self.sample_period_ms {
            return Err(ConfigError::ValidationFailed(
                "interval_ms must be >= sample_period_ms",
            ));
        }
        if self.cycles_per_interval() as usize > SAMPLE_DEPTH {
            return Err(ConfigError::ValidationFailed(
                "interval_ms / sample_period_ms must not exceed the sample buffer depth",
            ));
        }
        if self.debounce_ms == 0 {
            return Err(ConfigError::ValidationFailed("debounce_ms must be > 0"));
        }
        if !(400..=10_000).contains(&self.recalibration_reference_ppm) {
            return Err(ConfigError::ValidationFailed(
                "recalibration_reference_ppm must be 400–10000",
            ));
        }
        if self.blink_half_period_ms <= self.poll_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "blink_half_period_ms must be > poll_interval_ms",
            ));
        }
        if self.baseline_save_every == 0 {
            return Err(ConfigError::ValidationFailed(
                "baseline_save_every must be > 0",
            ));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "reconnect_delay_ms must be > 0",
            ));
        }
        if !(16..=256).contains(&self.payload_limit) {
            return Err(ConfigError::ValidationFailed(
                "payload_limit must be 16–256",
            ));
        }
        if self.mqtt_topic.is_empty() {
            return Err(ConfigError::ValidationFailed("mqtt_topic must not be empty"));
        }
        Ok(())
    }
}
