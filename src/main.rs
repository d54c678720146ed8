//! AQNode firmware entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SensorHub        GpioPanel      NvsAdapter      UptimeClock   │
//! │  (SensorPort)     (PanelPort)    (Config+Store)  (monotonic)   │
//! │  MqttTransport    LogEventSink                                 │
//! │  (TransportPort)  (EventSink)                                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              NodeService (pure logic)                  │    │
//! │  │  Sampling · Compensation · Recalibration · Reporting   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use esp_idf_hal::delay::{Delay, FreeRtos};
use esp_idf_hal::gpio::{AnyIOPin, PinDriver};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use aqnode::adapters::log_sink::LogEventSink;
use aqnode::adapters::mqtt::MqttTransport;
use aqnode::adapters::nvs::NvsAdapter;
use aqnode::adapters::panel::GpioPanel;
use aqnode::adapters::time::UptimeClock;
use aqnode::app::ports::TransportPort;
use aqnode::app::service::NodeService;
use aqnode::config::NodeConfig;
use aqnode::pins;
use aqnode::sensors::SensorHub;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  AQNode v{}                          ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let (mut storage, mut config) = NvsAdapter::open()?;
    apply_build_credentials(&mut config);

    // ── 3. Sensors on the shared I2C bus ──────────────────────
    // SAFETY: each GPIO below is claimed exactly once and is not
    // reachable through `peripherals.pins`, which is never used.
    let (sda, scl, button_pin, led_pin) = unsafe {
        (
            AnyIOPin::new(pins::I2C_SDA_GPIO as _),
            AnyIOPin::new(pins::I2C_SCL_GPIO as _),
            AnyIOPin::new(pins::BUTTON_GPIO as _),
            AnyIOPin::new(pins::INDICATOR_LED_GPIO as _),
        )
    };
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        sda,
        scl,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    )?;
    let mut sensors = SensorHub::new(i2c, Delay::new_default());
    sensors.init(config.sample_period_ms);

    // ── 4. Operator panel ─────────────────────────────────────
    let button = PinDriver::input(button_pin)?;
    let led = PinDriver::output(led_pin)?;
    let mut panel = GpioPanel::new(button, led);

    // ── 5. Wi-Fi + MQTT ───────────────────────────────────────
    let mut transport = MqttTransport::new(peripherals.modem, sys_loop, Some(nvs_partition), &config)?;
    if let Err(e) = transport.connect() {
        // The publisher keeps retrying on its own cadence.
        warn!("Initial connect failed ({})", e);
    }

    // ── 6. Service ────────────────────────────────────────────
    let clock = UptimeClock::new();
    let mut sink = LogEventSink::new();
    let poll_ms = config.poll_interval_ms;
    let mut service = NodeService::new(config, clock.uptime_ms());
    service.start(&mut sensors, &storage, &mut sink);

    info!("System ready. Entering poll loop.");

    // ── 7. Poll loop ──────────────────────────────────────────
    loop {
        service.tick(
            clock.uptime_ms(),
            &mut sensors,
            &mut transport,
            &mut storage,
            &mut panel,
            &mut sink,
        );
        FreeRtos::delay_ms(poll_ms);
    }
}

/// Fill empty Wi-Fi credentials from `AQNODE_WIFI_SSID` /
/// `AQNODE_WIFI_PASS` set at build time.
fn apply_build_credentials(config: &mut NodeConfig) {
    if !config.wifi_ssid.is_empty() {
        return;
    }
    if let Some(ssid) = option_env!("AQNODE_WIFI_SSID") {
        if config.wifi_ssid.push_str(ssid).is_err() {
            warn!("AQNODE_WIFI_SSID longer than {} bytes, ignored", config.wifi_ssid.capacity());
            config.wifi_ssid.clear();
            return;
        }
    }
    if let Some(pass) = option_env!("AQNODE_WIFI_PASS") {
        config.wifi_password.clear();
        if config.wifi_password.push_str(pass).is_err() {
            warn!("AQNODE_WIFI_PASS longer than {} bytes, ignored", config.wifi_password.capacity());
            config.wifi_password.clear();
        }
    }
}
