//! Mock hardware adapters for integration tests.
//!
//! Each mock implements one port and records every call so tests can
//! assert on the full history without touching a real bus, radio or
//! flash partition.  [`Bench`] wires them into a `NodeService` and drives
//! it on a simulated clock.

use std::collections::VecDeque;

use aqnode::app::events::AppEvent;
use aqnode::app::ports::{
    EventSink, PanelPort, SensorPort, StorageError, StoragePort, TransportPort,
};
use aqnode::app::service::NodeService;
use aqnode::baseline::Baseline;
use aqnode::config::NodeConfig;
use aqnode::error::{CommsError, SensorError};

// ── MockSensors ───────────────────────────────────────────────

/// Returns fixed readings unless a scripted CO2 value is queued.
pub struct MockSensors {
    pub co2: Result<f32, SensorError>,
    pub temperature: Result<f32, SensorError>,
    pub humidity: Result<f32, SensorError>,
    pub tvoc: Result<u16, SensorError>,
    /// Consumed one per CO2 read before falling back to `co2`.
    pub co2_script: VecDeque<Result<f32, SensorError>>,
    pub baseline: Result<Baseline, SensorError>,
    /// Compensation argument of every tVOC read, in order.
    pub compensations: Vec<u32>,
    pub baselines_set: Vec<Baseline>,
    pub frc: Vec<u16>,
}

#[allow(dead_code)]
impl MockSensors {
    pub fn new() -> Self {
        Self {
            co2: Ok(410.0),
            temperature: Ok(22.7),
            humidity: Ok(48.2),
            tvoc: Ok(130),
            co2_script: VecDeque::new(),
            baseline: Ok(Baseline {
                tvoc: 0x8A2F,
                eco2: 0x9012,
            }),
            compensations: Vec::new(),
            baselines_set: Vec::new(),
            frc: Vec::new(),
        }
    }

    /// Every channel fails with a bus error.
    pub fn dead() -> Self {
        Self {
            co2: Err(SensorError::Bus),
            temperature: Err(SensorError::Bus),
            humidity: Err(SensorError::Bus),
            tvoc: Err(SensorError::Bus),
            ..Self::new()
        }
    }
}

impl Default for MockSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockSensors {
    fn read_co2(&mut self) -> Result<f32, SensorError> {
        self.co2_script.pop_front().unwrap_or(self.co2)
    }

    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.temperature
    }

    fn read_humidity(&mut self) -> Result<f32, SensorError> {
        self.humidity
    }

    fn read_tvoc(&mut self, humidity_compensation: u32) -> Result<u16, SensorError> {
        self.compensations.push(humidity_compensation);
        self.tvoc
    }

    fn get_baseline(&mut self) -> Result<Baseline, SensorError> {
        self.baseline
    }

    fn set_baseline(&mut self, baseline: Baseline) -> Result<(), SensorError> {
        self.baselines_set.push(baseline);
        Ok(())
    }

    fn force_recalibration(&mut self, reference_ppm: u16) -> Result<(), SensorError> {
        self.frc.push(reference_ppm);
        Ok(())
    }
}

// ── MockTransport ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Connect,
    Publish { topic: String, payload: String },
}

pub struct MockTransport {
    pub connected: bool,
    /// Whether the next `connect()` succeeds.
    pub accept_connect: bool,
    pub fail_publish: bool,
    pub calls: Vec<TransportCall>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn connected() -> Self {
        Self {
            connected: true,
            accept_connect: true,
            fail_publish: false,
            calls: Vec::new(),
        }
    }

    /// Down, and refuses to come back until `accept_connect` is set.
    pub fn offline() -> Self {
        Self {
            connected: false,
            accept_connect: false,
            ..Self::connected()
        }
    }

    pub fn payloads(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::Publish { payload, .. } => Some(payload.as_str()),
                TransportCall::Connect => None,
            })
            .collect()
    }

    pub fn connect_attempts(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == TransportCall::Connect)
            .count()
    }
}

impl TransportPort for MockTransport {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<(), CommsError> {
        self.calls.push(TransportCall::Connect);
        if self.accept_connect {
            self.connected = true;
            Ok(())
        } else {
            Err(CommsError::MqttNotConnected)
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        self.calls.push(TransportCall::Publish {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        });
        if self.fail_publish {
            Err(CommsError::MqttPublishFailed)
        } else {
            Ok(())
        }
    }
}

// ── MockStorage ───────────────────────────────────────────────

/// Erased 512-byte EEPROM region.
pub struct MockStorage {
    pub bytes: Vec<u8>,
    pub writes: usize,
}

#[allow(dead_code)]
impl MockStorage {
    pub fn erased() -> Self {
        Self {
            bytes: vec![0xFF; 512],
            writes: 0,
        }
    }
}

impl StoragePort for MockStorage {
    fn read(&self, address: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        let start = usize::from(address);
        let src = self
            .bytes
            .get(start..start + buf.len())
            .ok_or(StorageError::OutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        let start = usize::from(address);
        let dst = self
            .bytes
            .get_mut(start..start + data.len())
            .ok_or(StorageError::OutOfBounds)?;
        dst.copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}

// ── MockPanel ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockPanel {
    /// Raw button level returned on every read.
    pub button: bool,
    /// Every level written to the indicator.
    pub indicator: Vec<bool>,
}

impl PanelPort for MockPanel {
    fn button_raw(&mut self) -> bool {
        self.button
    }

    fn set_indicator(&mut self, on: bool) {
        self.indicator.push(on);
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Bench ─────────────────────────────────────────────────────

/// A started `NodeService` plus its mocks, driven in poll-sized steps.
pub struct Bench {
    pub svc: NodeService,
    pub sensors: MockSensors,
    pub transport: MockTransport,
    pub storage: MockStorage,
    pub panel: MockPanel,
    pub sink: RecordingSink,
    pub now_ms: u64,
    step_ms: u64,
}

#[allow(dead_code)]
impl Bench {
    pub fn new(config: NodeConfig, sensors: MockSensors, transport: MockTransport) -> Self {
        Self::with_storage(config, sensors, transport, MockStorage::erased())
    }

    pub fn with_storage(
        config: NodeConfig,
        mut sensors: MockSensors,
        transport: MockTransport,
        storage: MockStorage,
    ) -> Self {
        let step_ms = u64::from(config.poll_interval_ms);
        let mut svc = NodeService::new(config, 0);
        let mut sink = RecordingSink::default();
        svc.start(&mut sensors, &storage, &mut sink);
        Self {
            svc,
            sensors,
            transport,
            storage,
            panel: MockPanel::default(),
            sink,
            now_ms: 0,
            step_ms,
        }
    }

    pub fn tick(&mut self) {
        self.svc.tick(
            self.now_ms,
            &mut self.sensors,
            &mut self.transport,
            &mut self.storage,
            &mut self.panel,
            &mut self.sink,
        );
    }

    /// Tick at every poll step after the current time up to and
    /// including `until_ms`.
    pub fn run_until(&mut self, until_ms: u64) {
        while self.now_ms + self.step_ms <= until_ms {
            self.now_ms += self.step_ms;
            self.tick();
        }
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.sink.events.iter().filter(|e| pred(e)).count()
    }
}
