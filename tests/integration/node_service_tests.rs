//! Integration tests for the sampling → averaging → report pipeline,
//! the recalibration flow and baseline persistence.
//!
//! Every test drives a real `NodeService` through the mock ports on a
//! simulated 50 ms poll clock.

use crate::mock_hw::{Bench, MockSensors, MockStorage, MockTransport, TransportCall};

use aqnode::app::events::AppEvent;
use aqnode::baseline::Baseline;
use aqnode::compensation::absolute_humidity;
use aqnode::config::NodeConfig;
use aqnode::error::SensorError;
use aqnode::recalibration::RecalState;

fn bench(sensors: MockSensors) -> Bench {
    Bench::new(NodeConfig::default(), sensors, MockTransport::connected())
}

// ── Averaging ─────────────────────────────────────────────────

#[test]
fn first_interval_publishes_truncated_averages() {
    let mut b = bench(MockSensors::new());

    b.run_until(59_950);
    assert_eq!(b.svc.buffer().len(), 29, "first interval holds 29 cycles");
    assert!(b.transport.calls.is_empty());

    b.run_until(60_000);
    assert_eq!(
        b.transport.calls,
        vec![TransportCall::Publish {
            topic: "outTopic".into(),
            payload: r#"{"t":22,"h":48,"c":410,"v":130}"#.into(),
        }]
    );
    // The cycle due on the boundary starts the next interval.
    assert_eq!(b.svc.buffer().len(), 1);
    assert_eq!(b.svc.intervals_closed(), 1);
}

#[test]
fn later_intervals_hold_thirty_cycles() {
    let mut b = bench(MockSensors::new());
    b.run_until(119_950);
    assert_eq!(b.svc.buffer().len(), 30);
    b.run_until(120_000);
    assert_eq!(b.transport.payloads().len(), 2);
}

#[test]
fn average_is_floor_of_present_readings() {
    let mut sensors = MockSensors::new();
    // 15 × 400 + 14 × 401 = 11 614 over 29 cycles → 400.48
    sensors.co2_script = (0..29)
        .map(|i| Ok(if i % 2 == 0 { 400.0 } else { 401.0 }))
        .collect();
    let mut b = bench(sensors);
    b.run_until(60_000);
    assert_eq!(b.transport.payloads(), vec![r#"{"t":22,"h":48,"c":400,"v":130}"#]);
}

#[test]
fn failed_and_implausible_reads_are_excluded() {
    let mut sensors = MockSensors::new();
    sensors.co2_script.extend((0..5).map(|_| Err(SensorError::Bus)));
    sensors.co2_script.extend((0..5).map(|_| Ok(55_000.0)));
    sensors.humidity = Ok(100.0);
    let mut b = bench(sensors);
    b.run_until(60_000);
    assert_eq!(b.transport.payloads(), vec![r#"{"t":22,"h":0,"c":410,"v":130}"#]);
}

#[test]
fn interval_without_readings_reports_zeros() {
    let mut b = bench(MockSensors::dead());
    b.run_until(60_000);
    assert_eq!(b.transport.payloads(), vec![r#"{"t":0,"h":0,"c":0,"v":0}"#]);
}

// ── Humidity compensation ─────────────────────────────────────

#[test]
fn tvoc_read_uses_previous_cycle_climate() {
    let mut sensors = MockSensors::new();
    sensors.temperature = Ok(25.0);
    sensors.humidity = Ok(50.0);
    let mut b = bench(sensors);

    b.run_until(4_000);
    assert_eq!(b.sensors.compensations, vec![0, 11_483]);

    // A failed climate read keeps the last valid pair.
    b.sensors.temperature = Err(SensorError::Bus);
    b.sensors.humidity = Err(SensorError::Bus);
    b.run_until(8_000);
    assert_eq!(b.sensors.compensations, vec![0, 11_483, 11_483, 11_483]);
}

#[test]
fn sample_event_carries_compensation() {
    let mut b = bench(MockSensors::new());
    b.run_until(4_000);
    let comps: Vec<u32> = b
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::SampleTaken { compensation, .. } => Some(*compensation),
            _ => None,
        })
        .collect();
    // First cycle has no climate yet; the second uses 22 °C / 48 %RH,
    // truncated from the 22.7 / 48.2 readings.
    assert_eq!(comps, vec![0, absolute_humidity(22.0, 48.0)]);
}

// ── Recalibration ─────────────────────────────────────────────

fn recal_transitions(b: &Bench) -> Vec<(RecalState, RecalState)> {
    b.sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::RecalibrationChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

#[test]
fn early_press_waits_for_warmup_then_confirms() {
    let mut b = bench(MockSensors::new());
    b.run_until(9_950);
    b.panel.button = true;
    b.run_until(13_000);
    assert_eq!(b.svc.recalibration_state(), RecalState::Idle, "still inside debounce window");
    b.run_until(13_050);
    assert_eq!(b.svc.recalibration_state(), RecalState::Requested);
    assert_eq!(b.panel.indicator.last(), Some(&true));

    b.panel.button = false;
    b.run_until(179_950);
    assert_eq!(b.svc.recalibration_state(), RecalState::Requested);
    assert!(b.sensors.frc.is_empty());

    b.run_until(180_050);
    assert_eq!(b.svc.recalibration_state(), RecalState::Applying);
    assert_eq!(b.sensors.frc, vec![407]);

    b.run_until(186_000);
    assert_eq!(b.svc.recalibration_state(), RecalState::Idle);
    assert_eq!(b.panel.indicator.last(), Some(&false));
    // Solid on, then the remaining nine blink-on edges.
    assert_eq!(b.panel.indicator.iter().filter(|&&on| on).count(), 10);
    assert_eq!(
        recal_transitions(&b),
        vec![
            (RecalState::Idle, RecalState::Requested),
            (RecalState::Requested, RecalState::Applying),
            (RecalState::Applying, RecalState::Idle),
        ]
    );
}

#[test]
fn bouncing_button_never_registers() {
    let mut b = bench(MockSensors::new());
    b.run_until(9_950);
    b.panel.button = true;
    b.run_until(10_950);
    b.panel.button = false;
    b.run_until(11_950);
    b.panel.button = true;
    b.run_until(12_450);
    b.panel.button = false;
    b.run_until(30_000);

    assert_eq!(b.svc.recalibration_state(), RecalState::Idle);
    assert!(recal_transitions(&b).is_empty());
    assert_eq!(b.panel.indicator, vec![false]);
}

#[test]
fn sampling_continues_during_recalibration() {
    let mut b = bench(MockSensors::new());
    b.panel.button = true;
    b.run_until(60_000);
    assert_eq!(b.svc.recalibration_state(), RecalState::Requested);
    assert_eq!(b.transport.payloads().len(), 1);
}

// ── Baseline persistence ──────────────────────────────────────

#[test]
fn baseline_saved_on_sixtieth_interval_and_restored_at_boot() {
    let mut b = bench(MockSensors::new());
    assert_eq!(b.sink.events[0], AppEvent::Started { baseline: None });

    b.run_until(59 * 60_000);
    assert_eq!(b.storage.writes, 0);
    assert_eq!(&b.storage.bytes[0..4], &[0xFF; 4]);

    b.run_until(60 * 60_000);
    assert_eq!(b.storage.writes, 1);
    assert_eq!(&b.storage.bytes[0..4], &[0x8A, 0x2F, 0x90, 0x12]);
    assert_eq!(
        b.count(|e| matches!(e, AppEvent::BaselineSaved(_))),
        1
    );

    // Reboot on the same storage.
    let storage = std::mem::replace(&mut b.storage, MockStorage::erased());
    let rebooted = Bench::with_storage(
        NodeConfig::default(),
        MockSensors::new(),
        MockTransport::connected(),
        storage,
    );
    let stored = Baseline {
        tvoc: 0x8A2F,
        eco2: 0x9012,
    };
    assert_eq!(rebooted.sensors.baselines_set, vec![stored]);
    assert_eq!(
        rebooted.sink.events[0],
        AppEvent::Started {
            baseline: Some(stored)
        }
    );
}

#[test]
fn baseline_fetch_failure_skips_report_and_save() {
    let mut sensors = MockSensors::new();
    sensors.baseline = Err(SensorError::Checksum);
    let config = NodeConfig {
        baseline_save_every: 1,
        ..Default::default()
    };
    let mut b = Bench::new(config, sensors, MockTransport::connected());

    b.run_until(60_000);
    assert!(b.transport.calls.is_empty());
    assert_eq!(b.storage.writes, 0);
    assert_eq!(b.count(|e| *e == AppEvent::BaselineFetchFailed), 1);
    assert_eq!(b.svc.intervals_closed(), 1);
    // The interval's samples are gone either way.
    assert_eq!(b.svc.buffer().len(), 1);

    b.sensors.baseline = Ok(Baseline {
        tvoc: 0x8A2F,
        eco2: 0x9012,
    });
    b.run_until(120_000);
    assert_eq!(b.transport.payloads().len(), 1);
    assert_eq!(b.storage.writes, 1);
}
