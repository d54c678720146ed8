//! Integration tests for report delivery: reconnect cadence, deferral,
//! in-order delivery after an outage and the payload bound.

use crate::mock_hw::{Bench, MockSensors, MockTransport, TransportCall};

use aqnode::app::events::AppEvent;
use aqnode::config::NodeConfig;
use aqnode::error::{CommsError, PayloadError};
use aqnode::report::DropReason;

const REPORT: &str = r#"{"t":22,"h":48,"c":410,"v":130}"#;

fn bench(transport: MockTransport) -> Bench {
    Bench::new(NodeConfig::default(), MockSensors::new(), transport)
}

#[test]
fn reconnects_before_publishing() {
    let mut b = bench(MockTransport {
        connected: false,
        ..MockTransport::connected()
    });
    b.run_until(60_000);
    assert_eq!(
        b.transport.calls,
        vec![
            TransportCall::Connect,
            TransportCall::Publish {
                topic: "outTopic".into(),
                payload: REPORT.into(),
            },
        ]
    );
    assert_eq!(b.count(|e| matches!(e, AppEvent::ReportPublished(_))), 1);
}

#[test]
fn deferred_report_goes_out_after_reconnect_delay() {
    let mut b = bench(MockTransport::offline());
    b.run_until(60_000);
    assert_eq!(b.transport.calls, vec![TransportCall::Connect]);
    assert!(b.svc.has_pending_report());
    assert_eq!(b.count(|e| matches!(e, AppEvent::ReportDeferred(_))), 1);

    // Next attempt is due at 62 000.
    b.run_until(61_950);
    assert_eq!(b.transport.connect_attempts(), 1);

    b.transport.accept_connect = true;
    b.run_until(62_000);
    assert_eq!(b.transport.connect_attempts(), 2);
    assert_eq!(b.transport.payloads(), vec![REPORT]);
    assert!(!b.svc.has_pending_report());
}

#[test]
fn retries_every_reconnect_delay() {
    let mut b = bench(MockTransport::offline());
    b.run_until(70_000);
    // 60 000, 62 000, … 70 000
    assert_eq!(b.transport.connect_attempts(), 6);
    assert!(b.transport.payloads().is_empty());
}

#[test]
fn sampling_is_not_held_up_by_a_dead_link() {
    let mut b = bench(MockTransport::offline());
    b.run_until(119_950);
    assert_eq!(b.svc.buffer().len(), 30);
}

#[test]
fn reports_held_through_outage_arrive_in_order() {
    let mut sensors = MockSensors::new();
    sensors.co2_script = (0..29).map(|_| Ok(500.0)).collect();
    let mut b = Bench::new(NodeConfig::default(), sensors, MockTransport::offline());

    b.run_until(149_950);
    assert!(b.transport.payloads().is_empty());
    assert_eq!(b.count(|e| matches!(e, AppEvent::ReportDropped { .. })), 0);

    b.transport.accept_connect = true;
    b.run_until(180_000);
    assert_eq!(
        b.transport.payloads(),
        vec![r#"{"t":22,"h":48,"c":500,"v":130}"#, REPORT, REPORT]
    );
    assert_eq!(b.count(|e| matches!(e, AppEvent::ReportPublished(_))), 3);
    assert!(!b.svc.has_pending_report());
}

#[test]
fn one_reconnect_attempt_per_tick() {
    let mut b = bench(MockTransport::offline());
    b.run_until(119_950);
    let before = b.transport.connect_attempts();

    // Retry and interval boundary fall on the same tick.
    b.run_until(120_000);
    assert_eq!(b.transport.connect_attempts(), before + 1);
    // 60 000, 62 000, … 120 000
    assert_eq!(b.transport.connect_attempts(), 31);
}

#[test]
fn send_failure_after_connect_is_not_retried() {
    let mut b = bench(MockTransport {
        fail_publish: true,
        ..MockTransport::connected()
    });
    b.run_until(70_000);
    assert_eq!(b.transport.payloads().len(), 1);
    assert_eq!(
        b.count(|e| matches!(
            e,
            AppEvent::ReportDropped {
                reason: DropReason::Comms(CommsError::MqttPublishFailed),
                ..
            }
        )),
        1
    );
    assert!(!b.svc.has_pending_report());
}

#[test]
fn oversized_report_is_refused() {
    let config = NodeConfig {
        payload_limit: 16,
        ..Default::default()
    };
    let mut b = Bench::new(config, MockSensors::new(), MockTransport::connected());
    b.run_until(60_000);
    assert!(b.transport.calls.is_empty());
    assert_eq!(
        b.count(|e| matches!(
            e,
            AppEvent::ReportDropped {
                reason: DropReason::Payload(PayloadError::Overflow {
                    needed: 31,
                    limit: 16
                }),
                ..
            }
        )),
        1
    );
}
