//! Node service, the hexagonal core.
//!
//! [`NodeService`] owns every piece of mutable device state: the sample
//! buffer, the last valid climate pair, the recalibration machine, the
//! baseline save counter, the queue of unsent reports and the cadence deadlines.
//! It is created once at boot and lives for the life of the device.  All
//! I/O flows through port traits passed in at each call.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!   PanelPort ◀──▶│          NodeService          │
//! StoragePort ◀──▶│ buffer · recal · baseline ·   │──▶ TransportPort
//!                 │ compensation · publisher      │
//!                 └──────────────────────────────┘
//! ```
//!
//! ## Order within one tick
//!
//! 1. Recalibration poll (button debounce, warm-up check, blinks).
//! 2. Retry of reports waiting for the transport.
//! 3. Interval boundary, if due: average, fetch and maybe save the
//!    baseline, publish.
//! 4. Sampling cycle, if due: compensation from the previous valid pair,
//!    then the four reads.

use log::{debug, info, warn};

use crate::baseline::{Baseline, BaselineManager};
use crate::compensation::HumidityCompensator;
use crate::config::NodeConfig;
use crate::error::SensorError;
use crate::recalibration::{RecalState, RecalibrationMachine};
use crate::report::{PublishOutcome, Report, ReportPublisher};
use crate::sampling::{Channel, Sample, SampleBuffer};
use crate::scheduler::CadenceScheduler;

use super::events::AppEvent;
use super::ports::{EventSink, PanelPort, SensorPort, StoragePort, TransportPort};

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService {
    config: NodeConfig,
    buffer: SampleBuffer,
    compensator: HumidityCompensator,
    recal: RecalibrationMachine,
    baseline: BaselineManager,
    publisher: ReportPublisher,
    scheduler: CadenceScheduler,
    /// Last level driven onto the indicator, to avoid rewriting the pin.
    indicator: Option<bool>,
    intervals_closed: u32,
}

impl NodeService {
    /// Construct the service.  `now_ms` anchors the sampling cadence and
    /// the button debounce clock.
    ///
    /// Does **not** touch hardware; call [`start`](Self::start) next.
    pub fn new(config: NodeConfig, now_ms: u64) -> Self {
        let recal = RecalibrationMachine::new(&config, now_ms);
        let baseline = BaselineManager::new(config.baseline_address, config.baseline_save_every);
        let publisher = ReportPublisher::new(
            config.mqtt_topic.clone(),
            config.payload_limit,
            config.reconnect_delay_ms,
        );
        let scheduler = CadenceScheduler::new(config.sample_period_ms, config.interval_ms, now_ms);

        Self {
            config,
            buffer: SampleBuffer::new(),
            compensator: HumidityCompensator::new(),
            recal,
            baseline,
            publisher,
            scheduler,
            indicator: None,
            intervals_closed: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Restore the stored tVOC baseline into the sensor.
    pub fn start(
        &mut self,
        sensors: &mut impl SensorPort,
        storage: &impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let baseline = self.baseline.load(storage);
        if let Some(b) = baseline {
            if let Err(e) = sensors.set_baseline(b) {
                warn!("Baseline: sensor rejected stored baseline ({})", e);
            }
        }
        sink.emit(&AppEvent::Started { baseline });
        info!(
            "NodeService started: sample every {} ms, report every {} ms",
            self.config.sample_period_ms, self.config.interval_ms
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one poll tick.  Never waits; returns within one bus round.
    pub fn tick(
        &mut self,
        now_ms: u64,
        sensors: &mut impl SensorPort,
        transport: &mut impl TransportPort,
        storage: &mut impl StoragePort,
        panel: &mut impl PanelPort,
        sink: &mut impl EventSink,
    ) {
        // 1. Recalibration
        let raw = panel.button_raw();
        let poll = self.recal.poll(raw, now_ms, sensors);
        if self.indicator != Some(poll.indicator) {
            panel.set_indicator(poll.indicator);
            self.indicator = Some(poll.indicator);
        }
        if let Some((from, to)) = poll.transition {
            sink.emit(&AppEvent::RecalibrationChanged { from, to });
        }

        // 2. Queued reports
        for outcome in self.publisher.poll(now_ms, transport) {
            emit_outcome(outcome, sink);
        }

        // 3 + 4. Cadence
        let due = self.scheduler.tick(now_ms);
        if due.interval {
            self.close_interval(now_ms, sensors, transport, storage, sink);
        }
        if due.sample {
            self.sample(sensors, sink);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn recalibration_state(&self) -> RecalState {
        self.recal.state()
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn has_pending_report(&self) -> bool {
        self.publisher.has_pending()
    }

    /// Intervals closed since boot, including skipped ones.
    pub fn intervals_closed(&self) -> u32 {
        self.intervals_closed
    }

    // ── Internal ──────────────────────────────────────────────

    fn sample(&mut self, sensors: &mut impl SensorPort, sink: &mut impl EventSink) {
        // Previous cycle's valid pair; this cycle's reads come after.
        let compensation = self.compensator.compensation_or_unavailable();

        let sample = Sample {
            co2: reading(Channel::Co2, sensors.read_co2()),
            temperature: reading(Channel::Temperature, sensors.read_temperature()),
            humidity: reading(Channel::Humidity, sensors.read_humidity()),
            tvoc: reading(
                Channel::Tvoc,
                sensors.read_tvoc(compensation).map(f32::from),
            ),
        };

        self.buffer.push(&sample);
        self.compensator.observe(&sample);
        debug!(
            "Sample: co2={:?} t={:?} h={:?} tvoc={:?} ah={}",
            sample.co2, sample.temperature, sample.humidity, sample.tvoc, compensation
        );
        sink.emit(&AppEvent::SampleTaken {
            sample,
            compensation,
        });
    }

    fn close_interval(
        &mut self,
        now_ms: u64,
        sensors: &mut impl SensorPort,
        transport: &mut impl TransportPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        self.intervals_closed = self.intervals_closed.wrapping_add(1);
        let averages = self.buffer.compute_averages();
        info!(
            "Interval {}: co2={} t={} h={} tvoc={}",
            self.intervals_closed,
            averages.co2,
            averages.temperature,
            averages.humidity,
            averages.tvoc
        );

        let baseline: Baseline = match sensors.get_baseline() {
            Ok(b) => b,
            Err(e) => {
                warn!("Baseline: fetch failed ({}), skipping report and save", e);
                sink.emit(&AppEvent::BaselineFetchFailed);
                return;
            }
        };

        match self.baseline.maybe_save(baseline, storage) {
            Ok(true) => sink.emit(&AppEvent::BaselineSaved(baseline)),
            Ok(false) => {}
            Err(e) => warn!("Baseline: write failed ({})", e),
        }

        for outcome in self.publisher.publish(Report::from(averages), now_ms, transport) {
            emit_outcome(outcome, sink);
        }
    }
}

/// Convert a raw port reading into a buffer entry.  Failed and
/// implausible reads both become `None`.
fn reading(channel: Channel, raw: Result<f32, SensorError>) -> Option<i32> {
    match raw {
        Ok(v) if v.is_finite() => {
            let value = v as i32;
            if channel.accepts(value) {
                Some(value)
            } else {
                warn!("Sample: {:?} reading {} out of range", channel, v);
                None
            }
        }
        Ok(v) => {
            warn!("Sample: {:?} reading {} not a number", channel, v);
            None
        }
        Err(e) => {
            warn!("Sample: {:?} read failed ({})", channel, e);
            None
        }
    }
}

fn emit_outcome(outcome: PublishOutcome, sink: &mut impl EventSink) {
    let event = match outcome {
        PublishOutcome::Sent(report) => AppEvent::ReportPublished(report),
        PublishOutcome::Deferred(report) => AppEvent::ReportDeferred(report),
        PublishOutcome::Dropped(report, reason) => AppEvent::ReportDropped { report, reason },
    };
    sink.emit(&event);
}
