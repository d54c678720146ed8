//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { baseline } => match baseline {
                Some(b) => info!(
                    "START | baseline restored tvoc=0x{:04X} eco2=0x{:04X}",
                    b.tvoc, b.eco2
                ),
                None => info!("START | no stored baseline"),
            },
            AppEvent::SampleTaken {
                sample,
                compensation,
            } => {
                debug!(
                    "SAMPLE | co2={:?} t={:?} h={:?} tvoc={:?} | ah={}mg/m3",
                    sample.co2, sample.temperature, sample.humidity, sample.tvoc, compensation
                );
            }
            AppEvent::ReportPublished(r) => {
                info!(
                    "REPORT | sent | t={}\u{00b0}C h={}% co2={}ppm tvoc={}ppb",
                    r.temperature, r.humidity, r.co2, r.tvoc
                );
            }
            AppEvent::ReportDeferred(r) => {
                info!(
                    "REPORT | waiting for reconnect | t={} h={} co2={} tvoc={}",
                    r.temperature, r.humidity, r.co2, r.tvoc
                );
            }
            AppEvent::ReportDropped { report, reason } => {
                warn!(
                    "REPORT | dropped ({}) | t={} h={} co2={} tvoc={}",
                    reason, report.temperature, report.humidity, report.co2, report.tvoc
                );
            }
            AppEvent::BaselineFetchFailed => {
                warn!("BASELINE | fetch failed, interval skipped");
            }
            AppEvent::BaselineSaved(b) => {
                info!("BASELINE | saved tvoc=0x{:04X} eco2=0x{:04X}", b.tvoc, b.eco2);
            }
            AppEvent::RecalibrationChanged { from, to } => {
                info!("RECAL | {:?} -> {:?}", from, to);
            }
        }
    }
}
