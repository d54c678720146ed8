//! Outbound application events.
//!
//! The [`NodeService`](super::service::NodeService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use crate::baseline::Baseline;
use crate::recalibration::RecalState;
use crate::report::{DropReason, Report};
use crate::sampling::Sample;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started.  Carries the baseline restored into the
    /// tVOC sensor, if one was stored.
    Started { baseline: Option<Baseline> },

    /// One sampling cycle completed.  `compensation` is the absolute
    /// humidity (mg/m³) that was fed to the tVOC sensor, 0 if none.
    SampleTaken { sample: Sample, compensation: u32 },

    /// An interval closed and its report reached the collector.
    ReportPublished(Report),

    /// The transport is down; the report waits for a reconnect.
    ReportDeferred(Report),

    /// An interval's report was lost.
    ReportDropped { report: Report, reason: DropReason },

    /// The tVOC sensor had no baseline this interval, so neither the
    /// report nor the baseline save ran.
    BaselineFetchFailed,

    /// The baseline was written to persistent storage.
    BaselineSaved(Baseline),

    /// The recalibration state machine changed state.
    RecalibrationChanged { from: RecalState, to: RecalState },
}
