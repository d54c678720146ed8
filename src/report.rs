//! Interval report encoding and the non-blocking publisher.
//!
//! Wire format, published to the configured topic:
//!
//! ```text
//!   {"t":<temperature>,"h":<humidity>,"c":<co2>,"v":<tvoc>}
//! ```
//!
//! The publisher never waits.  Reports that find the transport down are
//! queued, oldest first, and a reconnect is attempted every
//! `reconnect_delay_ms` from [`ReportPublisher::poll`] until the session
//! comes back, for as long as it takes.  Once connected, the whole queue
//! is flushed in order and each send is attempted exactly once.  When the
//! queue is full the oldest report gives way to the newest.

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::TransportPort;
use crate::error::{CommsError, PayloadError};
use crate::sampling::Averages;

/// Reports held while the transport is down.
pub const QUEUE_DEPTH: usize = 8;

/// One interval's averaged readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    #[serde(rename = "t")]
    pub temperature: i32,
    #[serde(rename = "h")]
    pub humidity: i32,
    #[serde(rename = "c")]
    pub co2: i32,
    #[serde(rename = "v")]
    pub tvoc: i32,
}

impl From<Averages> for Report {
    fn from(a: Averages) -> Self {
        Self {
            temperature: a.temperature,
            humidity: a.humidity,
            co2: a.co2,
            tvoc: a.tvoc,
        }
    }
}

impl Report {
    /// Encode as compact JSON.  A result longer than `limit` is refused
    /// whole; it is never cut short.
    pub fn encode(&self, limit: usize) -> Result<Vec<u8>, PayloadError> {
        let bytes = serde_json::to_vec(self).map_err(|_| PayloadError::Encode)?;
        if bytes.len() > limit {
            return Err(PayloadError::Overflow {
                needed: bytes.len(),
                limit,
            });
        }
        Ok(bytes)
    }
}

/// Why a report never reached the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Encoding exceeded the payload bound.
    Payload(PayloadError),
    /// Connected, but the send itself failed.
    Comms(CommsError),
    /// Pushed out of a full queue by a newer report.
    Superseded,
}

impl core::fmt::Display for DropReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Payload(e) => write!(f, "{e}"),
            Self::Comms(e) => write!(f, "{e}"),
            Self::Superseded => write!(f, "evicted from a full queue by a newer report"),
        }
    }
}

/// Result of a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Sent(Report),
    /// Transport down and reconnect failed; will retry from `poll`.
    Deferred(Report),
    Dropped(Report, DropReason),
}

/// Outcomes of one `publish` or `poll` call, in the order they happened.
/// Room for a full flush plus one eviction.
pub type Outcomes = heapless::Vec<PublishOutcome, { QUEUE_DEPTH + 1 }>;

struct Pending {
    report: Report,
    payload: Vec<u8>,
}

pub struct ReportPublisher {
    topic: heapless::String<32>,
    payload_limit: usize,
    reconnect_delay_ms: u64,
    queue: heapless::Deque<Pending, QUEUE_DEPTH>,
    retry_at_ms: u64,
}

impl ReportPublisher {
    pub fn new(topic: heapless::String<32>, payload_limit: usize, reconnect_delay_ms: u32) -> Self {
        Self {
            topic,
            payload_limit,
            reconnect_delay_ms: u64::from(reconnect_delay_ms),
            queue: heapless::Deque::new(),
            retry_at_ms: 0,
        }
    }

    /// At least one report is waiting for the transport to come back.
    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Encode `report`, queue it behind any earlier ones and try to send.
    ///
    /// While a reconnect is pending the report only joins the queue; the
    /// next attempt stays on the `poll` cadence.
    pub fn publish(
        &mut self,
        report: Report,
        now_ms: u64,
        transport: &mut impl TransportPort,
    ) -> Outcomes {
        let mut out = Outcomes::new();
        let payload = match report.encode(self.payload_limit) {
            Ok(p) => p,
            Err(e) => {
                warn!("Publish: refusing report ({})", e);
                record(&mut out, PublishOutcome::Dropped(report, DropReason::Payload(e)));
                return out;
            }
        };

        if self.queue.is_full() {
            if let Some(oldest) = self.queue.pop_front() {
                warn!("Publish: queue full, dropping oldest report");
                record(&mut out, PublishOutcome::Dropped(oldest.report, DropReason::Superseded));
            }
        }
        let waiting = !self.queue.is_empty();
        if let Err(rejected) = self.queue.push_back(Pending { report, payload }) {
            record(&mut out, PublishOutcome::Dropped(rejected.report, DropReason::Superseded));
            return out;
        }

        if waiting && now_ms < self.retry_at_ms {
            info!("Publish: queued behind {} report(s)", self.queue.len() - 1);
            record(&mut out, PublishOutcome::Deferred(report));
            return out;
        }
        self.flush(now_ms, transport, &mut out);
        out
    }

    /// Retry the queue once its reconnect delay has passed.
    pub fn poll(&mut self, now_ms: u64, transport: &mut impl TransportPort) -> Outcomes {
        let mut out = Outcomes::new();
        if !self.queue.is_empty() && self.retry_at_ms <= now_ms {
            self.flush(now_ms, transport, &mut out);
        }
        out
    }

    fn flush(&mut self, now_ms: u64, transport: &mut impl TransportPort, out: &mut Outcomes) {
        if !transport.is_connected() {
            info!("Publish: transport down, reconnecting");
            if let Err(e) = transport.connect() {
                warn!(
                    "Publish: reconnect failed ({}), retrying in {} ms",
                    e, self.reconnect_delay_ms
                );
                self.retry_at_ms = now_ms + self.reconnect_delay_ms;
                if let Some(head) = self.queue.front() {
                    record(out, PublishOutcome::Deferred(head.report));
                }
                return;
            }
            info!("Publish: reconnected");
        }

        while let Some(pending) = self.queue.pop_front() {
            let report = pending.report;
            match transport.publish(&self.topic, &pending.payload) {
                Ok(()) => {
                    info!(
                        "Publish: sent t={} h={} c={} v={}",
                        report.temperature, report.humidity, report.co2, report.tvoc
                    );
                    record(out, PublishOutcome::Sent(report));
                }
                Err(e) => {
                    warn!("Publish: send failed ({}), report dropped", e);
                    record(out, PublishOutcome::Dropped(report, DropReason::Comms(e)));
                    // Whatever is left waits for the next retry.
                    self.retry_at_ms = now_ms + self.reconnect_delay_ms;
                    return;
                }
            }
        }
    }
}

fn record(out: &mut Outcomes, outcome: PublishOutcome) {
    if out.push(outcome).is_err() {
        warn!("Publish: outcome list full, {:?} not reported", outcome);
    }
}
