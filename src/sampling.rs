//! Per-interval sample buffer and the averaging rule.
//!
//! One row per [`Channel`], one slot per sampling cycle.  A slot holds
//! `None` both when nothing was recorded and when the read failed, so
//! failed reads never count as zero-valued samples.
//!
//! Averaging per channel: sum the present slots and count them.  A zero
//! sum reports 0 (this also covers an empty row); otherwise the result
//! is `sum / count` with integer truncation.

use log::warn;

/// Slots per channel.  Must cover `interval_ms / sample_period_ms`.
pub const SAMPLE_DEPTH: usize = 30;

/// Measured quantity.  Discriminants index the buffer rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channel {
    /// CO2 concentration (ppm).
    Co2 = 0,
    /// Air temperature (°C).
    Temperature = 1,
    /// Relative humidity (%RH).
    Humidity = 2,
    /// Total volatile organic compounds (ppb).
    Tvoc = 3,
}

impl Channel {
    pub const COUNT: usize = 4;
    pub const ALL: [Channel; Channel::COUNT] =
        [Self::Co2, Self::Temperature, Self::Humidity, Self::Tvoc];

    /// Whether `value` is physically plausible for this channel.
    ///
    /// Temperature and humidity bounds are exclusive: a BME280 that
    /// reports exactly -50 °C or 1 %RH is almost always a dead bus.
    pub fn accepts(self, value: i32) -> bool {
        match self {
            Self::Co2 => (0..=40_000).contains(&value),
            Self::Temperature => value > -50 && value < 70,
            Self::Humidity => value > 1 && value < 100,
            Self::Tvoc => (0..=60_000).contains(&value),
        }
    }
}

/// One cycle's readings.  `None` = missing (not read, or read failed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sample {
    pub co2: Option<i32>,
    pub temperature: Option<i32>,
    pub humidity: Option<i32>,
    pub tvoc: Option<i32>,
}

impl Sample {
    pub fn get(&self, channel: Channel) -> Option<i32> {
        match channel {
            Channel::Co2 => self.co2,
            Channel::Temperature => self.temperature,
            Channel::Humidity => self.humidity,
            Channel::Tvoc => self.tvoc,
        }
    }
}

/// Interval averages, one integer per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Averages {
    pub co2: i32,
    pub temperature: i32,
    pub humidity: i32,
    pub tvoc: i32,
}

impl Averages {
    fn set(&mut self, channel: Channel, value: i32) {
        match channel {
            Channel::Co2 => self.co2 = value,
            Channel::Temperature => self.temperature = value,
            Channel::Humidity => self.humidity = value,
            Channel::Tvoc => self.tvoc = value,
        }
    }
}

/// Fixed-capacity 4×[`SAMPLE_DEPTH`] matrix of optional readings.
pub struct SampleBuffer {
    slots: [[Option<i32>; SAMPLE_DEPTH]; Channel::COUNT],
    /// Next slot per row.  Advances on every `record`, even past the end.
    cursor: [usize; Channel::COUNT],
    overflow_logged: bool,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self {
            slots: [[None; SAMPLE_DEPTH]; Channel::COUNT],
            cursor: [0; Channel::COUNT],
            overflow_logged: false,
        }
    }

    /// Write `value` into the channel's next slot.
    ///
    /// Returns `false` when the row is already full: the cycle is counted
    /// but its reading is discarded.
    pub fn record(&mut self, channel: Channel, value: Option<i32>) -> bool {
        let row = channel as usize;
        let idx = self.cursor[row];
        self.cursor[row] = idx.saturating_add(1);
        if idx >= SAMPLE_DEPTH {
            if !self.overflow_logged {
                warn!(
                    "SampleBuffer: more than {} cycles this interval, extra readings dropped",
                    SAMPLE_DEPTH
                );
                self.overflow_logged = true;
            }
            return false;
        }
        self.slots[row][idx] = value;
        true
    }

    /// Record every channel of one cycle.
    pub fn push(&mut self, sample: &Sample) {
        for channel in Channel::ALL {
            self.record(channel, sample.get(channel));
        }
    }

    /// Cycles recorded so far this interval (capped at the depth).
    pub fn len(&self) -> usize {
        self.cursor[0].min(SAMPLE_DEPTH)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Present readings in a channel's row.
    pub fn valid_count(&self, channel: Channel) -> usize {
        self.slots[channel as usize].iter().flatten().count()
    }

    /// Reduce every row to its average, then clear the buffer for the
    /// next interval.
    pub fn compute_averages(&mut self) -> Averages {
        let mut out = Averages::default();
        for channel in Channel::ALL {
            out.set(channel, average_row(&self.slots[channel as usize]));
        }
        self.reset();
        out
    }

    /// Return every slot to missing and rewind the cursors.
    pub fn reset(&mut self) {
        self.slots = [[None; SAMPLE_DEPTH]; Channel::COUNT];
        self.cursor = [0; Channel::COUNT];
        self.overflow_logged = false;
    }
}

/// Average of the present entries; 0 when they sum to zero.
pub fn average_row(row: &[Option<i32>]) -> i32 {
    let (sum, count) = row
        .iter()
        .flatten()
        .fold((0_i64, 0_i64), |(s, n), &v| (s + i64::from(v), n + 1));
    if sum == 0 {
        return 0;
    }
    (sum / count) as i32
}
