use std::fmt;

use chrono::NaiveDateTime;

use crate::error::{DecodeError, Result};
use crate::utils::parse_start_datetime;

/// Fixed header of an EDF recording
///
/// All text fields are stored trimmed. `start_date` and `start_time` are kept
/// as text; use [`Recording::start_datetime`] for a parsed timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingHeader {
    pub version: String,
    pub patient_id: String,
    pub recording_id: String,
    pub start_date: String,
    pub start_time: String,
    /// 数据记录区的起始字节偏移
    pub header_byte_count: usize,
    pub record_count: usize,
    pub record_duration_seconds: f64,
    pub channel_count: usize,
}

impl RecordingHeader {
    /// Total duration in seconds (`record_count × record_duration_seconds`)
    pub fn duration(&self) -> f64 {
        self.record_count as f64 * self.record_duration_seconds
    }
}

/// Per-signal metadata as declared in the header
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDescriptor {
    pub label: String,
    pub transducer_type: String,
    pub physical_unit: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefiltering: String,
    pub samples_per_record: usize,
}

impl ChannelDescriptor {
    /// Converts a raw digital value into its physical value
    ///
    /// `physical = (digital - digital_min) * (physical_max - physical_min)
    ///             / (digital_max - digital_min) + physical_min`
    ///
    /// ```rust
    /// use edfview::ChannelDescriptor;
    ///
    /// let channel = ChannelDescriptor {
    ///     label: "EEG Fp1".to_string(),
    ///     transducer_type: String::new(),
    ///     physical_unit: "uV".to_string(),
    ///     physical_min: -100.0,
    ///     physical_max: 100.0,
    ///     digital_min: -32768,
    ///     digital_max: 32767,
    ///     prefiltering: String::new(),
    ///     samples_per_record: 256,
    /// };
    ///
    /// assert_eq!(channel.to_physical(-32768), -100.0);
    /// assert_eq!(channel.to_physical(32767), 100.0);
    /// assert!((channel.to_physical(16384) - 50.0).abs() < 0.01);
    /// ```
    pub fn to_physical(&self, digital_value: i32) -> f64 {
        // 端点精确映射，避免乘除舍入误差
        if digital_value == self.digital_max {
            return self.physical_max;
        }
        (digital_value as f64 - self.digital_min as f64) * (self.physical_max - self.physical_min)
            / (self.digital_max as f64 - self.digital_min as f64)
            + self.physical_min
    }

    /// Inverse of [`to_physical`](Self::to_physical), rounded and saturated
    /// to the declared digital range
    pub fn to_digital(&self, physical_value: f64) -> i32 {
        let digital = (physical_value - self.physical_min) / self.bit_value()
            + self.digital_min as f64;
        let (lo, hi) = if self.digital_min <= self.digital_max {
            (self.digital_min, self.digital_max)
        } else {
            (self.digital_max, self.digital_min)
        };
        (digital.round() as i32).clamp(lo, hi)
    }

    /// 物理值/数字值比例
    pub fn bit_value(&self) -> f64 {
        (self.physical_max - self.physical_min)
            / (self.digital_max as f64 - self.digital_min as f64)
    }

    /// Effective sampling rate in Hz for the given record duration
    ///
    /// Returns 0 when the record duration is not positive.
    pub fn sampling_rate(&self, record_duration_seconds: f64) -> f64 {
        if record_duration_seconds > 0.0 {
            self.samples_per_record as f64 / record_duration_seconds
        } else {
            0.0
        }
    }

    /// Label used for display, falling back to `Channel {n}` (1-based)
    pub fn display_label(&self, index: usize) -> String {
        if self.label.is_empty() {
            format!("Channel {}", index + 1)
        } else {
            self.label.clone()
        }
    }
}

/// One decoded signal: its descriptor and its physical samples
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub descriptor: ChannelDescriptor,
    pub samples: Vec<f64>,
}

impl Channel {
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// A fully decoded EDF recording
///
/// Immutable once built. Every channel holds exactly
/// `samples_per_record × record_count` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    header: RecordingHeader,
    channels: Vec<Channel>,
}

impl Recording {
    /// Assembles a recording, checking the per-channel length invariant
    ///
    /// # Errors
    ///
    /// * `DecodeError::InvalidDimensions` - channel count or a sample array
    ///   length disagrees with the header
    pub fn from_parts(header: RecordingHeader, channels: Vec<Channel>) -> Result<Self> {
        if channels.len() != header.channel_count {
            return Err(DecodeError::InvalidDimensions(format!(
                "header declares {} signals, got {}",
                header.channel_count,
                channels.len()
            )));
        }

        for (i, channel) in channels.iter().enumerate() {
            let expected = channel.descriptor.samples_per_record * header.record_count;
            if channel.samples.len() != expected {
                return Err(DecodeError::InvalidDimensions(format!(
                    "signal {} holds {} samples, expected {}",
                    i,
                    channel.samples.len(),
                    expected
                )));
            }
        }

        Ok(Recording { header, channels })
    }

    pub fn header(&self) -> &RecordingHeader {
        &self.header
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn duration(&self) -> f64 {
        self.header.duration()
    }

    /// Effective sampling rate of a channel in Hz, or `None` for a bad index
    pub fn sampling_rate(&self, index: usize) -> Option<f64> {
        self.channels
            .get(index)
            .map(|c| c.descriptor.sampling_rate(self.header.record_duration_seconds))
    }

    /// Parsed start date and time, if the header text is a valid
    /// `dd.mm.yy` / `hh.mm.ss` pair
    pub fn start_datetime(&self) -> Option<NaiveDateTime> {
        parse_start_datetime(&self.header.start_date, &self.header.start_time)
    }
}

impl fmt::Display for Recording {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_na = |s: &str| if s.is_empty() { "N/A".to_string() } else { s.to_string() };

        writeln!(f, "Patient ID: {}", or_na(&self.header.patient_id))?;
        writeln!(f, "Recording ID: {}", or_na(&self.header.recording_id))?;
        writeln!(f, "Start Date: {} {}", self.header.start_date, self.header.start_time)?;
        writeln!(f, "Duration: {:.2} seconds", self.duration())?;
        writeln!(f, "Number of Channels: {}", self.channels.len())?;

        let labels: Vec<&str> = self.channels.iter().map(|c| c.descriptor.label.as_str()).collect();
        writeln!(f, "Channels: {}", labels.join(", "))?;

        let rates: Vec<String> = (0..self.channels.len())
            .filter_map(|i| self.sampling_rate(i))
            .map(|r| format!("{:.1} Hz", r))
            .collect();
        write!(f, "Sampling Rates: {}", rates.join(", "))
    }
}
