use log::debug;

use crate::error::{DecodeError, Result};
use crate::types::{ChannelDescriptor, Recording};
use crate::utils::{format_number_field, write_text_field};
use crate::{EDF_HEADER_BYTES, EDF_MAX_CHANNELS, EDF_SIGNAL_HEADER_BYTES};

/// Builds an EDF byte buffer in the layout [`Decoder`](crate::Decoder) reads
///
/// Samples are supplied as raw 16-bit digital values, one full-length array
/// per channel (`samples_per_record × record_count`). The data records are
/// interleaved channel-major when the buffer is produced.
///
/// # Default Values
///
/// - Version `0`, patient and recording ids `X`
/// - Start `01.01.85` / `00.00.00`
/// - Data record duration: 1 second, no data records
///
/// # Examples
///
/// ```rust
/// use edfview::{decode, ChannelDescriptor, EdfEncoder};
///
/// let mut encoder = EdfEncoder::new();
/// encoder.set_patient_id("P001 M 01-JAN-1990 Test");
/// encoder.set_record_count(2);
/// encoder.add_channel(ChannelDescriptor {
///     label: "EEG Fp1".to_string(),
///     transducer_type: "AgAgCl".to_string(),
///     physical_unit: "uV".to_string(),
///     physical_min: -100.0,
///     physical_max: 100.0,
///     digital_min: -32768,
///     digital_max: 32767,
///     prefiltering: "HP:0.1Hz".to_string(),
///     samples_per_record: 3,
/// }, vec![-32768, 0, 32767, 1, 2, 3])?;
///
/// let bytes = encoder.encode()?;
/// let recording = decode(&bytes)?;
/// assert_eq!(recording.channels()[0].samples[0], -100.0);
/// assert_eq!(recording.duration(), 2.0);
/// # Ok::<(), edfview::DecodeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct EdfEncoder {
    version: String,
    patient_id: String,
    recording_id: String,
    start_date: String,
    start_time: String,
    record_duration_seconds: f64,
    record_count: usize,
    channels: Vec<(ChannelDescriptor, Vec<i16>)>,
}

impl Default for EdfEncoder {
    fn default() -> Self {
        EdfEncoder {
            version: "0".to_string(),
            patient_id: "X".to_string(),
            recording_id: "X".to_string(),
            start_date: "01.01.85".to_string(),
            start_time: "00.00.00".to_string(),
            record_duration_seconds: 1.0,
            record_count: 0,
            channels: Vec::new(),
        }
    }
}

impl EdfEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_patient_id(&mut self, patient_id: &str) -> &mut Self {
        self.patient_id = patient_id.to_string();
        self
    }

    pub fn set_recording_id(&mut self, recording_id: &str) -> &mut Self {
        self.recording_id = recording_id.to_string();
        self
    }

    /// Start date (`dd.mm.yy`) and time (`hh.mm.ss`) text
    pub fn set_start(&mut self, date: &str, time: &str) -> &mut Self {
        self.start_date = date.to_string();
        self.start_time = time.to_string();
        self
    }

    pub fn set_record_duration(&mut self, seconds: f64) -> &mut Self {
        self.record_duration_seconds = seconds;
        self
    }

    pub fn set_record_count(&mut self, records: usize) -> &mut Self {
        self.record_count = records;
        self
    }

    /// Appends a channel with its digital samples for the whole recording
    pub fn add_channel(&mut self, descriptor: ChannelDescriptor, samples: Vec<i16>) -> Result<()> {
        if self.channels.len() >= EDF_MAX_CHANNELS {
            return Err(DecodeError::InvalidDimensions(format!(
                "at most {} signals are supported",
                EDF_MAX_CHANNELS
            )));
        }
        self.channels.push((descriptor, samples));
        Ok(())
    }

    /// Produces the complete byte buffer
    ///
    /// # Errors
    ///
    /// * `DecodeError::InvalidDimensions` - a channel's sample count does not
    ///   match `samples_per_record × record_count`, or a value does not fit
    ///   its fixed-width field
    pub fn encode(&self) -> Result<Vec<u8>> {
        for (i, (descriptor, samples)) in self.channels.iter().enumerate() {
            let expected = descriptor.samples_per_record * self.record_count;
            if samples.len() != expected {
                return Err(DecodeError::InvalidDimensions(format!(
                    "signal {} expected {} samples, got {}",
                    i,
                    expected,
                    samples.len()
                )));
            }
        }

        let ns = self.channels.len();
        let header_size = EDF_HEADER_BYTES + ns * EDF_SIGNAL_HEADER_BYTES;
        let record_samples: usize = self.channels.iter().map(|(d, _)| d.samples_per_record).sum();
        let mut out = vec![b' '; header_size + record_samples * 2 * self.record_count];

        // 主头部 (256字节)
        let main_header = &mut out[..EDF_HEADER_BYTES];
        put_text(&mut main_header[0..8], &self.version, "version")?;
        put_text(&mut main_header[8..88], &self.patient_id, "patient id")?;
        put_text(&mut main_header[88..168], &self.recording_id, "recording id")?;
        put_text(&mut main_header[168..176], &self.start_date, "start date")?;
        put_text(&mut main_header[176..184], &self.start_time, "start time")?;
        put_text(&mut main_header[184..192], &header_size.to_string(), "header size")?;
        put_text(&mut main_header[236..244], &self.record_count.to_string(), "number of data records")?;
        put_number(&mut main_header[244..252], self.record_duration_seconds, "record duration")?;
        put_text(&mut main_header[252..256], &ns.to_string(), "number of signals")?;

        // 信号头部：字段优先排列
        let signal_header = &mut out[EDF_HEADER_BYTES..header_size];
        for (i, (d, _)) in self.channels.iter().enumerate() {
            let slot = |block: usize, width: usize| {
                let start = ns * block + i * width;
                start..start + width
            };
            put_text(&mut signal_header[slot(0, 16)], &d.label, "label")?;
            put_text(&mut signal_header[slot(16, 80)], &d.transducer_type, "transducer type")?;
            put_text(&mut signal_header[slot(96, 8)], &d.physical_unit, "physical dimension")?;
            put_number(&mut signal_header[slot(104, 8)], d.physical_min, "physical minimum")?;
            put_number(&mut signal_header[slot(112, 8)], d.physical_max, "physical maximum")?;
            put_text(&mut signal_header[slot(120, 8)], &d.digital_min.to_string(), "digital minimum")?;
            put_text(&mut signal_header[slot(128, 8)], &d.digital_max.to_string(), "digital maximum")?;
            put_text(&mut signal_header[slot(136, 80)], &d.prefiltering, "prefiltering")?;
            put_text(
                &mut signal_header[slot(216, 8)],
                &d.samples_per_record.to_string(),
                "samples per record",
            )?;
        }

        // 数据记录：每条记录内按通道顺序写入 16 位小端样本
        let mut offset = header_size;
        for record in 0..self.record_count {
            for (descriptor, samples) in &self.channels {
                let n = descriptor.samples_per_record;
                for &sample in &samples[record * n..(record + 1) * n] {
                    out[offset..offset + 2].copy_from_slice(&sample.to_le_bytes());
                    offset += 2;
                }
            }
        }

        debug!(
            "Encoded {} signals, {} records, {} bytes",
            ns,
            self.record_count,
            out.len()
        );
        Ok(out)
    }
}

/// Re-encodes a decoded recording, mapping physical samples back to digital
pub fn encode_recording(recording: &Recording) -> Result<Vec<u8>> {
    let header = recording.header();
    let mut encoder = EdfEncoder::new();
    encoder
        .set_patient_id(&header.patient_id)
        .set_recording_id(&header.recording_id)
        .set_start(&header.start_date, &header.start_time)
        .set_record_duration(header.record_duration_seconds)
        .set_record_count(header.record_count);
    encoder.version = header.version.clone();

    for channel in recording.channels() {
        let descriptor = &channel.descriptor;
        let digital = channel
            .samples
            .iter()
            .map(|&v| descriptor.to_digital(v) as i16)
            .collect();
        encoder.add_channel(descriptor.clone(), digital)?;
    }

    encoder.encode()
}

fn put_text(slot: &mut [u8], text: &str, what: &str) -> Result<()> {
    if write_text_field(slot, text) {
        Ok(())
    } else {
        Err(DecodeError::InvalidDimensions(format!(
            "{} {:?} does not fit in {} bytes",
            what,
            text,
            slot.len()
        )))
    }
}

fn put_number(slot: &mut [u8], value: f64, what: &str) -> Result<()> {
    let text = format_number_field(value, slot.len()).ok_or_else(|| {
        DecodeError::InvalidDimensions(format!("{} {} does not fit in {} bytes", what, value, slot.len()))
    })?;
    put_text(slot, &text, what)
}
