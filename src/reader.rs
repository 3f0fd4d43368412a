use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::error::{DecodeError, Field, RangeKind, Result};
use crate::types::{Channel, ChannelDescriptor, Recording, RecordingHeader};
use crate::utils::{decode_text_field, parse_float_field, parse_int_field};
use crate::{EDF_HEADER_BYTES, EDF_MAX_CHANNELS, EDF_SIGNAL_HEADER_BYTES};

// 信号头部各字段的每通道偏移（字段优先排列，偏移乘以通道数即为块起点）
const LABEL: (usize, usize) = (0, 16);
const TRANSDUCER: (usize, usize) = (16, 80);
const PHYSICAL_UNIT: (usize, usize) = (96, 8);
const PHYSICAL_MIN: (usize, usize) = (104, 8);
const PHYSICAL_MAX: (usize, usize) = (112, 8);
const DIGITAL_MIN: (usize, usize) = (120, 8);
const DIGITAL_MAX: (usize, usize) = (128, 8);
const PREFILTER: (usize, usize) = (136, 80);
const SAMPLES_PER_RECORD: (usize, usize) = (216, 8);

/// Shared flag used to abandon an in-flight decode
///
/// Clones observe the same flag. A cancelled decode returns
/// [`DecodeError::Cancelled`] and never hands out a partial recording.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// EDF decoder turning an in-memory byte buffer into a [`Recording`]
///
/// The decoder performs no I/O. It validates the whole layout before it
/// touches the data-record region, so a failed decode never yields partially
/// populated channels.
///
/// # Examples
///
/// ```rust
/// use edfview::Decoder;
///
/// # let bytes = edfview::doctest_utils::single_channel_bytes()?;
/// let recording = Decoder::new().decode(&bytes)?;
///
/// for (i, channel) in recording.channels().iter().enumerate() {
///     println!("{}: {} samples at {:.1} Hz",
///         channel.descriptor.label,
///         channel.sample_count(),
///         recording.sampling_rate(i).unwrap_or(0.0));
/// }
/// # Ok::<(), edfview::DecodeError>(())
/// ```
///
/// ## Cancelling a decode
///
/// ```rust
/// use edfview::{CancelToken, DecodeError, Decoder};
///
/// # let bytes = edfview::doctest_utils::single_channel_bytes()?;
/// let token = CancelToken::new();
/// let decoder = Decoder::new().with_cancel_token(token.clone());
///
/// token.cancel();
/// assert!(matches!(decoder.decode(&bytes), Err(DecodeError::Cancelled)));
/// # Ok::<(), edfview::DecodeError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    cancel: Option<CancelToken>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `token` before every data record
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Decodes a complete EDF byte buffer
    ///
    /// # Errors
    ///
    /// * `DecodeError::MalformedField` - a numeric header field is not a number
    /// * `DecodeError::TruncatedData` - the buffer is shorter than the declared layout
    /// * `DecodeError::DegenerateChannelRange` - a channel's min equals its max
    /// * `DecodeError::InvalidDimensions` - counts or sizes are negative or absurd
    /// * `DecodeError::Cancelled` - the cancel token fired
    pub fn decode(&self, bytes: &[u8]) -> Result<Recording> {
        let header = parse_header(bytes)?;
        let descriptors = parse_signals(bytes, &header)?;

        let expected_bytes = data_region_end(&header, &descriptors)?;
        if bytes.len() < expected_bytes {
            return Err(DecodeError::TruncatedData {
                expected_bytes,
                actual_bytes: bytes.len(),
            });
        }

        debug!(
            "Decoding {} records of {:.3}s across {} signals",
            header.record_count, header.record_duration_seconds, header.channel_count
        );

        let channels = read_records(bytes, &header, descriptors, || self.is_cancelled())?;
        Recording::from_parts(header, channels)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, CancelToken::is_cancelled)
    }
}

/// Reads every data record after the header checks have passed
///
/// `cancelled` is polled once before each record; nothing is returned once
/// it reports true.
fn read_records(
    bytes: &[u8],
    header: &RecordingHeader,
    descriptors: Vec<ChannelDescriptor>,
    mut cancelled: impl FnMut() -> bool,
) -> Result<Vec<Channel>> {
    let mut channels: Vec<Channel> = descriptors
        .into_iter()
        .map(|descriptor| {
            let capacity = descriptor.samples_per_record * header.record_count;
            Channel {
                descriptor,
                samples: Vec::with_capacity(capacity),
            }
        })
        .collect();

    let mut offset = header.header_byte_count;
    for record in 0..header.record_count {
        if cancelled() {
            warn!("Decode cancelled at record {} of {}", record, header.record_count);
            return Err(DecodeError::Cancelled);
        }

        for channel in channels.iter_mut() {
            let len = channel.descriptor.samples_per_record * 2;
            let block = &bytes[offset..offset + len];
            let descriptor = &channel.descriptor;
            channel.samples.extend(
                block
                    .chunks_exact(2)
                    .map(|b| descriptor.to_physical(i16::from_le_bytes([b[0], b[1]]) as i32)),
            );
            offset += len;
        }
    }

    Ok(channels)
}

/// Decodes `bytes` with a default [`Decoder`]
pub fn decode(bytes: &[u8]) -> Result<Recording> {
    Decoder::new().decode(bytes)
}

/// Reads a whole file into memory and decodes it
///
/// # Errors
///
/// * `DecodeError::FileNotFound` - the file does not exist
/// * `DecodeError::Io` - any other read failure
/// * any error from [`Decoder::decode`]
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Recording> {
    let bytes = fs::read(&path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            DecodeError::FileNotFound(format!("{}: {}", path.as_ref().display(), e))
        }
        _ => DecodeError::Io(e),
    })?;
    decode(&bytes)
}

/// A decode running on a worker thread
///
/// The recording is published once, as an `Arc`, when [`join`](Self::join)
/// returns. Cancelling drops every partial buffer on the worker side.
///
/// ```rust
/// use edfview::DecodeTask;
///
/// # let bytes = edfview::doctest_utils::single_channel_bytes()?;
/// let task = DecodeTask::spawn(bytes);
/// let recording = task.join()?;
/// assert_eq!(recording.channels().len(), 1);
/// # Ok::<(), edfview::DecodeError>(())
/// ```
#[derive(Debug)]
pub struct DecodeTask {
    cancel: CancelToken,
    handle: JoinHandle<Result<Recording>>,
}

impl DecodeTask {
    pub fn spawn(bytes: Vec<u8>) -> Self {
        let cancel = CancelToken::new();
        let decoder = Decoder::new().with_cancel_token(cancel.clone());
        let handle = thread::spawn(move || decoder.decode(&bytes));
        DecodeTask { cancel, handle }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker and hands over the finished recording
    pub fn join(self) -> Result<Arc<Recording>> {
        match self.handle.join() {
            Ok(result) => result.map(Arc::new),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

fn parse_header(bytes: &[u8]) -> Result<RecordingHeader> {
    if bytes.len() < EDF_HEADER_BYTES {
        return Err(DecodeError::TruncatedData {
            expected_bytes: EDF_HEADER_BYTES,
            actual_bytes: bytes.len(),
        });
    }
    let main_header = &bytes[..EDF_HEADER_BYTES];

    let header_bytes = parse_int_field(
        &decode_text_field(&main_header[184..192]),
        Field::HeaderByteCount,
        None,
    )?;
    let records = parse_int_field(&decode_text_field(&main_header[236..244]), Field::RecordCount, None)?;
    let duration = parse_float_field(
        &decode_text_field(&main_header[244..252]),
        Field::RecordDuration,
        None,
    )?;
    let signals = parse_int_field(&decode_text_field(&main_header[252..256]), Field::ChannelCount, None)?;

    if signals < 0 || signals > EDF_MAX_CHANNELS as i64 {
        return Err(DecodeError::InvalidDimensions(format!(
            "number of signals {} outside 0..={}",
            signals, EDF_MAX_CHANNELS
        )));
    }
    if records < 0 {
        return Err(DecodeError::InvalidDimensions(format!(
            "number of data records {} is negative",
            records
        )));
    }
    if duration < 0.0 {
        return Err(DecodeError::InvalidDimensions(format!(
            "data record duration {} is negative",
            duration
        )));
    }

    let channel_count = signals as usize;
    let min_header = EDF_HEADER_BYTES + channel_count * EDF_SIGNAL_HEADER_BYTES;
    if header_bytes < min_header as i64 {
        return Err(DecodeError::InvalidDimensions(format!(
            "header size {} smaller than the {} bytes needed for {} signals",
            header_bytes, min_header, channel_count
        )));
    }

    Ok(RecordingHeader {
        version: decode_text_field(&main_header[0..8]),
        patient_id: decode_text_field(&main_header[8..88]),
        recording_id: decode_text_field(&main_header[88..168]),
        start_date: decode_text_field(&main_header[168..176]),
        start_time: decode_text_field(&main_header[176..184]),
        header_byte_count: usize::try_from(header_bytes).map_err(|_| {
            DecodeError::InvalidDimensions(format!("header size {} too large", header_bytes))
        })?,
        record_count: usize::try_from(records).map_err(|_| {
            DecodeError::InvalidDimensions(format!("number of data records {} too large", records))
        })?,
        record_duration_seconds: duration,
        channel_count,
    })
}

fn parse_signals(bytes: &[u8], header: &RecordingHeader) -> Result<Vec<ChannelDescriptor>> {
    let ns = header.channel_count;
    let end = EDF_HEADER_BYTES + ns * EDF_SIGNAL_HEADER_BYTES;
    if bytes.len() < end {
        return Err(DecodeError::TruncatedData {
            expected_bytes: end,
            actual_bytes: bytes.len(),
        });
    }
    let signal_header = &bytes[EDF_HEADER_BYTES..end];

    // 字段优先：所有标签，然后所有传感器类型，依此类推
    let text = |(block, width): (usize, usize), i: usize| {
        let start = ns * block + i * width;
        decode_text_field(&signal_header[start..start + width])
    };

    let mut descriptors = Vec::with_capacity(ns);
    for i in 0..ns {
        let ch = Some(i);
        let physical_min = parse_float_field(&text(PHYSICAL_MIN, i), Field::PhysicalMin, ch)?;
        let physical_max = parse_float_field(&text(PHYSICAL_MAX, i), Field::PhysicalMax, ch)?;
        let digital_min = parse_int_field(&text(DIGITAL_MIN, i), Field::DigitalMin, ch)?;
        let digital_max = parse_int_field(&text(DIGITAL_MAX, i), Field::DigitalMax, ch)?;
        let samples_per_record =
            parse_int_field(&text(SAMPLES_PER_RECORD, i), Field::SamplesPerRecord, ch)?;

        let digital_min = to_i16_domain(digital_min, i, "digital minimum")?;
        let digital_max = to_i16_domain(digital_max, i, "digital maximum")?;
        if samples_per_record < 0 {
            return Err(DecodeError::InvalidDimensions(format!(
                "signal {}: negative samples per record {}",
                i, samples_per_record
            )));
        }

        if digital_min == digital_max {
            return Err(DecodeError::DegenerateChannelRange {
                channel: i,
                kind: RangeKind::Digital,
            });
        }
        if physical_min == physical_max {
            return Err(DecodeError::DegenerateChannelRange {
                channel: i,
                kind: RangeKind::Physical,
            });
        }

        descriptors.push(ChannelDescriptor {
            label: text(LABEL, i),
            transducer_type: text(TRANSDUCER, i),
            physical_unit: text(PHYSICAL_UNIT, i),
            physical_min,
            physical_max,
            digital_min,
            digital_max,
            prefiltering: text(PREFILTER, i),
            samples_per_record: samples_per_record as usize,
        });
    }

    Ok(descriptors)
}

fn to_i16_domain(value: i64, channel: usize, what: &str) -> Result<i32> {
    if value < i16::MIN as i64 || value > i16::MAX as i64 {
        return Err(DecodeError::InvalidDimensions(format!(
            "signal {}: {} {} outside the 16-bit range",
            channel, what, value
        )));
    }
    Ok(value as i32)
}

/// `header_byte_count + record_count × Σ samples_per_record × 2`, overflow-checked
fn data_region_end(header: &RecordingHeader, descriptors: &[ChannelDescriptor]) -> Result<usize> {
    let overflow = || DecodeError::InvalidDimensions("data region size overflows".to_string());

    let samples_per_record = descriptors
        .iter()
        .try_fold(0usize, |acc, d| acc.checked_add(d.samples_per_record))
        .ok_or_else(overflow)?;

    samples_per_record
        .checked_mul(2)
        .and_then(|record_size| record_size.checked_mul(header.record_count))
        .and_then(|data| data.checked_add(header.header_byte_count))
        .ok_or_else(overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::EdfEncoder;

    fn descriptor(label: &str, samples_per_record: usize) -> ChannelDescriptor {
        ChannelDescriptor {
            label: label.to_string(),
            transducer_type: "AgAgCl electrodes".to_string(),
            physical_unit: "uV".to_string(),
            physical_min: -100.0,
            physical_max: 100.0,
            digital_min: -32768,
            digital_max: 32767,
            prefiltering: "HP:0.1Hz".to_string(),
            samples_per_record,
        }
    }

    fn two_channel_bytes() -> Vec<u8> {
        let mut encoder = EdfEncoder::new();
        encoder.set_record_count(2);
        encoder
            .add_channel(descriptor("A", 2), vec![1, 2, 3, 4])
            .unwrap();
        encoder
            .add_channel(descriptor("B", 1), vec![-1, -2])
            .unwrap();
        encoder.encode().unwrap()
    }

    #[test]
    fn test_field_major_signal_header() {
        let rec = decode(&two_channel_bytes()).unwrap();
        assert_eq!(rec.channels().len(), 2);
        assert_eq!(rec.channels()[0].descriptor.label, "A");
        assert_eq!(rec.channels()[1].descriptor.label, "B");
        assert_eq!(rec.channels()[1].descriptor.samples_per_record, 1);
    }

    #[test]
    fn test_records_are_interleaved_channel_major() {
        let rec = decode(&two_channel_bytes()).unwrap();
        let a: Vec<i32> = rec.channels()[0]
            .samples
            .iter()
            .map(|&v| rec.channels()[0].descriptor.to_digital(v))
            .collect();
        let b: Vec<i32> = rec.channels()[1]
            .samples
            .iter()
            .map(|&v| rec.channels()[1].descriptor.to_digital(v))
            .collect();
        assert_eq!(a, vec![1, 2, 3, 4]);
        assert_eq!(b, vec![-1, -2]);
    }

    #[test]
    fn test_short_fixed_header_is_truncated() {
        let err = decode(&[b' '; 100]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TruncatedData { expected_bytes: 256, actual_bytes: 100 }
        ));
    }

    #[test]
    fn test_missing_signal_header_is_truncated() {
        let bytes = two_channel_bytes();
        let err = decode(&bytes[..300]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TruncatedData { expected_bytes: 768, actual_bytes: 300 }
        ));
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_cancel_between_records_stops_decode() {
        let mut encoder = EdfEncoder::new();
        encoder.set_record_count(5);
        encoder
            .add_channel(descriptor("A", 3), (0..15).collect())
            .unwrap();
        let bytes = encoder.encode().unwrap();
        let header = parse_header(&bytes).unwrap();
        let descriptors = parse_signals(&bytes, &header).unwrap();

        // 第三条记录之前触发取消
        let mut checks = 0;
        let result = read_records(&bytes, &header, descriptors.clone(), || {
            checks += 1;
            checks == 3
        });
        assert!(matches!(result, Err(DecodeError::Cancelled)));
        assert_eq!(checks, 3);

        let mut checks = 0;
        let channels = read_records(&bytes, &header, descriptors, || {
            checks += 1;
            false
        })
        .unwrap();
        assert_eq!(checks, 5);
        assert_eq!(channels[0].sample_count(), 15);
    }

    #[test]
    fn test_cancel_from_another_thread_during_decode() {
        use std::sync::mpsc;
        use std::thread;

        let mut encoder = EdfEncoder::new();
        encoder.set_record_count(1000);
        encoder
            .add_channel(descriptor("A", 8), vec![7; 8000])
            .unwrap();
        let bytes = encoder.encode().unwrap();
        let header = parse_header(&bytes).unwrap();
        let descriptors = parse_signals(&bytes, &header).unwrap();

        let token = CancelToken::new();
        let remote = token.clone();
        let (started_tx, started_rx) = mpsc::channel();
        let canceller = thread::spawn(move || {
            started_rx.recv().unwrap();
            remote.cancel();
        });

        // 第 10 条记录时通知另一线程取消，然后等待标志生效
        let mut record = 0;
        let result = read_records(&bytes, &header, descriptors, || {
            record += 1;
            if record == 10 {
                started_tx.send(()).unwrap();
                while !token.is_cancelled() {
                    thread::yield_now();
                }
            }
            token.is_cancelled()
        });
        canceller.join().unwrap();

        assert!(matches!(result, Err(DecodeError::Cancelled)));
        assert_eq!(record, 10);
    }

    #[test]
    fn test_cancelled_decode_of_empty_recording_still_succeeds() {
        // 没有数据记录时不会检查取消标志
        let mut encoder = EdfEncoder::new();
        encoder.set_record_count(0);
        let bytes = encoder.encode().unwrap();

        let token = CancelToken::new();
        token.cancel();
        let rec = Decoder::new().with_cancel_token(token).decode(&bytes).unwrap();
        assert_eq!(rec.duration(), 0.0);
    }

    #[test]
    fn test_data_region_overflow_is_invalid_dimensions() {
        let header = RecordingHeader {
            version: "0".to_string(),
            patient_id: String::new(),
            recording_id: String::new(),
            start_date: String::new(),
            start_time: String::new(),
            header_byte_count: 512,
            record_count: usize::MAX / 2,
            record_duration_seconds: 1.0,
            channel_count: 1,
        };
        let err = data_region_end(&header, &[descriptor("X", 4)]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidDimensions(_)));
    }
}
