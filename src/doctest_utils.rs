// Internal utilities for documentation tests and integration tests
// Every helper builds an EDF byte buffer in memory

use std::f64::consts::PI;
use std::ops::Range;

use crate::error::Result;
use crate::types::ChannelDescriptor;
use crate::writer::EdfEncoder;

/// Descriptor with the full 16-bit digital range
pub fn eeg_descriptor(label: &str, samples_per_record: usize) -> ChannelDescriptor {
    ChannelDescriptor {
        label: label.to_string(),
        transducer_type: "AgAgCl cup electrodes".to_string(),
        physical_unit: "uV".to_string(),
        physical_min: -200.0,
        physical_max: 200.0,
        digital_min: -32768,
        digital_max: 32767,
        prefiltering: "HP:0.1Hz LP:70Hz".to_string(),
        samples_per_record,
    }
}

/// Digital sine wave of `freq` Hz sampled at `rate` Hz
pub fn sine_digital(count: usize, rate: f64, freq: f64, amplitude: f64) -> Vec<i16> {
    (0..count)
        .map(|i| {
            let t = i as f64 / rate;
            (amplitude * (2.0 * PI * freq * t).sin()).round() as i16
        })
        .collect()
}

/// One EEG channel, 256 Hz, 2 one-second records of a 10 Hz sine
pub fn single_channel_bytes() -> Result<Vec<u8>> {
    let mut encoder = EdfEncoder::new();
    encoder
        .set_patient_id("DOC001 M 01-JAN-1990 Test_Patient")
        .set_recording_id("Startdate 01-JAN-2020 X X X")
        .set_start("01.01.20", "10.00.00")
        .set_record_count(2);

    let samples = sine_digital(512, 256.0, 10.0, 8000.0);
    encoder.add_channel(eeg_descriptor("EEG Fp1", 256), samples)?;
    encoder.encode()
}

/// EEG at 256 Hz plus ECG at 128 Hz, 10 one-second records
pub fn multi_channel_bytes() -> Result<Vec<u8>> {
    let records = 10;
    let mut encoder = EdfEncoder::new();
    encoder
        .set_patient_id("DOC002 F 15-MAR-1985 Multi_Channel")
        .set_start("15.03.21", "08.30.00")
        .set_record_count(records);

    let eeg = sine_digital(256 * records, 256.0, 10.0, 6000.0);
    let ecg = sine_digital(128 * records, 128.0, 1.0, 12000.0);

    let mut ecg_descriptor = eeg_descriptor("ECG Lead II", 128);
    ecg_descriptor.physical_unit = "mV".to_string();
    ecg_descriptor.physical_min = -5.0;
    ecg_descriptor.physical_max = 5.0;
    ecg_descriptor.transducer_type = "Chest electrodes".to_string();

    encoder.add_channel(eeg_descriptor("EEG C3", 256), eeg)?;
    encoder.add_channel(ecg_descriptor, ecg)?;
    encoder.encode()
}

/// Overwrites a fixed-width field with space-padded `text`
pub fn patch_field(bytes: &mut [u8], range: Range<usize>, text: &str) {
    let slot = &mut bytes[range];
    slot.fill(b' ');
    let n = text.len().min(slot.len());
    slot[..n].copy_from_slice(&text.as_bytes()[..n]);
}

/// Byte range of a per-signal field in a buffer holding `ns` signals
///
/// `block` is the field's per-signal offset inside the 256-byte signal
/// header (0 for label, 16 for transducer, ...), `width` its width.
pub fn signal_field(ns: usize, block: usize, width: usize, channel: usize) -> Range<usize> {
    let start = 256 + ns * block + channel * width;
    start..start + width
}
