use std::fmt;
use std::io;
use thiserror::Error;

/// Identifies a fixed-width text field of the EDF header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    HeaderByteCount,
    RecordCount,
    RecordDuration,
    ChannelCount,
    PhysicalMin,
    PhysicalMax,
    DigitalMin,
    DigitalMax,
    SamplesPerRecord,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::HeaderByteCount => "number of bytes in header record",
            Field::RecordCount => "number of data records",
            Field::RecordDuration => "duration of a data record",
            Field::ChannelCount => "number of signals",
            Field::PhysicalMin => "physical minimum",
            Field::PhysicalMax => "physical maximum",
            Field::DigitalMin => "digital minimum",
            Field::DigitalMax => "digital maximum",
            Field::SamplesPerRecord => "number of samples in each data record",
        };
        f.write_str(name)
    }
}

/// Which declared range of a channel collapsed to a single value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Digital,
    Physical,
}

impl fmt::Display for RangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeKind::Digital => f.write_str("digital"),
            RangeKind::Physical => f.write_str("physical"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed field '{}'{}: {:?}", .field, channel_suffix(.channel), .value)]
    MalformedField {
        field: Field,
        channel: Option<usize>,
        value: String,
    },

    #[error("Truncated data: expected at least {expected_bytes} bytes, got {actual_bytes}")]
    TruncatedData {
        expected_bytes: usize,
        actual_bytes: usize,
    },

    #[error("Signal {channel}: {kind} min equals {kind} max")]
    DegenerateChannelRange { channel: usize, kind: RangeKind },

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Decode cancelled")]
    Cancelled,
}

fn channel_suffix(channel: &Option<usize>) -> String {
    match channel {
        Some(index) => format!(" of signal {}", index),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
