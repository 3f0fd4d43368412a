use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{DecodeError, Field, Result};

/// Decodes a fixed-width field, one character per byte, and trims it
///
/// Every byte value 0-255 maps to the Unicode scalar of the same value, so
/// no input can fail to decode.
pub fn decode_text_field(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| b as char)
        .collect::<String>()
        .trim_matches(is_field_padding)
        .to_string()
}

// 单字节映射下的空白：ASCII 空白、垂直制表符和 U+00A0；U+0085 保留
fn is_field_padding(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\u{b}' || c == '\u{a0}'
}

/// 严格的整数解析：空字段或非数字均视为格式错误
pub fn parse_int_field(text: &str, field: Field, channel: Option<usize>) -> Result<i64> {
    let s = text.trim();
    s.parse::<i64>().map_err(|_| malformed(s, field, channel))
}

/// 严格的浮点数解析，拒绝 inf / NaN
pub fn parse_float_field(text: &str, field: Field, channel: Option<usize>) -> Result<f64> {
    let s = text.trim();
    match s.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(malformed(s, field, channel)),
    }
}

fn malformed(s: &str, field: Field, channel: Option<usize>) -> DecodeError {
    DecodeError::MalformedField {
        field,
        channel,
        value: s.to_string(),
    }
}

/// Parses the EDF `dd.mm.yy` start date and `hh.mm.ss` start time
///
/// Two-digit years use the EDF clipping rule: 85-99 are 1985-1999, 00-84 are
/// 2000-2084.
pub fn parse_start_datetime(date_str: &str, time_str: &str) -> Option<NaiveDateTime> {
    let date_parts = split_triplet(date_str)?;
    let time_parts = split_triplet(time_str)?;

    let yy = date_parts[2];
    let year = if yy > 84 { 1900 + yy } else { 2000 + yy };
    let date = NaiveDate::from_ymd_opt(year as i32, date_parts[1], date_parts[0])?;
    let time = NaiveTime::from_hms_opt(time_parts[0], time_parts[1], time_parts[2])?;

    Some(NaiveDateTime::new(date, time))
}

fn split_triplet(s: &str) -> Option<[u32; 3]> {
    let mut parts = s.trim().split('.');
    let mut out = [0u32; 3];
    for slot in out.iter_mut() {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *slot = part.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

/// Writes `text` left-aligned into a space-padded fixed-width slot
///
/// Non-ASCII characters become `_`. Returns `false` if the text does not fit.
pub fn write_text_field(slot: &mut [u8], text: &str) -> bool {
    let ascii: Vec<u8> = text
        .chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'_' })
        .collect();
    if ascii.len() > slot.len() {
        return false;
    }
    slot.fill(b' ');
    slot[..ascii.len()].copy_from_slice(&ascii);
    true
}

/// Formats a number for an 8-character numeric field
///
/// Falls back to fewer decimals until the text fits; `None` if even the
/// integer part is too wide.
pub fn format_number_field(value: f64, width: usize) -> Option<String> {
    if value.fract() == 0.0 {
        let text = format!("{}", value as i64);
        return (text.len() <= width).then_some(text);
    }
    for decimals in (0..width).rev() {
        let text = format!("{:.*}", decimals, value);
        let text = if text.contains('.') {
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            text
        };
        if text.len() <= width {
            return Some(text);
        }
    }
    None
}
