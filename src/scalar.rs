//! Reading and writing scalar text.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine as _};

use crate::ErrorKind;

/// RFC 4648 alphabet; `=` padding optional on input, always written on output.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const NULL_LITERALS: [&str; 4] = ["null", "Null", "NULL", "~"];

pub(crate) fn is_null_literal(value: &str) -> bool {
    NULL_LITERALS.contains(&value)
}

/// Split off the sign and parse the magnitude as decimal or `0x` hex.
fn parse_magnitude(value: &str) -> Option<(bool, u64)> {
    let value = value.trim();
    let (negative, digits) = match value.as_bytes().first()? {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };
    let (radix, digits) = match digits.get(..2) {
        Some("0x" | "0X") => (16, &digits[2..]),
        _ => (10, digits),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(digits, radix)
        .ok()
        .map(|magnitude| (negative, magnitude))
}

pub(crate) fn parse_int(value: &str) -> Option<i64> {
    let (negative, magnitude) = parse_magnitude(value)?;
    if negative {
        if magnitude == 1 << 63 {
            Some(i64::MIN)
        } else {
            i64::try_from(magnitude).ok().map(|m| -m)
        }
    } else {
        i64::try_from(magnitude).ok()
    }
}

pub(crate) fn parse_uint(value: &str) -> Option<u64> {
    match parse_magnitude(value)? {
        (true, 0) => Some(0),
        (true, _) => None,
        (false, magnitude) => Some(magnitude),
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    const TRUE: [&str; 4] = ["true", "yes", "enable", "1"];
    const FALSE: [&str; 4] = ["false", "no", "disable", "0"];
    if TRUE.iter().any(|t| t.eq_ignore_ascii_case(value)) {
        Some(true)
    } else if FALSE.iter().any(|f| f.eq_ignore_ascii_case(value)) {
        Some(false)
    } else {
        None
    }
}

/// A parsed float, and whether range was lost getting it into `width` bytes.
pub(crate) fn parse_float(value: &str, width: usize) -> Option<(f64, bool)> {
    let value = value.trim();
    let special = match value.to_ascii_lowercase().as_str() {
        ".inf" | "+.inf" => Some(f64::INFINITY),
        "-.inf" => Some(f64::NEG_INFINITY),
        ".nan" => Some(f64::NAN),
        _ => None,
    };
    if let Some(special) = special {
        return Some((special, false));
    }
    let parsed: f64 = value.parse().ok()?;
    let literal_infinite = value
        .trim_start_matches(|c| c == '+' || c == '-')
        .to_ascii_lowercase()
        .starts_with("inf");
    let mut lossy = (parsed.is_infinite() && !literal_infinite)
        || (parsed == 0.0 && has_nonzero_mantissa(value));
    if width == 4 && parsed.is_finite() {
        let narrowed = parsed as f32;
        lossy |= narrowed.is_infinite() || (narrowed == 0.0 && parsed != 0.0);
    }
    Some((parsed, lossy))
}

fn has_nonzero_mantissa(value: &str) -> bool {
    value
        .chars()
        .take_while(|c| !matches!(c, 'e' | 'E'))
        .any(|c| matches!(c, '1'..='9'))
}

pub(crate) fn format_float(value: f64, width: usize) -> String {
    if value.is_nan() {
        String::from(".nan")
    } else if value.is_infinite() {
        String::from(if value > 0.0 { ".inf" } else { "-.inf" })
    } else if width == 4 {
        format!("{:?}", value as f32)
    } else {
        format!("{value:?}")
    }
}

/// Decode base64 text, ignoring embedded whitespace, refusing anything that
/// decodes to more than `max` bytes.
pub(crate) fn decode_base64(value: &str, max: u64) -> Result<Vec<u8>, ErrorKind> {
    let compact: Vec<u8> = value
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let shortest = (compact.len() / 4 * 3).saturating_sub(2) as u64;
    if shortest > max {
        return Err(ErrorKind::Base64MaxLen);
    }
    let decoded = BASE64
        .decode(&compact)
        .map_err(|_| ErrorKind::InvalidBase64)?;
    if decoded.len() as u64 > max {
        return Err(ErrorKind::Base64MaxLen);
    }
    Ok(decoded)
}

pub(crate) fn encode_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}
