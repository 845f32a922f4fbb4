//! Raw register words to scaled physical values.

use thiserror::Error;

use crate::register::{Encoding, RegisterSpec};

/// The read returned a different number of words than the register spans.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("expected {expected} register word(s), got {actual}")]
pub struct DecodeError {
    pub expected: u16,
    pub actual: usize,
}

/// Decode the words read for `spec` and apply its scale.
///
/// Words are big-endian with the most significant word first. When the
/// scale is below 1 the result is rounded to the number of decimals the
/// scale implies, which strips the float noise of the multiplication.
pub fn decode(spec: &RegisterSpec, words: &[u16]) -> Result<f64, DecodeError> {
    if words.len() != usize::from(spec.word_count()) {
        return Err(DecodeError {
            expected: spec.word_count(),
            actual: words.len(),
        });
    }

    let raw = match spec.encoding {
        Encoding::U16 => f64::from(words[0]),
        Encoding::I16 => f64::from(words[0] as i16),
        Encoding::I32 => f64::from(combine_i32(words[0], words[1])),
    };

    let scaled = raw * spec.scale;
    Ok(match decimal_places(spec.scale) {
        Some(places) => round_to(scaled, places),
        None => scaled,
    })
}

/// Two's-complement 32-bit value from a high and a low word.
pub fn combine_i32(high: u16, low: u16) -> i32 {
    ((u32::from(high) << 16) | u32::from(low)) as i32
}

/// Decimal places implied by a fractional scale: `ceil(-log10(scale))`.
///
/// Returns `None` for scales of 1 or more.
pub fn decimal_places(scale: f64) -> Option<u32> {
    if scale >= 1.0 {
        return None;
    }
    // log10(0.001) is not exactly -3 in binary floating point.
    let places = (-scale.log10() - 1e-9).ceil();
    Some(places.max(0.0) as u32)
}

fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
