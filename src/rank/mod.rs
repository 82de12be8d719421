//! Rank key encoding
//!
//! Rank entries live in an index sorted by string key, so "top entries by
//! magnitude" is an ascending index walk with no sort at read time. The
//! encoding inverts numeric order: for magnitudes a > b,
//! `encode_magnitude(a) < encode_magnitude(b)` lexicographically.
//!
//! Scheme: magnitudes are rendered as fixed-point decimal digits,
//! [`MAGNITUDE_INT_DIGITS`] integer digits and [`MAGNITUDE_FRAC_DIGITS`]
//! fraction digits, banker's rounding to the fraction width, explicit clamp
//! above the integer width. Each digit is then nine's-complemented and the
//! decimal point dropped. Zero encodes as all nines, the maximum as all
//! zeros.
//!
//! The same inverse ordering is applied to timestamps by
//! [`inverse_time_key`]: newer instants produce lexicographically smaller
//! keys. Vote ids embed it so the newest votes sort first, and rank keys
//! embed a vote id as a tie-break so equal totals rank newest-first without
//! colliding in the index.

use rust_decimal::Decimal;

/// Integer digits in an encoded magnitude. Covers the full `Decimal` range
/// (96-bit mantissa, < 7.93e28).
pub const MAGNITUDE_INT_DIGITS: usize = 29;

/// Fraction digits in an encoded magnitude. Finer fractions are rounded
/// (banker's rounding) before encoding.
pub const MAGNITUDE_FRAC_DIGITS: u32 = 10;

/// Total width of an encoded magnitude.
pub const ENCODED_MAGNITUDE_LEN: usize = MAGNITUDE_INT_DIGITS + MAGNITUDE_FRAC_DIGITS as usize;

/// Width of an inverse time key: enough for 10^13 - 1 milliseconds since
/// epoch (through the year 2286).
pub const TIME_KEY_DIGITS: usize = 13;

const MAX_TIME_MILLIS: i64 = 9_999_999_999_999;

/// Encode a non-negative magnitude such that larger magnitudes produce
/// lexicographically smaller keys.
///
/// Negative magnitudes are rejected upstream (transaction validation);
/// callers must not pass them here.
pub fn encode_magnitude(magnitude: Decimal) -> String {
    debug_assert!(
        !magnitude.is_sign_negative() || magnitude.is_zero(),
        "magnitude must be non-negative"
    );

    let rounded = magnitude.round_dp(MAGNITUDE_FRAC_DIGITS);
    let text = format!("{:.prec$}", rounded, prec = MAGNITUDE_FRAC_DIGITS as usize);
    let (int_part, frac_part) = match text.split_once('.') {
        Some(parts) => parts,
        None => (text.as_str(), ""),
    };

    // Above the documented domain: clamp to the maximum, which complements
    // to the lexicographic minimum.
    if int_part.len() > MAGNITUDE_INT_DIGITS {
        return "0".repeat(ENCODED_MAGNITUDE_LEN);
    }

    let mut digits = String::with_capacity(ENCODED_MAGNITUDE_LEN);
    for _ in 0..(MAGNITUDE_INT_DIGITS - int_part.len()) {
        digits.push('0');
    }
    digits.push_str(int_part);
    digits.push_str(frac_part);
    for _ in 0..(MAGNITUDE_FRAC_DIGITS as usize - frac_part.len()) {
        digits.push('0');
    }

    nines_complement(&digits)
}

/// Encode milliseconds-since-epoch such that newer instants produce
/// lexicographically smaller keys. Out-of-range inputs clamp to the key
/// domain `[0, 10^13 - 1]`.
pub fn inverse_time_key(millis: i64) -> String {
    let clamped = millis.clamp(0, MAX_TIME_MILLIS);
    format!("{:0width$}", MAX_TIME_MILLIS - clamped, width = TIME_KEY_DIGITS)
}

/// Build the rank key for a tally total.
///
/// `tie_break` is the vote id of the vote that produced this total; vote ids
/// are unique and inverse-time ordered, so equal totals rank newest-first
/// and no two entries ever share a key.
pub fn rank_key(total: Decimal, tie_break: &str) -> String {
    format!("{}:{}", encode_magnitude(total), tie_break)
}

fn nines_complement(digits: &str) -> String {
    digits
        .bytes()
        .map(|b| char::from(b'9' - (b - b'0')))
        .collect()
}
