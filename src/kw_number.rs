//! KW number validation and correction.
//!
//! A land-register number is a triplet `court/number/control`, e.g.
//! `WA4M/00123456/4`. The control digit is a weighted checksum over the court
//! code and the zero-padded register number; callers routinely supply a wrong
//! or missing digit, so the corrector recomputes it instead of rejecting.

use std::fmt;

use phf::phf_map;
use regex::Regex;
use std::sync::OnceLock;
use tracing::info;

use crate::error::{AppError, AppResult};

/// Checksum value of every character allowed in a court code. Digits map to
/// themselves; `Q` and `V` are not used by any court.
static CHAR_VALUES: phf::Map<char, u32> = phf_map! {
    '0' => 0, '1' => 1, '2' => 2, '3' => 3, '4' => 4,
    '5' => 5, '6' => 6, '7' => 7, '8' => 8, '9' => 9,
    'X' => 10, 'A' => 11, 'B' => 12, 'C' => 13, 'D' => 14,
    'E' => 15, 'F' => 16, 'G' => 17, 'H' => 18, 'I' => 19,
    'J' => 20, 'K' => 21, 'L' => 22, 'M' => 23, 'N' => 24,
    'O' => 25, 'P' => 26, 'R' => 27, 'S' => 28, 'T' => 29,
    'U' => 30, 'W' => 31, 'Y' => 32, 'Z' => 33,
};

/// Checksum weights, repeated over the whole value sequence.
const WEIGHTS: [u32; 3] = [1, 3, 7];

/// Width the register number is zero-padded to.
const NUMBER_WIDTH: usize = 8;

/// A canonical land-register number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KwNumber {
    /// Court department code, e.g. `WA4M`
    pub court: String,
    /// Register number, zero-padded to 8 digits
    pub number: String,
    /// Computed control digit
    pub control: u8,
}

impl KwNumber {
    /// Computes the correct control digit for a court code and register
    /// number, returning the canonical number.
    ///
    /// Fails with [`AppError::InvalidCharacter`] when the court code contains
    /// a character outside the mapping table or the register number contains
    /// a non-digit.
    pub fn correct(court: &str, number: &str) -> AppResult<Self> {
        let court = court.trim().to_uppercase();
        let number = number.trim();

        let mut values = Vec::with_capacity(court.len() + NUMBER_WIDTH);
        for ch in court.chars() {
            let value = CHAR_VALUES.get(&ch).ok_or(AppError::InvalidCharacter {
                input: court.clone(),
                ch,
            })?;
            values.push(*value);
        }

        let padded = format!("{:0>width$}", number, width = NUMBER_WIDTH);
        for ch in padded.chars() {
            let digit = ch.to_digit(10).ok_or(AppError::InvalidCharacter {
                input: padded.clone(),
                ch,
            })?;
            values.push(digit);
        }

        let sum: u32 = WEIGHTS
            .iter()
            .cycle()
            .zip(&values)
            .map(|(w, v)| w * v)
            .sum();

        Ok(Self {
            court,
            number: padded,
            control: (sum % 10) as u8,
        })
    }

    /// Parses a raw `court/number[/control]` string, recomputing the control
    /// digit. A wrong or missing digit is corrected silently and logged.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let trimmed = raw.trim();
        let mut parts = trimmed.splitn(3, '/');
        let court = parts.next().unwrap_or_default();
        let number = parts.next().unwrap_or_default();

        let corrected = Self::correct(court, number)?;
        if !is_canonical(trimmed) || corrected.to_string() != trimmed {
            info!("Corrected KW number {} to {}", trimmed, corrected);
        }
        Ok(corrected)
    }
}

impl fmt::Display for KwNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.court, self.number, self.control)
    }
}

/// Checks whether a raw string already has the canonical KW shape. Format
/// only, the control digit is not verified.
pub fn is_canonical(raw: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Z0-9]{4}/\d{8}/\d$").expect("valid KW number pattern")
    });
    re.is_match(raw)
}
