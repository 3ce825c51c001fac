use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const DECIMALS: u32 = 18;
const UNITS_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount is not a decimal number: {0}")]
    Invalid(String),
    #[error("amount has more than 18 decimal places: {0}")]
    TooManyDecimals(String),
    #[error("amount does not fit in 128 bits")]
    Overflow,
    #[error("word must be 32 bytes, got {0}")]
    InvalidWordLength(usize),
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_units(units: u128) -> Self {
        Amount(units)
    }

    pub const fn units(self) -> u128 {
        self.0
    }

    pub const fn from_tokens(whole: u64) -> Self {
        Amount(whole as u128 * UNITS_PER_TOKEN)
    }

    /// Parses a human decimal string like `"1.5"` into smallest units.
    pub fn parse_ether(value: &str) -> Result<Self, AmountError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AmountError::Empty);
        }

        let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
        let is_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction)
        {
            return Err(AmountError::Invalid(value.to_string()));
        }
        if fraction.len() > DECIMALS as usize {
            return Err(AmountError::TooManyDecimals(value.to_string()));
        }

        let whole: u128 =
            if whole.is_empty() { 0 } else { whole.parse().map_err(|_| AmountError::Overflow)? };
        let fraction: u128 = if fraction.is_empty() {
            0
        } else {
            let scale = 10u128.pow(DECIMALS - fraction.len() as u32);
            fraction.parse::<u128>().map_err(|_| AmountError::Overflow)? * scale
        };

        whole
            .checked_mul(UNITS_PER_TOKEN)
            .and_then(|units| units.checked_add(fraction))
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    pub fn from_word(word: &[u8]) -> Result<Self, AmountError> {
        if word.len() != 32 {
            return Err(AmountError::InvalidWordLength(word.len()));
        }
        if word[..16].iter().any(|b| *b != 0) {
            return Err(AmountError::Overflow);
        }
        let low = <[u8; 16]>::try_from(&word[16..]).map_err(|_| AmountError::Overflow)?;
        Ok(Amount(u128::from_be_bytes(low)))
    }

    pub fn to_word(self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[16..].copy_from_slice(&self.0.to_be_bytes());
        word
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNITS_PER_TOKEN;
        let fraction = self.0 % UNITS_PER_TOKEN;
        if fraction == 0 {
            return write!(f, "{}.0", whole);
        }
        let fraction = format!("{:018}", fraction);
        write!(f, "{}.{}", whole, fraction.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse_ether(s)
    }
}

// NOTE: serialized as a decimal string of smallest units
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u128>().map(Amount).map_err(de::Error::custom)
    }
}
