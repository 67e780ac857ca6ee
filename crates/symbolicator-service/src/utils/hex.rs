use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use thiserror::Error;

/// An address or other integer that is exchanged as a hex string.
///
/// Parsing accepts `0x`-prefixed hex strings (with any amount of zero padding), plain decimal
/// strings, unprefixed hex strings and JSON numbers. It is always displayed and serialized in its
/// minimal form, e.g. `0x2ac28b8`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HexValue(pub u64);

/// The given string is not a valid address.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid address `{0}`")]
pub struct ParseHexError(String);

impl HexValue {
    /// Renders this value zero-padded to at least `digits` hex digits, with a leading `0x`.
    ///
    /// Values that need more digits than requested are never truncated.
    pub fn padded(self, digits: usize) -> String {
        format!("{:#0width$x}", self.0, width = digits + 2)
    }

    /// The number of hex digits in the minimal representation.
    pub fn digits(self) -> usize {
        let bits = 64 - self.0.leading_zeros() as usize;
        bits.div_ceil(4).max(1)
    }
}

impl From<u64> for HexValue {
    fn from(value: u64) -> Self {
        HexValue(value)
    }
}

impl fmt::Display for HexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl Serialize for HexValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl FromStr for HexValue {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<HexValue, ParseHexError> {
        let trimmed = s.trim();
        let invalid = || ParseHexError(s.to_owned());

        if let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            return u64::from_str_radix(hex, 16)
                .map(HexValue)
                .map_err(|_| invalid());
        }

        // Decimal wins for all-digit strings, anything else with hex digits is read as hex.
        trimmed
            .parse()
            .or_else(|_| u64::from_str_radix(trimmed, 16))
            .map(HexValue)
            .map_err(|_| invalid())
    }
}

impl<'de> Deserialize<'de> for HexValue {
    fn deserialize<D>(deserializer: D) -> Result<HexValue, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct HexVisitor;

        impl de::Visitor<'_> for HexVisitor {
            type Value = HexValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a number or hex string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(HexValue)
                    .map_err(|_| E::custom(format!("negative address {v}")))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(HexValue(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(HexVisitor)
    }
}
