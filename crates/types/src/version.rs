//! Decimal package versions
//!
//! Update versions in this system are plain decimals (`3.1021`, `0.9`), not
//! semver triples. Comparison is numeric: `2.10` and `2.1` are the same
//! version and `2.9` is newer than `2.10`. Parsing is locale-independent, so
//! the decimal separator is always `.`.

use ism_errors::VersionError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Fractional digits carried by the scaled representation.
const FRACTION_DIGITS: usize = 9;
const FRACTION_SCALE: u64 = 1_000_000_000;

/// A decimal version, stored as `whole * 10^9 + fraction` so equality and
/// ordering are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PackageVersion(u64);

impl PackageVersion {
    /// The zero version, older than every released version.
    pub const ZERO: Self = Self(0);

    /// Parse a version string, accepting an optional leading `V`/`v`.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidVersion` for anything that is not
    /// `digits[.digits]`, and `VersionError::OutOfRange` when the whole part
    /// exceeds the scaled range or the fraction carries more than nine
    /// digits.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix(['V', 'v'])
            .unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(VersionError::InvalidVersion {
                input: input.to_string(),
            });
        }

        let (whole_str, frac_str) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole_str.is_empty()
            || !whole_str.bytes().all(|b| b.is_ascii_digit())
            || !frac_str.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(VersionError::InvalidVersion {
                input: input.to_string(),
            });
        }

        if frac_str.len() > FRACTION_DIGITS {
            return Err(VersionError::OutOfRange {
                input: input.to_string(),
            });
        }

        let whole: u64 = whole_str
            .parse()
            .map_err(|_| VersionError::OutOfRange {
                input: input.to_string(),
            })?;

        let mut fraction: u64 = 0;
        if !frac_str.is_empty() {
            // Right-pad to nine digits: ".1021" scales the same as ".102100000".
            let parsed: u64 = frac_str.parse().map_err(|_| VersionError::OutOfRange {
                input: input.to_string(),
            })?;
            let padding = FRACTION_DIGITS - frac_str.len();
            fraction = parsed * 10u64.pow(u32::try_from(padding).unwrap_or(0));
        }

        whole
            .checked_mul(FRACTION_SCALE)
            .and_then(|scaled| scaled.checked_add(fraction))
            .map(Self)
            .ok_or_else(|| VersionError::OutOfRange {
                input: input.to_string(),
            })
    }

    /// Whole part of the version.
    #[must_use]
    pub fn whole(self) -> u64 {
        self.0 / FRACTION_SCALE
    }

    /// Scaled fractional part (nine implied digits).
    #[must_use]
    pub fn fraction(self) -> u64 {
        self.0 % FRACTION_SCALE
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fraction = self.fraction();
        if fraction == 0 {
            return write!(f, "{}", self.whole());
        }
        let digits = format!("{fraction:09}");
        write!(f, "{}.{}", self.whole(), digits.trim_end_matches('0'))
    }
}

impl FromStr for PackageVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PackageVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PackageVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_prefixed() {
        assert_eq!(PackageVersion::parse("2.5").unwrap().to_string(), "2.5");
        assert_eq!(PackageVersion::parse("V3.1021").unwrap().to_string(), "3.1021");
        assert_eq!(PackageVersion::parse("v1").unwrap().to_string(), "1");
        assert_eq!(PackageVersion::parse(" 4.2 ").unwrap().to_string(), "4.2");
    }

    #[test]
    fn decimal_semantics_not_semver() {
        let v2_10 = PackageVersion::parse("2.10").unwrap();
        let v2_1 = PackageVersion::parse("2.1").unwrap();
        let v2_9 = PackageVersion::parse("2.9").unwrap();
        assert_eq!(v2_10, v2_1);
        assert!(v2_9 > v2_10);
        assert!(PackageVersion::parse("0.9").unwrap() < PackageVersion::parse("1.0").unwrap());
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "V", "abc", "1.2.3", "1,5", "-1.0", "1.0a"] {
            assert!(PackageVersion::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(matches!(
            PackageVersion::parse("1.0123456789"),
            Err(VersionError::OutOfRange { .. })
        ));
        assert!(PackageVersion::parse("99999999999999999999").is_err());
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(PackageVersion::parse("2.10").unwrap().to_string(), "2.1");
        assert_eq!(PackageVersion::parse("1.0").unwrap().to_string(), "1");
        assert_eq!(PackageVersion::ZERO.to_string(), "0");
    }

    #[test]
    fn serde_round_trip() {
        let v = PackageVersion::parse("3.1021").unwrap();
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"3.1021\"");
        let back: PackageVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
