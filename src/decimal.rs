//! Fixed-scale decimal arithmetic
//!
//! Prices, sizes, and PnL all flow through `Decimal`: a signed 128-bit
//! integer holding the real value scaled by 10^18. The scale never changes,
//! equality is bit-exact on the scaled integer, and there are no epsilon
//! comparisons anywhere in the crate.
//!
//! The formatting contract matters more than it looks: Hyperliquid hashes the
//! exact bytes of outbound price/size strings into the action signature, so
//! `to_string` must never emit a trailing zero or a trailing decimal point.
//! `"87000.0"` where the venue expects `"87000"` produces a signature that
//! recovers to a random address.

use crate::errors::{HyperfillError, Result};
use alloy_primitives::I256;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

/// Number of fractional digits carried by every value
pub const SCALE: u32 = 18;

/// 10^18, the scaling factor between the raw integer and the real value
const ONE_RAW: i128 = 1_000_000_000_000_000_000;

/// Exact fractional number with a fixed scale of 18 decimal digits
///
/// `real = raw × 10⁻¹⁸`. Copies are cheap and total ordering is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Decimal(i128);

impl Decimal {
    pub const ZERO: Decimal = Decimal(0);
    pub const ONE: Decimal = Decimal(ONE_RAW);

    /// Build from a raw scaled integer (`value × 10⁻¹⁸`)
    pub const fn from_raw(raw: i128) -> Self {
        Decimal(raw)
    }

    /// The raw scaled integer
    pub const fn raw(self) -> i128 {
        self.0
    }

    pub fn from_int(value: i64) -> Self {
        // i64 × 10^18 always fits in i128
        Decimal(value as i128 * ONE_RAW)
    }

    /// Lossy conversion from a float, for ingress paths where the source is
    /// already imprecise (never used on round-trip critical paths).
    pub fn from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(HyperfillError::invalid_format(format!(
                "non-finite float: {value}"
            )));
        }
        // Rust's float Display renders the shortest round-trip form without
        // an exponent, which the string parser accepts directly.
        format!("{value}").parse()
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_sign_negative(self) -> bool {
        self.0 < 0
    }

    /// -1, 0, or +1
    pub fn signum(self) -> i32 {
        self.0.signum() as i32
    }

    pub fn abs(self) -> Self {
        Decimal(self.0.abs())
    }

    pub fn try_add(self, other: Decimal) -> Result<Decimal> {
        self.0
            .checked_add(other.0)
            .map(Decimal)
            .ok_or_else(HyperfillError::overflow)
    }

    pub fn try_sub(self, other: Decimal) -> Result<Decimal> {
        self.0
            .checked_sub(other.0)
            .map(Decimal)
            .ok_or_else(HyperfillError::overflow)
    }

    /// `(a.raw × b.raw) / 10¹⁸`, widened through 256 bits so any in-range
    /// result is exact; truncates toward zero.
    pub fn try_mul(self, other: Decimal) -> Result<Decimal> {
        let lhs = I256::try_from(self.0).map_err(|_| HyperfillError::overflow())?;
        let rhs = I256::try_from(other.0).map_err(|_| HyperfillError::overflow())?;
        let scale = I256::try_from(ONE_RAW).map_err(|_| HyperfillError::overflow())?;
        let product = lhs
            .checked_mul(rhs)
            .ok_or_else(HyperfillError::overflow)?;
        let scaled = product
            .checked_div(scale)
            .ok_or_else(HyperfillError::overflow)?;
        i128::try_from(scaled)
            .map(Decimal)
            .map_err(|_| HyperfillError::overflow())
    }

    /// `(a.raw × 10¹⁸) / b.raw`, truncated toward zero.
    pub fn try_div(self, other: Decimal) -> Result<Decimal> {
        if other.0 == 0 {
            return Err(HyperfillError::division_by_zero());
        }
        let lhs = I256::try_from(self.0).map_err(|_| HyperfillError::overflow())?;
        let rhs = I256::try_from(other.0).map_err(|_| HyperfillError::overflow())?;
        let scale = I256::try_from(ONE_RAW).map_err(|_| HyperfillError::overflow())?;
        let numerator = lhs
            .checked_mul(scale)
            .ok_or_else(HyperfillError::overflow)?;
        let quotient = numerator
            .checked_div(rhs)
            .ok_or_else(HyperfillError::overflow)?;
        i128::try_from(quotient)
            .map(Decimal)
            .map_err(|_| HyperfillError::overflow())
    }

    /// Round to the nearest multiple of `tick`, half away from zero.
    ///
    /// The venue rejects prices not divisible by the pair's tick size, so
    /// every outbound price passes through here.
    pub fn round_to_tick(self, tick: Decimal) -> Result<Decimal> {
        if tick.0 <= 0 {
            return Err(HyperfillError::invalid_tick_size(format!(
                "tick size must be positive, got {tick}"
            )));
        }
        let mut quotient = self.0 / tick.0;
        let remainder = self.0 % tick.0;
        if remainder.unsigned_abs() * 2 >= tick.0.unsigned_abs() {
            quotient += self.0.signum();
        }
        quotient
            .checked_mul(tick.0)
            .map(Decimal)
            .ok_or_else(HyperfillError::overflow)
    }

    /// Whether the value is an exact multiple of `tick`
    pub fn is_tick_aligned(self, tick: Decimal) -> bool {
        tick.0 > 0 && self.0 % tick.0 == 0
    }
}

impl Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

impl FromStr for Decimal {
    type Err = HyperfillError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(HyperfillError::invalid_format(format!(
                "empty decimal: {s:?}"
            )));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(HyperfillError::invalid_format(format!(
                "invalid decimal: {s:?}"
            )));
        }

        let mut value: i128 = 0;
        for b in int_part.bytes() {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add((b - b'0') as i128))
                .ok_or_else(HyperfillError::overflow)?;
        }
        value = value
            .checked_mul(ONE_RAW)
            .ok_or_else(HyperfillError::overflow)?;

        // Fractional digits beyond the fixed scale are truncated.
        let mut frac: i128 = 0;
        let mut count = 0u32;
        for b in frac_part.bytes().take(SCALE as usize) {
            frac = frac * 10 + (b - b'0') as i128;
            count += 1;
        }
        frac *= 10i128.pow(SCALE - count);
        value = value
            .checked_add(frac)
            .ok_or_else(HyperfillError::overflow)?;

        Ok(Decimal(if negative { -value } else { value }))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.0.unsigned_abs();
        let int = magnitude / ONE_RAW as u128;
        let frac = magnitude % ONE_RAW as u128;

        if self.0 < 0 {
            write!(f, "-")?;
        }
        if frac == 0 {
            return write!(f, "{int}");
        }
        let frac_digits = format!("{frac:018}");
        write!(f, "{int}.{}", frac_digits.trim_end_matches('0'))
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct DecimalVisitor;

impl Visitor<'_> for DecimalVisitor {
    type Value = Decimal;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Decimal, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Decimal, E> {
        Decimal::from_f64(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Decimal, E> {
        Ok(Decimal::from_int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Decimal, E> {
        i64::try_from(v)
            .map(Decimal::from_int)
            .map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_format() {
        assert_eq!(dec("87736.5").to_string(), "87736.5");
        assert_eq!(dec("0.0010").to_string(), "0.001");
        assert_eq!(dec("87000").to_string(), "87000");
        assert_eq!(dec("-1.25").to_string(), "-1.25");
        assert_eq!(dec("0").to_string(), "0");
        assert_eq!(dec(".5").to_string(), "0.5");
        assert_eq!(dec("3.").to_string(), "3");
    }

    #[test]
    fn test_format_never_emits_trailing_zero_or_point() {
        // Signature-sensitive: the venue hashes these bytes.
        assert_eq!(Decimal::from_f64(87000.0).unwrap().to_string(), "87000");
        assert_eq!(Decimal::from_f64(0.001).unwrap().to_string(), "0.001");
        assert_eq!(dec("1.100000").to_string(), "1.1");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("1e5".parse::<Decimal>().is_err());
        assert!("-".parse::<Decimal>().is_err());
    }

    #[test]
    fn test_parse_truncates_excess_fraction() {
        // 19th digit dropped, not rounded
        let d = dec("0.1234567890123456789");
        assert_eq!(d.raw(), 123_456_789_012_345_678);
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(dec("1.5").try_add(dec("2.25")).unwrap(), dec("3.75"));
        assert_eq!(dec("1.5").try_sub(dec("2")).unwrap(), dec("-0.5"));
        assert_eq!(dec("1.5").try_mul(dec("2")).unwrap(), dec("3"));
        assert_eq!(dec("3").try_div(dec("2")).unwrap(), dec("1.5"));
        assert_eq!(dec("0.1").try_mul(dec("0.1")).unwrap(), dec("0.01"));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            dec("1").try_div(Decimal::ZERO),
            Err(HyperfillError::Arithmetic { .. })
        ));
    }

    #[test]
    fn test_addition_overflow_detected() {
        let max = Decimal::from_raw(i128::MAX);
        assert!(max.try_add(Decimal::ONE).is_err());
    }

    #[test]
    fn test_mul_overflow_detected() {
        let big = dec("100000000000000000000"); // 1e20
        assert!(big.try_mul(big).is_err());
    }

    #[test]
    fn test_round_to_tick_half_away_from_zero() {
        let tick = dec("0.5");
        assert_eq!(dec("87736.3").round_to_tick(tick).unwrap(), dec("87736.5"));
        assert_eq!(dec("87736.24").round_to_tick(tick).unwrap(), dec("87736"));
        // Midpoint rounds away from zero, both signs
        assert_eq!(dec("1.25").round_to_tick(tick).unwrap(), dec("1.5"));
        assert_eq!(dec("-1.25").round_to_tick(tick).unwrap(), dec("-1.5"));
        assert!(dec("1").round_to_tick(Decimal::ZERO).is_err());
    }

    #[test]
    fn test_tick_alignment() {
        assert!(dec("50000").is_tick_aligned(dec("0.5")));
        assert!(!dec("50000.3").is_tick_aligned(dec("0.5")));
    }

    #[test]
    fn test_ordering_and_sign() {
        assert!(dec("1.1") > dec("1.05"));
        assert!(dec("-3") < Decimal::ZERO);
        assert_eq!(dec("-2.5").abs(), dec("2.5"));
        assert_eq!((-dec("1.5")).to_string(), "-1.5");
        assert_eq!(dec("-7").signum(), -1);
        assert_eq!(Decimal::ZERO.signum(), 0);
    }

    #[test]
    fn test_serde_round_trip() {
        let d = dec("50100.25");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "\"50100.25\"");
        let back: Decimal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
        // Venue sometimes sends bare numbers
        let from_num: Decimal = serde_json::from_str("42").unwrap();
        assert_eq!(from_num, dec("42"));
    }

    proptest! {
        // to_string -> from_string is the identity on the scaled integer
        #[test]
        fn prop_string_round_trip(raw in any::<i64>()) {
            let d = Decimal::from_raw(raw as i128);
            let parsed: Decimal = d.to_string().parse().unwrap();
            prop_assert_eq!(parsed, d);
        }

        #[test]
        fn prop_format_normalized(raw in any::<i64>()) {
            let s = Decimal::from_raw(raw as i128).to_string();
            if let Some((_, frac)) = s.split_once('.') {
                prop_assert!(!frac.is_empty());
                prop_assert!(!frac.ends_with('0'));
            }
            prop_assert!(!s.ends_with('.'));
        }

        #[test]
        fn prop_add_sub_inverse(a in -1_000_000_000i64..1_000_000_000, b in -1_000_000_000i64..1_000_000_000) {
            let x = Decimal::from_int(a);
            let y = Decimal::from_int(b);
            prop_assert_eq!(x.try_add(y).unwrap().try_sub(y).unwrap(), x);
        }
    }
}
