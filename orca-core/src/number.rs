//! Decimal numbers using dashu
//!
//! Uses dashu-float (DBig) for decimal arithmetic. Quantities, unit prices
//! and totals are all `Number`s, so `2,5 * 3` is exactly `7.5` and sums of
//! money never pick up binary floating-point noise.

use dashu_float::DBig;
use dashu_int::IBig;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error type for number operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumberError {
    #[error("Invalid number format: {0}")]
    ParseError(String),

    #[error("Division by zero")]
    DivisionByZero,
}

/// Default precision for calculations (decimal digits)
const DEFAULT_PRECISION: usize = 50;

/// Arbitrary precision decimal number
///
/// Built on dashu-float's DBig. All operations return Results or new
/// Numbers - never panic. Every Number is finite.
#[derive(Debug, Clone)]
pub struct Number {
    inner: DBig,
}

impl Number {
    // ========== Construction ==========

    /// Ensure a DBig has adequate precision for calculations
    fn with_work_precision(val: DBig) -> DBig {
        val.with_precision(DEFAULT_PRECISION).value()
    }

    /// Create from decimal text.
    /// Supports: "123", "3.14", "3,14", "-42", ".5", "5."
    pub fn from_str(s: &str) -> Result<Self, NumberError> {
        let s = s.trim();
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let mut separators = 0;
        let mut digits = 0;
        for c in body.chars() {
            match c {
                '0'..='9' => digits += 1,
                '.' | ',' => separators += 1,
                _ => return Err(NumberError::ParseError(s.to_string())),
            }
        }
        if digits == 0 || separators > 1 {
            return Err(NumberError::ParseError(s.to_string()));
        }

        let mut normalized = body.replace(',', ".");
        if normalized.starts_with('.') {
            normalized.insert(0, '0');
        }
        if normalized.ends_with('.') {
            normalized.push('0');
        }
        if negative {
            normalized.insert(0, '-');
        }

        let inner: DBig = normalized
            .parse()
            .map_err(|_| NumberError::ParseError(s.to_string()))?;

        Ok(Self { inner: Self::with_work_precision(inner) })
    }

    /// Create from i64 with working precision
    pub fn from_i64(n: i64) -> Self {
        Self { inner: Self::with_work_precision(DBig::from(n)) }
    }

    pub fn zero() -> Self {
        Self::from_i64(0)
    }

    // ========== Predicates ==========

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.inner == DBig::ZERO
    }

    /// Check if negative
    pub fn is_negative(&self) -> bool {
        self.inner < DBig::ZERO
    }

    /// Check if strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.inner > DBig::ZERO
    }

    // ========== Basic Arithmetic ==========

    /// Addition
    pub fn add(&self, other: &Self) -> Self {
        Self { inner: &self.inner + &other.inner }
    }

    /// Subtraction
    pub fn sub(&self, other: &Self) -> Self {
        Self { inner: &self.inner - &other.inner }
    }

    /// Multiplication
    pub fn mul(&self, other: &Self) -> Self {
        Self { inner: &self.inner * &other.inner }
    }

    /// Safe division (returns Result, never panics)
    pub fn checked_div(&self, other: &Self) -> Result<Self, NumberError> {
        if other.is_zero() {
            Err(NumberError::DivisionByZero)
        } else {
            Ok(Self { inner: &self.inner / &other.inner })
        }
    }

    /// Negation
    pub fn neg(&self) -> Self {
        Self { inner: -self.inner.clone() }
    }

    /// Round to `places` decimal places, halves away from zero
    pub fn round(&self, places: u32) -> Self {
        let (significand, exponent) = self.inner.clone().into_repr().into_parts();
        let target = -(places as isize);
        if exponent >= target {
            return self.clone();
        }

        let mut divisor = IBig::ONE;
        for _ in 0..(target - exponent) {
            divisor = divisor * IBig::from(10u8);
        }

        let negative = significand < IBig::ZERO;
        let magnitude = if negative { -significand } else { significand };
        let mut quotient = &magnitude / &divisor;
        let remainder = &magnitude % &divisor;
        if &remainder + &remainder >= divisor {
            quotient += IBig::ONE;
        }
        let rounded = if negative { -quotient } else { quotient };

        Self { inner: Self::with_work_precision(DBig::from_parts(rounded, target)) }
    }

    // ========== Conversion ==========

    /// Exact decimal rendering, never in scientific notation.
    /// Trailing fraction zeros are dropped: `7.50` renders as `7.5`.
    pub fn to_plain_string(&self) -> String {
        // DBig stores as significand * 10^exponent
        let (significand, exponent) = self.inner.clone().into_repr().into_parts();
        let negative = significand < IBig::ZERO;
        let digits = if negative { (-significand).to_string() } else { significand.to_string() };

        let mut out = if exponent >= 0 {
            let mut s = digits;
            s.extend(std::iter::repeat('0').take(exponent as usize));
            s
        } else {
            let frac = exponent.unsigned_abs();
            let (int_part, frac_part) = if digits.len() > frac {
                let (i, f) = digits.split_at(digits.len() - frac);
                (i.to_string(), f.to_string())
            } else {
                ("0".to_string(), format!("{}{}", "0".repeat(frac - digits.len()), digits))
            };
            let frac_part = frac_part.trim_end_matches('0');
            if frac_part.is_empty() {
                int_part
            } else {
                format!("{}.{}", int_part, frac_part)
            }
        };

        if negative && out != "0" {
            out.insert(0, '-');
        }
        out
    }

    /// Render with exactly `places` decimal places (for display columns)
    pub fn as_decimal(&self, places: u32) -> String {
        let rounded = self.round(places).to_plain_string();
        if places == 0 {
            return rounded;
        }
        let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
        format!("{}.{:0<width$}", int_part, frac_part, width = places as usize)
    }
}

// ========== Trait Implementations ==========

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}

impl Default for Number {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Self::from_i64(n)
    }
}

impl std::iter::Sum for Number {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, n| acc.add(&n))
    }
}

impl<'a> std::iter::Sum<&'a Number> for Number {
    fn sum<I: Iterator<Item = &'a Number>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, n| acc.add(n))
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // DBig implements PartialOrd, use it and treat None as Equal
        self.inner.partial_cmp(&other.inner).unwrap_or(std::cmp::Ordering::Equal)
    }
}
