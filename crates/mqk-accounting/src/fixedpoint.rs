//! Fixed-point accounting scalar.
//!
//! # Motivation
//!
//! Every price, quantity and cash amount the accounting core touches is a
//! `Fixed`: a signed `i64` at 1e-8 scale. Accounting state is therefore
//! always "rounded to 8 decimal places" by construction, replay of the same
//! trade stream is bit-for-bit deterministic, and no float drift accumulates
//! across thousands of partial lot consumptions.
//!
//! # Scale
//!
//! `1.0 = Fixed(100_000_000)`. The same scale is used for base quantities,
//! quote amounts and prices; the type does not try to tell them apart.
//!
//! # Arithmetic
//!
//! The representable range is about ±9.2e10. External input enters through
//! [`Fixed::try_from_f64`], [`FromStr`] or serde, all of which reject
//! out-of-range values with [`AccountingError::OutOfRange`].
//!
//! - `checked_add`, `checked_sub`, `checked_mul`, `checked_div` return `None`
//!   on overflow (and on a zero divisor). Accounting paths use these and
//!   report [`AccountingError::Overflow`].
//! - The operators (`Add`, `Sub`, `Neg`, `AddAssign`, `SubAssign`, `Mul`,
//!   `Div`, `Sum`) panic on overflow in every build profile, never wrap or
//!   clamp. They are for values already known to be in range.
//! - `Mul` and `Div` run in `i128` and round half away from zero back to 8
//!   decimals.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AccountingError;

/// Raw units per 1.0.
pub const FIXED_SCALE: i64 = 100_000_000;

const FIXED_DECIMALS: usize = 8;

// ---------------------------------------------------------------------------
// Fixed newtype
// ---------------------------------------------------------------------------

/// A signed decimal amount with exactly 8 fractional digits.
///
/// There is intentionally no `From<i64>`: use [`Fixed::new`] for raw units,
/// [`Fixed::from_int`] for whole numbers and [`Fixed::from_f64`] at the
/// boundary where float input enters the system.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i64);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(FIXED_SCALE);
    pub const MAX: Fixed = Fixed(i64::MAX);
    pub const MIN: Fixed = Fixed(i64::MIN);

    /// Construct from raw 1e-8 units.
    #[inline]
    pub const fn new(raw: i64) -> Self {
        Fixed(raw)
    }

    /// Construct a whole number.
    #[inline]
    pub const fn from_int(n: i64) -> Self {
        Fixed(n * FIXED_SCALE)
    }

    /// Round a float to the nearest 1e-8 (half away from zero).
    ///
    /// # Errors
    /// [`AccountingError::OutOfRange`] for non-finite input or a value
    /// outside the representable range.
    pub fn try_from_f64(x: f64) -> Result<Self, AccountingError> {
        let scaled = (x * FIXED_SCALE as f64).round();
        // `i64::MAX as f64` rounds up to 2^63, which is itself out of range.
        if !scaled.is_finite() || scaled >= i64::MAX as f64 || scaled < i64::MIN as f64 {
            return Err(AccountingError::OutOfRange {
                value: x.to_string(),
            });
        }
        Ok(Fixed(scaled as i64))
    }

    /// [`Fixed::try_from_f64`] for literals known to be in range.
    ///
    /// # Panics
    /// On non-finite or out-of-range input.
    pub fn from_f64(x: f64) -> Self {
        match Self::try_from_f64(x) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / FIXED_SCALE as f64
    }

    #[inline]
    pub fn abs(self) -> Fixed {
        Fixed(self.0.saturating_abs())
    }

    /// `1`, `0` or `-1` as a plain integer.
    #[inline]
    pub fn signum(self) -> i64 {
        self.0.signum()
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn checked_add(self, rhs: Fixed) -> Option<Fixed> {
        self.0.checked_add(rhs.0).map(Fixed)
    }

    #[inline]
    pub fn checked_sub(self, rhs: Fixed) -> Option<Fixed> {
        self.0.checked_sub(rhs.0).map(Fixed)
    }

    /// Product rounded half away from zero; `None` when out of range.
    pub fn checked_mul(self, rhs: Fixed) -> Option<Fixed> {
        let n = self.0 as i128 * rhs.0 as i128;
        narrow(div_round(n, FIXED_SCALE as i128))
    }

    /// Quotient rounded half away from zero; `None` when `rhs` is zero or
    /// the result is out of range.
    pub fn checked_div(self, rhs: Fixed) -> Option<Fixed> {
        if rhs.0 == 0 {
            return None;
        }
        let n = self.0 as i128 * FIXED_SCALE as i128;
        narrow(div_round(n, rhs.0 as i128))
    }

    /// Sum that stops at the first overflow.
    pub fn checked_sum<I: IntoIterator<Item = Fixed>>(iter: I) -> Option<Fixed> {
        iter.into_iter()
            .try_fold(Fixed::ZERO, |acc, x| acc.checked_add(x))
    }
}

fn div_round(n: i128, d: i128) -> i128 {
    let q = n / d;
    let r = n % d;
    if r.abs() * 2 >= d.abs() {
        if (n < 0) == (d < 0) {
            q + 1
        } else {
            q - 1
        }
    } else {
        q
    }
}

fn narrow(x: i128) -> Option<Fixed> {
    i64::try_from(x).ok().map(Fixed)
}

fn overflow(op: &str) -> ! {
    panic!("Fixed overflow in {op}")
}

// ---------------------------------------------------------------------------
// Arithmetic operators
// ---------------------------------------------------------------------------

impl Add for Fixed {
    type Output = Fixed;
    #[inline]
    fn add(self, rhs: Fixed) -> Fixed {
        self.checked_add(rhs).unwrap_or_else(|| overflow("add"))
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    #[inline]
    fn sub(self, rhs: Fixed) -> Fixed {
        self.checked_sub(rhs).unwrap_or_else(|| overflow("sub"))
    }
}

impl Neg for Fixed {
    type Output = Fixed;
    #[inline]
    fn neg(self) -> Fixed {
        self.0.checked_neg().map(Fixed).unwrap_or_else(|| overflow("neg"))
    }
}

impl AddAssign for Fixed {
    #[inline]
    fn add_assign(&mut self, rhs: Fixed) {
        *self = *self + rhs;
    }
}

impl SubAssign for Fixed {
    #[inline]
    fn sub_assign(&mut self, rhs: Fixed) {
        *self = *self - rhs;
    }
}

impl Mul for Fixed {
    type Output = Fixed;
    fn mul(self, rhs: Fixed) -> Fixed {
        self.checked_mul(rhs).unwrap_or_else(|| overflow("mul"))
    }
}

impl Div for Fixed {
    type Output = Fixed;
    fn div(self, rhs: Fixed) -> Fixed {
        match self.checked_div(rhs) {
            Some(v) => v,
            None if rhs.is_zero() => panic!("Fixed division by zero"),
            None => overflow("div"),
        }
    }
}

impl Sum for Fixed {
    fn sum<I: Iterator<Item = Fixed>>(iter: I) -> Fixed {
        iter.fold(Fixed::ZERO, |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Fixed> for Fixed {
    fn sum<I: Iterator<Item = &'a Fixed>>(iter: I) -> Fixed {
        iter.copied().sum()
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = FIXED_SCALE as u64;
        write!(f, "{sign}{}.{:08}", abs / scale, abs % scale)
    }
}

impl FromStr for Fixed {
    type Err = AccountingError;

    /// Parse a plain decimal string (`"12"`, `"-0.5"`, `"+1.00000001"`).
    ///
    /// More than 8 fractional digits is rejected rather than rounded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AccountingError::InvalidDecimal { raw: s.to_string() };
        let t = s.trim();

        let (negative, digits) = if let Some(rest) = t.strip_prefix('-') {
            (true, rest)
        } else if let Some(rest) = t.strip_prefix('+') {
            (false, rest)
        } else {
            (false, t)
        };

        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) || frac_part.len() > FIXED_DECIMALS {
            return Err(invalid());
        }

        let int_val: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| AccountingError::OutOfRange {
                value: s.to_string(),
            })?
        };
        let mut frac_val: i64 = 0;
        if !frac_part.is_empty() {
            let padded = format!("{frac_part:0<width$}", width = FIXED_DECIMALS);
            frac_val = padded.parse().map_err(|_| invalid())?;
        }

        let raw = int_val
            .checked_mul(FIXED_SCALE)
            .and_then(|v| v.checked_add(frac_val))
            .ok_or_else(|| AccountingError::OutOfRange {
                value: s.to_string(),
            })?;
        Ok(Fixed(if negative { -raw } else { raw }))
    }
}

// ---------------------------------------------------------------------------
// Serde: JSON number out, number or decimal string in
// ---------------------------------------------------------------------------

impl Serialize for Fixed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FixedRepr {
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Fixed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match FixedRepr::deserialize(deserializer)? {
            FixedRepr::Number(x) => Fixed::try_from_f64(x).map_err(serde::de::Error::custom),
            FixedRepr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
