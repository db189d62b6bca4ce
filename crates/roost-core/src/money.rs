//! # Money Module
//!
//! Provides the `Money` type for unit prices.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │                                                                         │
//! │  A price history that stores 119.99999999 instead of 120.00 is a       │
//! │  history that can't be compared for equality.                          │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    "120.50" is parsed once at the edge into 12050 and never rounded    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use roost_core::money::Money;
//!
//! let price = Money::from_cents(12050);
//! assert_eq!(price.to_string(), "120.50");
//!
//! let parsed: Money = "120.5".parse().unwrap();
//! assert_eq!(parsed, price);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A decimal amount held in the smallest currency unit.
///
/// Signed so arithmetic never has to special-case a difference, but the
/// engine only ever persists positive prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use roost_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

// =============================================================================
// Parsing & Formatting
// =============================================================================

/// Why a decimal string could not become [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseMoneyError {
    #[error("amount is empty")]
    Empty,

    #[error("'{0}' is not a decimal amount")]
    InvalidFormat(String),

    #[error("'{0}' has more than two fractional digits")]
    TooPrecise(String),

    #[error("'{0}' is out of range")]
    OutOfRange(String),
}

/// Parses `"120"`, `"120.5"`, `"120.50"` and `"-3.10"`.
///
/// Anything finer than cents is rejected instead of rounded, so a price
/// never silently changes on the way in.
impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseMoneyError::Empty);
        }

        let (negative, unsigned) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (major_str, minor_str) = match unsigned.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (unsigned, ""),
        };

        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if major_str.is_empty() || !all_digits(major_str) || !all_digits(minor_str) {
            return Err(ParseMoneyError::InvalidFormat(s.to_string()));
        }
        if unsigned.ends_with('.') {
            return Err(ParseMoneyError::InvalidFormat(s.to_string()));
        }
        if minor_str.len() > 2 {
            return Err(ParseMoneyError::TooPrecise(s.to_string()));
        }

        let major: i64 = major_str
            .parse()
            .map_err(|_| ParseMoneyError::OutOfRange(s.to_string()))?;
        let minor: i64 = match minor_str.len() {
            0 => 0,
            1 => minor_str.parse::<i64>().unwrap_or(0) * 10,
            _ => minor_str.parse::<i64>().unwrap_or(0),
        };

        let cents = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(|| ParseMoneyError::OutOfRange(s.to_string()))?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

/// Plain decimal with two fractional digits, no currency symbol.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
