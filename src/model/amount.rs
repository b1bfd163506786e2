//! Amount type for monetary values in the smallest currency unit.
//!
//! Amounts are whole, non-negative numbers. The direction of money (in or out) is carried by the
//! transaction's `Kind`, never by the sign of the amount.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;

/// Represents an amount of money in the smallest currency unit, e.g. `5000000` rupiah.
///
/// # Examples
///
/// Parsing tolerates thousands separators, as the sheet may render them:
/// ```
/// # use sheet_ledger::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("5,000,000").unwrap();
/// assert_eq!(amount.value(), 5_000_000);
/// assert_eq!(amount.to_string(), "5,000,000");
/// ```
///
/// But never silently turns bad data into zero:
/// ```
/// # use sheet_ledger::model::Amount;
/// # use std::str::FromStr;
/// assert!(Amount::from_str("").is_err());
/// assert!(Amount::from_str("-50").is_err());
/// assert!(Amount::from_str("12.50").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    pub const fn value(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The unformatted cell value written to the sheet.
    pub fn to_cell(&self) -> String {
        self.0.to_string()
    }
}

/// An error that can occur when parsing strings into `Amount` values.
#[derive(Clone, PartialEq, Eq)]
pub enum AmountError {
    Empty,
    Negative(String),
    Fractional(String),
    Invalid(String, ParseIntError),
}

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Empty => write!(f, "the amount is empty"),
            AmountError::Negative(s) => write!(f, "the amount '{s}' is negative"),
            AmountError::Fractional(s) => {
                write!(f, "the amount '{s}' has a fractional part")
            }
            AmountError::Invalid(s, e) => write!(f, "the amount '{s}' is not a number: {e}"),
        }
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AmountError::Invalid(_, e) => Some(e),
            _ => None,
        }
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }
        if trimmed.starts_with('-') {
            return Err(AmountError::Negative(trimmed.to_string()));
        }
        if trimmed.contains('.') {
            return Err(AmountError::Fractional(trimmed.to_string()));
        }

        // Remove commas (thousand separators)
        let without_commas = trimmed.replace(',', "");
        let value = without_commas
            .parse::<u64>()
            .map_err(|e| AmountError::Invalid(trimmed.to_string(), e))?;
        Ok(Amount(value))
    }
}

/// Writes `value` with its digits grouped in threes by commas, e.g. `-1,234,567`.
pub fn group_digits(value: i128) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&group_digits(self.0.into()))
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Amount(u64::deserialize(deserializer)?))
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(value)
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}
