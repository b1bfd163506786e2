use crate::{LedgerError, Result};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A calendar month, e.g. February 2024.
///
/// All month arithmetic goes through this type so that the January to December wrap is done on
/// numbers, never by manipulating date strings.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Fails with `LedgerError::InvalidPeriod` unless `month` is 1 through 12 and the first day of
    /// the month is representable.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|_| Self { year, month })
            .ok_or(LedgerError::InvalidPeriod { year, month })
    }

    /// The month that contains `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The first day of the month. Everything strictly before it counts toward the opening balance.
    pub fn first_day(&self) -> NaiveDate {
        // The constructors guarantee this date exists.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// The immediately preceding calendar month; January wraps to December of the prior year.
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The immediately following calendar month; December wraps to January of the next year.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = LedgerError;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || LedgerError::Configuration(format!("'{s}' is not a YYYY-MM month"));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        YearMonth::new(year, month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    #[test]
    fn test_invalid_month() {
        assert!(matches!(
            YearMonth::new(2024, 13),
            Err(LedgerError::InvalidPeriod {
                year: 2024,
                month: 13
            })
        ));
        assert!(YearMonth::new(2024, 0).is_err());
    }

    #[test]
    fn test_previous_wraps_january() {
        assert_eq!(ym(2024, 1).previous(), ym(2023, 12));
        assert_eq!(ym(2024, 3).previous(), ym(2024, 2));
    }

    #[test]
    fn test_next_wraps_december() {
        assert_eq!(ym(2023, 12).next(), ym(2024, 1));
        assert_eq!(ym(2024, 2).next(), ym(2024, 3));
    }

    #[test]
    fn test_contains_and_first_day() {
        let feb = ym(2024, 2);
        assert_eq!(feb.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert!(feb.contains(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(!feb.contains(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert!(!feb.contains(NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()));
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(ym(2024, 2).to_string(), "2024-02");
        assert_eq!(YearMonth::from_str("2024-02").unwrap(), ym(2024, 2));
        assert!(YearMonth::from_str("2024/02").is_err());
        assert!(YearMonth::from_str("2024-14").is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(ym(2023, 12) < ym(2024, 1));
        assert!(ym(2024, 1) < ym(2024, 2));
    }
}
