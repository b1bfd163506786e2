use crate::model::{Amount, AmountError};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The column headers of the ledger table, in order. The header row must match exactly.
pub const HEADER: [&str; 5] = [DATE_STR, TYPE_STR, AMOUNT_STR, CATEGORY_STR, DESCRIPTION_STR];

pub(super) const DATE_STR: &str = "Date";
pub(super) const TYPE_STR: &str = "Type";
pub(super) const AMOUNT_STR: &str = "Amount";
pub(super) const CATEGORY_STR: &str = "Category";
pub(super) const DESCRIPTION_STR: &str = "Description";

/// The category used when none is given.
pub const DEFAULT_CATEGORY: &str = "uncategorized";

/// Descriptions longer than this many characters are truncated.
pub const MAX_DESCRIPTION_CHARS: usize = 100;
const ELLIPSIS: &str = "...";

/// The format timestamps are written in. It sorts correctly as plain text in the sheet.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Whether money came in or went out.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Kind {
    #[serde(alias = "income", alias = "Pemasukan", alias = "masuk")]
    Income,
    #[serde(alias = "expense", alias = "Pengeluaran", alias = "keluar")]
    Expense,
}

serde_plain::derive_display_from_serialize!(Kind);
serde_plain::derive_fromstr_from_deserialize!(Kind);

/// Represents a single row of the ledger table.
///
/// Construction normalizes the category and description, so a `Transaction` read back from the
/// sheet compares equal to the one that was appended.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    timestamp: NaiveDateTime,
    kind: Kind,
    amount: Amount,
    category: String,
    description: String,
}

impl Transaction {
    pub fn new(
        timestamp: NaiveDateTime,
        kind: Kind,
        amount: Amount,
        category: impl AsRef<str>,
        description: impl AsRef<str>,
    ) -> Self {
        Self {
            timestamp: truncate_subseconds(timestamp),
            kind,
            amount,
            category: normalize_category(category.as_ref()),
            description: normalize_description(description.as_ref()),
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The signed effect of this transaction on the balance.
    pub fn signed_amount(&self) -> i128 {
        let value = i128::from(self.amount.value());
        match self.kind {
            Kind::Income => value,
            Kind::Expense => -value,
        }
    }

    /// Serializes into the table's row schema `[Date, Type, Amount, Category, Description]`.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.kind.to_string(),
            self.amount.to_cell(),
            self.category.clone(),
            self.description.clone(),
        ]
    }

    /// Parses a row of cells. The API omits trailing empty cells, so a short row is fine as long as
    /// the required columns are present.
    ///
    /// Timestamps without an offset are already the ledger's wall-clock time. A timestamp that
    /// carries its own offset is converted to `offset`, the ledger's.
    pub fn from_row<S: AsRef<str>>(cells: &[S], offset: FixedOffset) -> Result<Self, RowError> {
        if cells.len() > HEADER.len() {
            return Err(RowError::TooLong(cells.len()));
        }
        let cell = |ix: usize| cells.get(ix).map(|s| s.as_ref().trim()).unwrap_or("");

        let timestamp = parse_timestamp(cell(0), offset)?;
        let kind = match cell(1) {
            "" => return Err(RowError::Missing(TYPE_STR)),
            s => Kind::from_str(s).map_err(|_| RowError::Kind(s.to_string()))?,
        };
        let amount = Amount::from_str(cell(2)).map_err(RowError::Amount)?;
        Ok(Transaction::new(timestamp, kind, amount, cell(3), cell(4)))
    }
}

/// Why a row could not be turned into a `Transaction`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("the '{0}' column is empty")]
    Missing(&'static str),
    #[error("'{0}' is not a recognized timestamp")]
    Timestamp(String),
    #[error("'{0}' is neither Income nor Expense")]
    Kind(String),
    #[error("{0}")]
    Amount(AmountError),
    #[error("the row has {0} cells but the table only has {n} columns", n = HEADER.len())]
    TooLong(usize),
}

fn parse_timestamp(s: &str, offset: FixedOffset) -> Result<NaiveDateTime, RowError> {
    if s.is_empty() {
        return Err(RowError::Missing(DATE_STR));
    }
    for format in [TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&offset).naive_local());
    }
    Err(RowError::Timestamp(s.to_string()))
}

/// The sheet stores whole seconds, so anything finer would not survive a round trip.
fn truncate_subseconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

fn normalize_category(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('#').unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

fn normalize_description(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= MAX_DESCRIPTION_CHARS {
        return trimmed.to_string();
    }
    let keep = MAX_DESCRIPTION_CHARS - ELLIPSIS.len();
    let mut truncated: String = trimmed.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc7() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn test_kind_display_and_parse() {
        assert_eq!(Kind::Income.to_string(), "Income");
        assert_eq!(Kind::Expense.to_string(), "Expense");
        assert_eq!(Kind::from_str("Income").unwrap(), Kind::Income);
        assert_eq!(Kind::from_str("Pengeluaran").unwrap(), Kind::Expense);
        assert_eq!(Kind::from_str("masuk").unwrap(), Kind::Income);
        assert!(Kind::from_str("Transfer").is_err());
    }

    #[test]
    fn test_category_normalization() {
        let t = Transaction::new(
            ts("2024-02-01 12:00:00"),
            Kind::Expense,
            Amount::new(1),
            "  #Makanan ",
            "",
        );
        assert_eq!(t.category(), "makanan");

        let t = Transaction::new(ts("2024-02-01 12:00:00"), Kind::Expense, Amount::new(1), "", "");
        assert_eq!(t.category(), DEFAULT_CATEGORY);
    }

    #[test]
    fn test_description_truncation() {
        let long = "a".repeat(150);
        let t = Transaction::new(ts("2024-02-01 12:00:00"), Kind::Income, Amount::new(1), "x", &long);
        assert_eq!(t.description().chars().count(), MAX_DESCRIPTION_CHARS);
        assert!(t.description().ends_with("..."));
        assert_eq!(&t.description()[..97], &long[..97]);

        let exact = "b".repeat(100);
        let t = Transaction::new(ts("2024-02-01 12:00:00"), Kind::Income, Amount::new(1), "x", &exact);
        assert_eq!(t.description(), exact);
    }

    #[test]
    fn test_description_truncation_counts_characters() {
        let long = "é".repeat(120);
        let t = Transaction::new(ts("2024-02-01 12:00:00"), Kind::Income, Amount::new(1), "x", &long);
        assert_eq!(t.description().chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn test_row_round_trip() {
        let t = Transaction::new(
            ts("2024-02-10 08:30:00"),
            Kind::Expense,
            Amount::new(50_000),
            "makanan",
            "snack",
        );
        let row = t.to_row();
        assert_eq!(
            row,
            vec!["2024-02-10 08:30:00", "Expense", "50000", "makanan", "snack"]
        );
        assert_eq!(Transaction::from_row(&row, utc7()).unwrap(), t);
    }

    #[test]
    fn test_from_row_short_row_defaults() {
        let t = Transaction::from_row(&["2024-01-15", "Income", "5000000"], utc7()).unwrap();
        assert_eq!(t.category(), DEFAULT_CATEGORY);
        assert_eq!(t.description(), "");
        assert_eq!(t.timestamp(), ts("2024-01-15 00:00:00"));
    }

    #[test]
    fn test_from_row_legacy_values() {
        let t = Transaction::from_row(&["2024-01-15 09:00:00", "Pemasukan", "5,000,000", "gaji"], utc7())
            .unwrap();
        assert_eq!(t.kind(), Kind::Income);
        assert_eq!(t.amount().value(), 5_000_000);
    }

    #[test]
    fn test_from_row_rfc3339() {
        let t = Transaction::from_row(&["2024-03-01T10:00:00+07:00", "Expense", "1"], utc7()).unwrap();
        assert_eq!(t.timestamp(), ts("2024-03-01 10:00:00"));

        // 20:00 UTC on January 31st is already February 1st in the ledger's UTC+7.
        let t = Transaction::from_row(&["2024-01-31T20:00:00Z", "Expense", "1"], utc7()).unwrap();
        assert_eq!(t.timestamp(), ts("2024-02-01 03:00:00"));

        // Without an offset the value is taken as wall-clock time as it stands.
        let t = Transaction::from_row(&["2024-01-31T20:00:00", "Expense", "1"], utc7()).unwrap();
        assert_eq!(t.timestamp(), ts("2024-01-31 20:00:00"));
    }

    #[test]
    fn test_from_row_errors() {
        assert_eq!(
            Transaction::from_row(&["not a date", "Income", "1"], utc7()).unwrap_err(),
            RowError::Timestamp("not a date".into())
        );
        assert_eq!(
            Transaction::from_row(&["2024-01-01", "", "1"], utc7()).unwrap_err(),
            RowError::Missing(TYPE_STR)
        );
        assert!(matches!(
            Transaction::from_row(&["2024-01-01", "Income", "abc"], utc7()).unwrap_err(),
            RowError::Amount(_)
        ));
        assert!(matches!(
            Transaction::from_row(&["2024-01-01", "Income", ""], utc7()).unwrap_err(),
            RowError::Amount(AmountError::Empty)
        ));
        assert_eq!(
            Transaction::from_row(&["2024-01-01", "Income", "1", "a", "b", "c"], utc7()).unwrap_err(),
            RowError::TooLong(6)
        );
    }

    #[test]
    fn test_signed_amount() {
        let income = Transaction::new(ts("2024-01-01 00:00:00"), Kind::Income, Amount::new(10), "", "");
        let expense = Transaction::new(ts("2024-01-01 00:00:00"), Kind::Expense, Amount::new(10), "", "");
        assert_eq!(income.signed_amount(), 10);
        assert_eq!(expense.signed_amount(), -10);
    }
}
