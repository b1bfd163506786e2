use crate::model::{Kind, Transaction};
use crate::report::YearMonth;
use crate::{LedgerError, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// The total of one category within a period, and its share of the period's total for the same
/// kind of transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CategoryTotal {
    category: String,
    total: u64,
    /// Percentage of the kind's total, 0.0 when that total is zero.
    share: f64,
}

impl CategoryTotal {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn share(&self) -> f64 {
        self.share
    }
}

/// Balance and category breakdown for one calendar month. Derived, never persisted.
///
/// `closing_balance == opening_balance + income_total - expense_total` always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MonthlyReport {
    period: YearMonth,
    opening_balance: i128,
    income_total: u64,
    expense_total: u64,
    closing_balance: i128,
    expense_by_category: Vec<CategoryTotal>,
    income_by_category: Vec<CategoryTotal>,
    transaction_count: usize,
}

impl MonthlyReport {
    pub fn period(&self) -> YearMonth {
        self.period
    }

    pub fn year(&self) -> i32 {
        self.period.year()
    }

    pub fn month(&self) -> u32 {
        self.period.month()
    }

    /// Net of every transaction strictly before the first day of the month.
    pub fn opening_balance(&self) -> i128 {
        self.opening_balance
    }

    pub fn income_total(&self) -> u64 {
        self.income_total
    }

    pub fn expense_total(&self) -> u64 {
        self.expense_total
    }

    pub fn closing_balance(&self) -> i128 {
        self.closing_balance
    }

    pub fn net_change(&self) -> i128 {
        self.closing_balance - self.opening_balance
    }

    /// Sorted by total descending, then category name ascending.
    pub fn expense_by_category(&self) -> &[CategoryTotal] {
        &self.expense_by_category
    }

    /// Sorted by total descending, then category name ascending.
    pub fn income_by_category(&self) -> &[CategoryTotal] {
        &self.income_by_category
    }

    /// Number of transactions that fall within the month.
    pub fn transaction_count(&self) -> usize {
        self.transaction_count
    }
}

/// Builds the report for `period` from the full transaction log.
///
/// The log is in insertion order, which need not be chronological, so it is sorted by timestamp
/// before being split into "before the month" and "within the month" by calendar date.
pub fn monthly_report(transactions: &[Transaction], period: YearMonth) -> Result<MonthlyReport> {
    let sorted = sorted_by_timestamp(transactions);
    let first_day = period.first_day();

    let opening_balance: i128 = sorted
        .iter()
        .take_while(|t| t.date() < first_day)
        .map(|t| t.signed_amount())
        .sum();

    let tally = Tally::of(sorted.iter().copied(), period)?;
    let closing_balance = opening_balance + i128::from(tally.income_total)
        - i128::from(tally.expense_total);

    Ok(MonthlyReport {
        period,
        opening_balance,
        income_total: tally.income_total,
        expense_total: tally.expense_total,
        closing_balance,
        expense_by_category: breakdown(&tally.expense_by_category, tally.expense_total),
        income_by_category: breakdown(&tally.income_by_category, tally.income_total),
        transaction_count: tally.count,
    })
}

/// `part` as a percentage of `whole`, or 0.0 when `whole` is zero.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Stable sort, so same-second transactions keep their insertion order.
pub(super) fn sorted_by_timestamp(transactions: &[Transaction]) -> Vec<&Transaction> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by_key(|t| t.timestamp());
    sorted
}

/// Income and expense totals, overall and per category, for the transactions within one month.
#[derive(Debug, Default)]
pub(super) struct Tally {
    pub(super) income_total: u64,
    pub(super) expense_total: u64,
    pub(super) income_by_category: BTreeMap<String, u64>,
    pub(super) expense_by_category: BTreeMap<String, u64>,
    pub(super) count: usize,
}

impl Tally {
    pub(super) fn of<'a>(
        transactions: impl IntoIterator<Item = &'a Transaction>,
        period: YearMonth,
    ) -> Result<Self> {
        let mut tally = Tally::default();
        for t in transactions.into_iter().filter(|t| period.contains(t.date())) {
            let amount = t.amount().value();
            let (total, by_category) = match t.kind() {
                Kind::Income => (&mut tally.income_total, &mut tally.income_by_category),
                Kind::Expense => (&mut tally.expense_total, &mut tally.expense_by_category),
            };
            *total = checked_add(*total, amount, period)?;
            let category_total = by_category.entry(t.category().to_string()).or_default();
            *category_total = checked_add(*category_total, amount, period)?;
            tally.count += 1;
        }
        Ok(tally)
    }
}

fn checked_add(a: u64, b: u64, period: YearMonth) -> Result<u64> {
    a.checked_add(b)
        .ok_or_else(|| LedgerError::Overflow(format!("the totals for {period}")))
}

/// Orders category totals by total descending, breaking ties by name ascending.
pub(super) fn breakdown(by_category: &BTreeMap<String, u64>, whole: u64) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = by_category
        .iter()
        .map(|(category, &total)| CategoryTotal {
            category: category.clone(),
            total,
            share: percentage(total, whole),
        })
        .collect();
    totals.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.category.cmp(&b.category))
    });
    totals
}
