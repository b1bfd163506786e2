use crate::model::Transaction;
use crate::report::monthly::{breakdown, sorted_by_timestamp, CategoryTotal, Tally};
use crate::report::YearMonth;
use crate::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Percentage change from a prior value to a current one.
///
/// When the prior value is zero no percentage exists, and the change is `NotApplicable` rather
/// than an infinite or `NaN` number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delta {
    Percent(f64),
    NotApplicable,
}

impl Delta {
    pub fn between(previous: u64, current: u64) -> Self {
        if previous == 0 {
            return Delta::NotApplicable;
        }
        let diff = i128::from(current) - i128::from(previous);
        Delta::Percent(diff as f64 / previous as f64 * 100.0)
    }

    pub fn percent(&self) -> Option<f64> {
        match self {
            Delta::Percent(p) => Some(*p),
            Delta::NotApplicable => None,
        }
    }
}

impl Display for Delta {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Delta::Percent(p) => write!(f, "{p:+.1}%"),
            Delta::NotApplicable => f.write_str("N/A"),
        }
    }
}

/// Totals for one side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PeriodSummary {
    period: YearMonth,
    income_total: u64,
    expense_total: u64,
    expense_by_category: Vec<CategoryTotal>,
    transaction_count: usize,
}

impl PeriodSummary {
    fn from_tally(period: YearMonth, tally: Tally) -> Self {
        Self {
            period,
            income_total: tally.income_total,
            expense_total: tally.expense_total,
            expense_by_category: breakdown(&tally.expense_by_category, tally.expense_total),
            transaction_count: tally.count,
        }
    }

    pub fn period(&self) -> YearMonth {
        self.period
    }

    pub fn income_total(&self) -> u64 {
        self.income_total
    }

    pub fn expense_total(&self) -> u64 {
        self.expense_total
    }

    /// Income minus expense within the month.
    pub fn net(&self) -> i128 {
        i128::from(self.income_total) - i128::from(self.expense_total)
    }

    pub fn expense_by_category(&self) -> &[CategoryTotal] {
        &self.expense_by_category
    }

    pub fn transaction_count(&self) -> usize {
        self.transaction_count
    }

    fn expense_for(&self, category: &str) -> u64 {
        self.expense_by_category
            .iter()
            .find(|c| c.category() == category)
            .map(|c| c.total())
            .unwrap_or(0)
    }
}

/// How spending in one category moved between the two months.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CategoryComparison {
    category: String,
    current: u64,
    previous: u64,
    change: Delta,
}

impl CategoryComparison {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn previous(&self) -> u64 {
        self.previous
    }

    pub fn change(&self) -> Delta {
        self.change
    }
}

/// A side-by-side view of two months.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ComparisonReport {
    current: PeriodSummary,
    previous: PeriodSummary,
    income_change: Delta,
    expense_change: Delta,
    categories: Vec<CategoryComparison>,
}

impl ComparisonReport {
    pub fn current(&self) -> &PeriodSummary {
        &self.current
    }

    pub fn previous(&self) -> &PeriodSummary {
        &self.previous
    }

    pub fn income_change(&self) -> Delta {
        self.income_change
    }

    pub fn expense_change(&self) -> Delta {
        self.expense_change
    }

    /// Every expense category seen in either month, largest current spend first.
    pub fn categories(&self) -> &[CategoryComparison] {
        &self.categories
    }
}

/// Compares `current` against `previous`. The two months need not be adjacent.
pub fn compare(
    transactions: &[Transaction],
    current: YearMonth,
    previous: YearMonth,
) -> Result<ComparisonReport> {
    let sorted = sorted_by_timestamp(transactions);
    let current = PeriodSummary::from_tally(current, Tally::of(sorted.iter().copied(), current)?);
    let previous =
        PeriodSummary::from_tally(previous, Tally::of(sorted.iter().copied(), previous)?);

    let names: BTreeSet<&str> = current
        .expense_by_category
        .iter()
        .chain(previous.expense_by_category.iter())
        .map(|c| c.category())
        .collect();

    let mut categories: Vec<CategoryComparison> = names
        .into_iter()
        .map(|name| {
            let now = current.expense_for(name);
            let before = previous.expense_for(name);
            CategoryComparison {
                category: name.to_string(),
                current: now,
                previous: before,
                change: Delta::between(before, now),
            }
        })
        .collect();
    categories.sort_by(|a, b| {
        b.current
            .cmp(&a.current)
            .then_with(|| b.previous.cmp(&a.previous))
            .then_with(|| a.category.cmp(&b.category))
    });

    Ok(ComparisonReport {
        income_change: Delta::between(previous.income_total, current.income_total),
        expense_change: Delta::between(previous.expense_total, current.expense_total),
        current,
        previous,
        categories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, Kind};
    use chrono::NaiveDateTime;

    fn tx(date: &str, kind: Kind, amount: u64, category: &str) -> Transaction {
        let ts = NaiveDateTime::parse_from_str(&format!("{date} 09:15:00"), "%Y-%m-%d %H:%M:%S")
            .unwrap();
        Transaction::new(ts, kind, Amount::new(amount), category, "")
    }

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    #[test]
    fn test_delta() {
        assert_eq!(Delta::between(0, 0), Delta::NotApplicable);
        assert_eq!(Delta::between(0, 500), Delta::NotApplicable);
        assert_eq!(Delta::between(200, 250), Delta::Percent(25.0));
        assert_eq!(Delta::between(200, 150), Delta::Percent(-25.0));
        assert_eq!(Delta::between(200, 0), Delta::Percent(-100.0));
    }

    #[test]
    fn test_delta_display() {
        assert_eq!(Delta::Percent(12.5).to_string(), "+12.5%");
        assert_eq!(Delta::Percent(-3.24).to_string(), "-3.2%");
        assert_eq!(Delta::NotApplicable.to_string(), "N/A");
    }

    #[test]
    fn test_example_previous_month_had_no_expenses() {
        let ledger = vec![
            tx("2024-01-15", Kind::Income, 5_000_000, "gaji"),
            tx("2024-02-01", Kind::Expense, 150_000, "makanan"),
            tx("2024-02-10", Kind::Expense, 50_000, "makanan"),
        ];
        let report = compare(&ledger, ym(2024, 2), ym(2024, 1)).unwrap();
        assert_eq!(report.expense_change(), Delta::NotApplicable);
        assert_eq!(report.current().expense_total(), 200_000);
        assert_eq!(report.previous().expense_total(), 0);
        assert_eq!(report.previous().income_total(), 5_000_000);
        assert_eq!(report.income_change(), Delta::Percent(-100.0));
        assert_eq!(report.categories().len(), 1);
        assert_eq!(report.categories()[0].category(), "makanan");
        assert_eq!(report.categories()[0].change(), Delta::NotApplicable);
    }

    #[test]
    fn test_category_union_and_ordering() {
        let ledger = vec![
            tx("2024-01-03", Kind::Expense, 400, "sewa"),
            tx("2024-01-04", Kind::Expense, 100, "makanan"),
            tx("2024-02-03", Kind::Expense, 200, "makanan"),
            tx("2024-02-05", Kind::Expense, 200, "bensin"),
        ];
        let report = compare(&ledger, ym(2024, 2), ym(2024, 1)).unwrap();
        let rows: Vec<(&str, u64, u64)> = report
            .categories()
            .iter()
            .map(|c| (c.category(), c.current(), c.previous()))
            .collect();
        assert_eq!(
            rows,
            vec![("makanan", 200, 100), ("bensin", 200, 0), ("sewa", 0, 400)]
        );
        assert_eq!(report.categories()[0].change(), Delta::Percent(100.0));
        assert_eq!(report.categories()[1].change(), Delta::NotApplicable);
        assert_eq!(report.categories()[2].change(), Delta::Percent(-100.0));
        assert_eq!(report.expense_change(), Delta::Percent(-20.0));
    }

    #[test]
    fn test_non_adjacent_months() {
        let ledger = vec![
            tx("2023-06-01", Kind::Income, 1_000, "gaji"),
            tx("2023-12-01", Kind::Income, 1_500, "gaji"),
        ];
        let report = compare(&ledger, ym(2023, 12), ym(2023, 6)).unwrap();
        assert_eq!(report.income_change(), Delta::Percent(50.0));
        assert_eq!(report.current().net(), 1_500);
        assert!(report.categories().is_empty());
    }

    #[test]
    fn test_serialized_delta() {
        let json = serde_json::to_value(Delta::NotApplicable).unwrap();
        assert_eq!(json, serde_json::json!("not_applicable"));
        let json = serde_json::to_value(Delta::Percent(10.0)).unwrap();
        assert_eq!(json, serde_json::json!({"percent": 10.0}));
    }
}
