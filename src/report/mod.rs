//! Pure, deterministic reports derived from the transaction log.
//!
//! Nothing here talks to the remote table. Given the same transactions and period, a report is
//! always the same.

mod compare;
mod monthly;
mod period;

pub use compare::{compare, CategoryComparison, ComparisonReport, Delta, PeriodSummary};
pub use monthly::{monthly_report, percentage, CategoryTotal, MonthlyReport};
pub use period::YearMonth;
