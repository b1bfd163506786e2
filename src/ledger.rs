//! The `Ledger` is what command handlers talk to: record a transaction, ask for a report.

use crate::clock::Clock;
use crate::connection::ConnectionState;
use crate::model::{Amount, Kind, Transaction};
use crate::report::{self, ComparisonReport, MonthlyReport, YearMonth};
use crate::store::LedgerStore;
use crate::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// The result of a health check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Status {
    connection: ConnectionState,
    table: String,
    transaction_count: usize,
}

impl Status {
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn transaction_count(&self) -> usize {
        self.transaction_count
    }
}

/// Records transactions and produces reports. Timestamps and "the current month" are taken from
/// the clock in the store's fixed UTC offset, which is the wall-clock time written to the sheet.
#[derive(Debug, Clone)]
pub struct Ledger {
    store: LedgerStore,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(store: LedgerStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// The current local wall-clock time.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now().with_timezone(&self.store.offset()).naive_local()
    }

    /// The month that contains the current local date.
    pub fn current_period(&self) -> YearMonth {
        YearMonth::of(self.now().date())
    }

    /// Appends a transaction stamped with the current local time and returns it as stored, i.e.
    /// with its category and description normalized.
    pub async fn append_transaction(
        &self,
        kind: Kind,
        amount: Amount,
        category: &str,
        description: &str,
    ) -> Result<Transaction> {
        let transaction = Transaction::new(self.now(), kind, amount, category, description);
        self.store.append(&transaction).await?;
        info!(
            "Recorded {} of {} in '{}'",
            transaction.kind(),
            transaction.amount(),
            transaction.category()
        );
        Ok(transaction)
    }

    pub async fn monthly_report(&self, year: i32, month: u32) -> Result<MonthlyReport> {
        let period = YearMonth::new(year, month)?;
        self.report_for(period).await
    }

    pub async fn current_monthly_report(&self) -> Result<MonthlyReport> {
        self.report_for(self.current_period()).await
    }

    /// Compares the current calendar month with the one before it.
    pub async fn comparison_report(&self) -> Result<ComparisonReport> {
        let current = self.current_period();
        self.compare_periods(current, current.previous()).await
    }

    /// Compares `year1-month1` (as the current period) with `year2-month2` (as the previous one).
    pub async fn compare(
        &self,
        year1: i32,
        month1: u32,
        year2: i32,
        month2: u32,
    ) -> Result<ComparisonReport> {
        let current = YearMonth::new(year1, month1)?;
        let previous = YearMonth::new(year2, month2)?;
        self.compare_periods(current, previous).await
    }

    /// Reads the whole ledger, which exercises the connection, and reports what it found.
    pub async fn status(&self) -> Result<Status> {
        let transactions = self.store.read_all().await?;
        let connection = self.store.connection();
        Ok(Status {
            connection: connection.state(),
            table: connection.table().to_string(),
            transaction_count: transactions.len(),
        })
    }

    async fn report_for(&self, period: YearMonth) -> Result<MonthlyReport> {
        let transactions = self.store.read_all().await?;
        report::monthly_report(&transactions, period)
    }

    async fn compare_periods(
        &self,
        current: YearMonth,
        previous: YearMonth,
    ) -> Result<ComparisonReport> {
        let transactions = self.store.read_all().await?;
        report::compare(&transactions, current, previous)
    }
}
