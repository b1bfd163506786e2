//! Typed access to the ledger table: append one transaction, or read them all.

use crate::api::Sheet;
use crate::connection::ConnectionManager;
use crate::model::{Transaction, HEADER};
use crate::retry::RetryPolicy;
use crate::{LedgerError, Result};
use chrono::FixedOffset;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace};

/// Reads and appends `Transaction`s through the shared connection, retrying transient failures.
/// `offset` is the ledger's local time; timestamps that carry another offset are converted to it.
///
/// Appends are at-least-once: if a write reaches the sheet but its acknowledgement is lost to a
/// transient error, the retry writes the row a second time.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    connection: Arc<ConnectionManager>,
    offset: FixedOffset,
    retry: RetryPolicy,
}

impl LedgerStore {
    pub fn new(connection: Arc<ConnectionManager>, offset: FixedOffset) -> Self {
        Self {
            connection,
            offset,
            retry: RetryPolicy::operation_default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Appends `transaction` as a new row at the end of the table.
    pub async fn append(&self, transaction: &Transaction) -> Result<()> {
        let table = self.connection.table();
        let row = &transaction.to_row();
        self.with_sheet("append", move |sheet| async move {
            sheet.append(table, row).await
        })
        .await?;
        debug!("Appended {} {} to '{table}'", transaction.kind(), transaction.amount());
        Ok(())
    }

    /// Reads every transaction in insertion order.
    ///
    /// The header row must match exactly. Fully blank rows are skipped. Any other row that cannot be
    /// parsed fails the whole read with `LedgerError::Decode`, naming its sheet row number.
    pub async fn read_all(&self) -> Result<Vec<Transaction>> {
        let table = self.connection.table();
        let rows = self
            .with_sheet("read", move |sheet| async move { sheet.get(table).await })
            .await?;
        let transactions = parse_rows(&rows, self.offset)?;
        trace!("Read {} transactions from '{table}'", transactions.len());
        Ok(transactions)
    }

    /// Runs `operation` against a live session under the retry policy. Success resets the idle
    /// timer; an authentication failure drops the session so that the next attempt reconnects.
    async fn with_sheet<T, F, Fut>(&self, name: &str, operation: F) -> Result<T>
    where
        F: Fn(Arc<dyn Sheet>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let connection = &self.connection;
        let operation = &operation;
        self.retry
            .execute(name, move || async move {
                let sheet = connection.handle().await?;
                let result = operation(sheet).await;
                match &result {
                    Ok(_) => connection.mark_used(),
                    Err(e) if e.is_authentication() => connection.invalidate(),
                    Err(_) => {}
                }
                result
            })
            .await
    }
}

fn parse_rows(rows: &[Vec<String>], offset: FixedOffset) -> Result<Vec<Transaction>> {
    let Some(header) = rows.first() else {
        return Ok(Vec::new());
    };
    check_header(header)?;

    let mut transactions = Vec::with_capacity(rows.len().saturating_sub(1));
    for (ix, row) in rows.iter().enumerate().skip(1) {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let transaction = Transaction::from_row(row, offset).map_err(|e| LedgerError::Decode {
            row: ix + 1,
            reason: e.to_string(),
        })?;
        transactions.push(transaction);
    }
    Ok(transactions)
}

fn check_header(header: &[String]) -> Result<()> {
    let found: Vec<&str> = header.iter().map(|s| s.trim()).collect();
    let trimmed = match found.iter().rposition(|s| !s.is_empty()) {
        Some(last) => &found[..=last],
        None => &found[..0],
    };
    if trimmed == HEADER {
        Ok(())
    } else {
        Err(LedgerError::Decode {
            row: 1,
            reason: format!("expected the header {HEADER:?} but found {trimmed:?}"),
        })
    }
}
