//! Implements the `Sheet` and `Connector` traits using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets.

use crate::api::{Connector, Sheet};
use crate::{LedgerError, Result};
use std::collections::{BTreeMap, VecDeque};
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::trace;

/// An error that the in-memory backend can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    RateLimited,
    Unavailable,
    Authentication,
}

impl Fault {
    fn error(self, operation: &str) -> LedgerError {
        let message = format!("injected fault during {operation}");
        match self {
            Fault::RateLimited => LedgerError::RateLimited(message),
            Fault::Unavailable => LedgerError::Unavailable(message),
            Fault::Authentication => LedgerError::Authentication(message),
        }
    }
}

/// Everything the in-memory spreadsheet holds, plus the faults queued for upcoming calls.
#[derive(Debug, Default)]
struct TestSheetState {
    tables: BTreeMap<String, Vec<Vec<String>>>,
    connect_faults: VecDeque<Fault>,
    /// One entry per upcoming table operation; `None` lets that operation through.
    operation_faults: VecDeque<Option<Fault>>,
    connect_delay: Duration,
    connects: u32,
    operations: u32,
}

/// A `Connector` for an in-memory spreadsheet. Clones share the same spreadsheet, so a test can
/// keep one to inspect and manipulate what the code under test sees.
#[derive(Debug, Clone, Default)]
pub struct TestConnector {
    state: Arc<Mutex<TestSheetState>>,
}

impl TestConnector {
    /// An empty spreadsheet with no tabs.
    pub fn new() -> Self {
        Self::default()
    }

    /// A spreadsheet whose `table` tab is loaded with the seed data from this module.
    pub fn seeded(table: &str) -> std::result::Result<Self, csv::Error> {
        let connector = Self::new();
        connector.put_rows(table, load_csv(SEED_TRANSACTIONS)?);
        Ok(connector)
    }

    /// Replaces the contents of `table`, creating it if needed.
    pub fn put_rows(&self, table: &str, rows: Vec<Vec<String>>) {
        self.lock().tables.insert(table.to_string(), rows);
    }

    /// The current contents of `table`, header included.
    pub fn rows(&self, table: &str) -> Option<Vec<Vec<String>>> {
        self.lock().tables.get(table).cloned()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.lock().tables.contains_key(table)
    }

    /// The next `times` calls to `connect` fail with `fault`.
    pub fn fail_connects(&self, fault: Fault, times: usize) {
        self.lock()
            .connect_faults
            .extend(std::iter::repeat(fault).take(times));
    }

    /// The next `times` table operations, on any handle, fail with `fault`.
    pub fn fail_operations(&self, fault: Fault, times: usize) {
        self.lock()
            .operation_faults
            .extend(std::iter::repeat(Some(fault)).take(times));
    }

    /// Lets the next `skip` table operations through, then fails the one after with `fault`.
    pub fn fail_operations_after(&self, skip: usize, fault: Fault) {
        let mut state = self.lock();
        state
            .operation_faults
            .extend(std::iter::repeat(None).take(skip));
        state.operation_faults.push_back(Some(fault));
    }

    /// Makes every `connect` take at least `delay`, so that concurrent callers overlap.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.lock().connect_delay = delay;
    }

    /// How many times `connect` has been called, failures included.
    pub fn connects(&self) -> u32 {
        self.lock().connects
    }

    /// How many table operations have been attempted, failures included.
    pub fn operations(&self) -> u32 {
        self.lock().operations
    }

    fn lock(&self) -> MutexGuard<'_, TestSheetState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl Connector for TestConnector {
    async fn connect(&self) -> Result<Arc<dyn Sheet>> {
        let delay = self.lock().connect_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.lock();
        state.connects += 1;
        trace!("test connect #{}", state.connects);
        if let Some(fault) = state.connect_faults.pop_front() {
            return Err(fault.error("connect"));
        }
        Ok(Arc::new(TestSheet {
            connector: self.clone(),
        }))
    }
}

/// A handle to the in-memory spreadsheet of a `TestConnector`.
#[derive(Debug)]
pub struct TestSheet {
    connector: TestConnector,
}

impl TestSheet {
    /// Locks the state, counting the call and returning an injected fault if one is queued.
    fn begin(&self, operation: &str) -> Result<MutexGuard<'_, TestSheetState>> {
        let mut state = self.connector.lock();
        state.operations += 1;
        match state.operation_faults.pop_front() {
            Some(Some(fault)) => Err(fault.error(operation)),
            _ => Ok(state),
        }
    }
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn tables(&self) -> Result<Vec<String>> {
        let state = self.begin("tables")?;
        Ok(state.tables.keys().cloned().collect())
    }

    async fn create_table(&self, table: &str) -> Result<()> {
        let mut state = self.begin("create_table")?;
        if state.tables.contains_key(table) {
            return Err(LedgerError::Remote(format!(
                "A sheet with the name '{table}' already exists"
            )));
        }
        state.tables.insert(table.to_string(), Vec::new());
        Ok(())
    }

    async fn header(&self, table: &str) -> Result<Vec<String>> {
        let state = self.begin("header")?;
        let rows = state.tables.get(table).ok_or_else(|| missing(table))?;
        Ok(rows.first().cloned().unwrap_or_default())
    }

    async fn set_header(&self, table: &str, header: &[&str]) -> Result<()> {
        let mut state = self.begin("set_header")?;
        let rows = state.tables.get_mut(table).ok_or_else(|| missing(table))?;
        let header: Vec<String> = header.iter().map(|s| s.to_string()).collect();
        match rows.first_mut() {
            Some(first) => *first = header,
            None => rows.push(header),
        }
        Ok(())
    }

    async fn get(&self, table: &str) -> Result<Vec<Vec<String>>> {
        let state = self.begin("get")?;
        state.tables.get(table).cloned().ok_or_else(|| missing(table))
    }

    async fn append(&self, table: &str, row: &[String]) -> Result<()> {
        let mut state = self.begin("append")?;
        let rows = state.tables.get_mut(table).ok_or_else(|| missing(table))?;
        rows.push(row.to_vec());
        Ok(())
    }
}

/// The error the Sheets API gives for a range on a tab that does not exist.
fn missing(table: &str) -> LedgerError {
    LedgerError::Remote(format!("Unable to parse range: '{table}'!A:E"))
}

/// Loads data from a CSV-formatted string.
fn load_csv(csv_data: &str) -> std::result::Result<Vec<Vec<String>>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Seed transaction data.
const SEED_TRANSACTIONS: &str = r##"Date,Type,Amount,Category,Description
2024-01-15 09:00:00,Income,5000000,gaji,January salary
2024-01-20 19:30:00,Expense,350000,makanan,Groceries
2024-01-28 08:10:00,Expense,120000,transport,Fuel
2024-02-01 12:15:00,Expense,150000,makanan,Lunch with team
2024-02-10 16:45:00,Expense,50000,makanan,Snacks
2024-02-14 20:00:00,Expense,275000,hiburan,Cinema
2024-02-25 09:00:00,Income,5000000,gaji,February salary
2024-02-27 10:20:00,Income,750000,freelance,
"##;
