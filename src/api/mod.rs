//! The remote tabular store: a spreadsheet made of named tables (tabs) of string cells.
//!
//! `Connector` authenticates and opens the spreadsheet, yielding a `Sheet` handle. Two backends
//! exist: Google Sheets and an in-memory spreadsheet for tests and test mode.

mod credentials;
mod oauth;
mod sheet;
mod sheet_test_client;

use crate::Result;
use std::fmt::Debug;
use std::sync::Arc;

pub use credentials::{CredentialProvider, InlineKey, KeyFile, ServiceAccountKey, CREDENTIALS_JSON_ENV};
pub use sheet_test_client::{Fault, TestConnector, TestSheet};

/// The OAuth scope needed to read and append rows and to add tabs.
const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Setting this environment variable to a non-empty value selects `Mode::Test`.
pub const TEST_MODE_ENV: &str = "LEDGER_IN_TEST_MODE";

/// An open spreadsheet. Implementations must be safe to share between tasks.
#[async_trait::async_trait]
pub trait Sheet: Debug + Send + Sync {
    /// The names of the tables in the spreadsheet.
    async fn tables(&self) -> Result<Vec<String>>;

    /// Adds an empty table.
    async fn create_table(&self, table: &str) -> Result<()>;

    /// The first row of `table`, empty when the table has no rows.
    async fn header(&self, table: &str) -> Result<Vec<String>>;

    /// Writes `header` over the first row of `table`. Repeating the call is harmless.
    async fn set_header(&self, table: &str, header: &[&str]) -> Result<()>;

    /// Every non-empty row of `table`, header included. Trailing empty cells may be omitted.
    async fn get(&self, table: &str) -> Result<Vec<Vec<String>>>;

    /// Appends `row` after the last row of `table`.
    async fn append(&self, table: &str, row: &[String]) -> Result<()>;
}

/// Authenticates against the remote store and opens the spreadsheet.
#[async_trait::async_trait]
pub trait Connector: Debug + Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn Sheet>>;
}

/// Selects which backend is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Google,
    Test,
}

impl Mode {
    /// `Mode::Test` when `LEDGER_IN_TEST_MODE` is set and non-empty, otherwise `Mode::Google`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Google,
        }
    }
}

/// Creates a connector to the Google spreadsheet `spreadsheet_id`.
pub fn google_connector(
    spreadsheet_id: impl Into<String>,
    credentials: Arc<dyn CredentialProvider>,
) -> Arc<dyn Connector> {
    Arc::new(sheet::GoogleConnector::new(spreadsheet_id, credentials))
}
