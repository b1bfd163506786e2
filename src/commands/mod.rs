//! Command handlers for the ledger CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod init;
mod record;
mod report;
mod status;

use crate::api::{self, CredentialProvider, InlineKey, KeyFile, Mode, TestConnector};
use crate::clock::SystemClock;
use crate::connection::ConnectionManager;
use crate::store::LedgerStore;
use crate::{Config, Ledger};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

pub use init::init;
pub use record::record;
pub use report::{compare, report};
pub use status::status;

/// The output type for a command: a message for the user and, optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Wires a `Ledger` to the backend selected by `mode`, using the settings in `config`.
///
/// In `Mode::Google` the service account key is taken from `LEDGER_CREDENTIALS_JSON` when that is
/// set, otherwise from the configured key file. In `Mode::Test` the ledger starts from a seeded
/// in-memory sheet that lives only as long as the process.
pub(crate) async fn open_ledger(config: &Config, mode: Mode) -> Result<Ledger> {
    let connector: Arc<dyn api::Connector> = match mode {
        Mode::Google => {
            let credentials: Arc<dyn CredentialProvider> = match InlineKey::from_env() {
                Some(inline) => {
                    debug!("Using the service account key from {}", api::CREDENTIALS_JSON_ENV);
                    Arc::new(inline)
                }
                None => Arc::new(KeyFile::new(config.credentials_path())),
            };
            api::google_connector(config.spreadsheet_id(), credentials)
        }
        Mode::Test => {
            debug!("Using the in-memory test sheet");
            Arc::new(
                TestConnector::seeded(config.table_name())
                    .context("Unable to load the test sheet")?,
            )
        }
    };

    let connection = ConnectionManager::new(connector, Arc::new(SystemClock), config.table_name())
        .with_limits(config.session_limits())
        .with_retry(config.connect_retry())
        .with_auto_provision(config.auto_provision());
    let store = LedgerStore::new(Arc::new(connection), config.utc_offset()?)
        .with_retry(config.operation_retry());
    Ok(Ledger::new(store, Arc::new(SystemClock)))
}
