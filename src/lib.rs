//! A personal income and expense ledger kept in a Google Sheet.
//!
//! `LedgerStore` appends and reads typed `Transaction`s through a `ConnectionManager`, which owns
//! the one session with the sheet and retries connection failures with a `RetryPolicy`. The
//! `report` module turns the transaction list into monthly balance reports and month-over-month
//! comparisons. `Ledger` ties these together for the command layer.

pub mod api;
pub mod args;
pub mod clock;
pub mod commands;
mod config;
pub mod connection;
mod error;
mod ledger;
pub mod model;
pub mod report;
pub mod retry;
pub mod store;
mod utils;


pub use api::Mode;
pub use config::Config;
pub use error::{LedgerError, Result};
pub use ledger::{Ledger, Status};
