//! These structs provide the CLI interface for the ledger CLI.

use crate::model::{Amount, Kind, DEFAULT_CATEGORY};
use crate::report::YearMonth;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// ledger: A personal income and expense ledger kept in a Google Sheet.
///
/// Every transaction is a row in one tab of the sheet. The ledger appends new rows, reads them all
/// back, and computes monthly balance reports and month-over-month comparisons from them.
///
/// You will need a Google Cloud service account that has been given edit access to the sheet.
/// Download its JSON key and pass it to `ledger init`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration file.
    ///
    /// This is the first command you should run.
    ///
    /// - Decide what directory you want to store configuration in and pass this as
    ///   --ledger-home. By default, It will be $HOME/ledger.
    ///
    /// - Get the URL of your Google Sheet and pass it as --sheet-url.
    ///
    /// - Create a service account, share the sheet with its email address, and download its JSON
    ///   key. Pass the key file as --credentials. It will be moved into the data directory.
    Init(InitArgs),
    /// Record an income or an expense.
    Record(RecordArgs),
    /// Show the balance report of one month. Defaults to the current month.
    Report(ReportArgs),
    /// Compare two months. Defaults to the current month against the previous one.
    Compare(CompareArgs),
    /// Check that the sheet can be reached and count the transactions in it.
    Status,
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the ledger configuration and credentials are held. Defaults to
    /// ~/ledger
    #[arg(long, env = "LEDGER_HOME", default_value_t = default_ledger_home())]
    ledger_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, ledger_home: PathBuf) -> Self {
        Self {
            log_level,
            ledger_home: ledger_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn ledger_home(&self) -> &DisplayPath {
        &self.ledger_home
    }
}

/// (Not shown): Args for the `ledger init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL to your Google sheet, or just its id. The URL looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long)]
    sheet_url: String,

    /// The path to your downloaded service account key. This file will be moved to the default
    /// secrets location in the main data directory.
    #[arg(long)]
    credentials: PathBuf,
}

impl InitArgs {
    pub fn new(sheet_url: impl Into<String>, credentials: impl Into<PathBuf>) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            credentials: credentials.into(),
        }
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    pub fn credentials(&self) -> &Path {
        &self.credentials
    }
}

/// (Not shown): Args for the `ledger record` command.
#[derive(Debug, Parser, Clone)]
pub struct RecordArgs {
    /// Income or Expense.
    kind: Kind,

    /// A whole, non-negative amount. Thousands separators are allowed, e.g. 1,500,000
    amount: Amount,

    /// The category, e.g. makanan. It is lowercased and a leading '#' is removed.
    #[arg(long, short, default_value = DEFAULT_CATEGORY)]
    category: String,

    /// A free-form note.
    #[arg(long, short, default_value = "")]
    description: String,
}

impl RecordArgs {
    pub fn new(
        kind: Kind,
        amount: Amount,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            amount,
            category: category.into(),
            description: description.into(),
        }
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
}

/// (Not shown): Args for the `ledger report` command.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    /// The month to report on, as YYYY-MM. Defaults to the current month.
    #[arg(long)]
    month: Option<YearMonth>,
}

impl ReportArgs {
    pub fn new(month: Option<YearMonth>) -> Self {
        Self { month }
    }

    pub fn month(&self) -> Option<YearMonth> {
        self.month
    }
}

/// (Not shown): Args for the `ledger compare` command.
#[derive(Debug, Parser, Clone)]
pub struct CompareArgs {
    /// The month being looked at, as YYYY-MM. Defaults to the current month.
    #[arg(long)]
    current: Option<YearMonth>,

    /// The month it is compared against, as YYYY-MM. Defaults to the month before --current.
    #[arg(long)]
    previous: Option<YearMonth>,
}

impl CompareArgs {
    pub fn new(current: Option<YearMonth>, previous: Option<YearMonth>) -> Self {
        Self { current, previous }
    }

    pub fn current(&self) -> Option<YearMonth> {
        self.current
    }

    pub fn previous(&self) -> Option<YearMonth> {
        self.previous
    }
}

fn default_ledger_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("ledger"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --ledger-home or LEDGER_HOME instead of relying on the default \
                ledger home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("ledger")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record() {
        let args = Args::try_parse_from([
            "ledger",
            "--ledger-home",
            "/tmp/l",
            "record",
            "expense",
            "1,500",
            "-c",
            "#Makanan",
        ])
        .unwrap();
        assert_eq!(args.common().ledger_home().path(), Path::new("/tmp/l"));
        match args.command() {
            Command::Record(record) => {
                assert_eq!(record.kind(), Kind::Expense);
                assert_eq!(record.amount(), Amount::new(1500));
                assert_eq!(record.category(), "#Makanan");
                assert_eq!(record.description(), "");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_compare_and_reject_bad_months() {
        let args =
            Args::try_parse_from(["ledger", "compare", "--current", "2024-01"]).unwrap();
        match args.command() {
            Command::Compare(compare) => {
                assert_eq!(compare.current().map(|m| m.to_string()).as_deref(), Some("2024-01"));
                assert!(compare.previous().is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Args::try_parse_from(["ledger", "report", "--month", "2024-13"]).is_err());
        assert!(Args::try_parse_from(["ledger", "record", "income", "-5"]).is_err());
    }
}
