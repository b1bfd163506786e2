use crate::commands::Out;
use crate::Config;
use anyhow::{Context, Result};
use std::path::Path;

/// Creates the data directory, its secrets subdirectory and:
/// - Creates an initial `config.json` file using `sheet_url` along with default settings
/// - Moves `credentials_file` into its default location in the data dir.
///
/// # Arguments
/// - `ledger_home` - The directory that will be the root of data directory, e.g. `$HOME/ledger`
/// - `credentials_file` - The downloaded service account key.
/// - `sheet_url` - The URL of the Google Sheet where the ledger is kept.
///   e.g.https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
///
/// # Errors
/// - Returns an error if the key is unusable or if any file operations fail.
pub async fn init(ledger_home: &Path, credentials_file: &Path, url: &str) -> Result<Out<()>> {
    let config = Config::create(ledger_home, credentials_file, url)
        .await
        .context("Unable to create the data directory and configs")?;
    Ok(format!(
        "Successfully created the ledger directory and config at {}",
        config.root().display()
    )
    .into())
}
