//! Configuration file handling for the ledger.
//!
//! The configuration file is stored at `$LEDGER_HOME/config.json` and holds the Google Sheet to
//! use, the name of the ledger tab, where the service account key lives, and the tuning knobs for
//! sessions and retries.

use crate::api::{CredentialProvider, KeyFile};
use crate::connection::SessionLimits;
use crate::retry::RetryPolicy;
use crate::utils;
use anyhow::{bail, Context, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "ledger";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const SERVICE_ACCOUNT_JSON: &str = "service_account.json";
const CONFIG_JSON: &str = "config.json";
const DEFAULT_TABLE: &str = "Transactions";
/// UTC+7.
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 7 * 60;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$LEDGER_HOME` and from there it loads `$LEDGER_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet_id: String,
}

impl Config {
    /// Creates the data directory and its secrets subdirectory, then:
    /// - Creates an initial `config.json` file using `sheet_url` along with default settings
    /// - Moves `credentials_file` into its default location in the data dir
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of data directory, e.g. `$HOME/ledger`
    /// - `credentials_file` - The downloaded service account key JSON. It is checked and then moved
    ///   to `.secrets/service_account.json` in the data directory.
    /// - `sheet_url` - The URL of the Google Sheet holding the ledger, or just its id.
    ///
    /// # Errors
    /// - Returns an error if the key or the URL is invalid, or if any file operation fails.
    pub async fn create(
        dir: impl Into<PathBuf>,
        credentials_file: &Path,
        sheet_url: &str,
    ) -> Result<Self> {
        let spreadsheet_id = extract_spreadsheet_id(sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();
        KeyFile::new(credentials_file)
            .key()
            .await
            .context("The credentials file is not a usable service account key")?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the ledger home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets_dir = root.join(SECRETS);
        utils::make_dir(&secrets_dir).await?;
        utils::rename(credentials_file, secrets_dir.join(SERVICE_ACCOUNT_JSON)).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            sheet_url: sheet_url.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets: secrets_dir,
            config_path,
            config_file,
            spreadsheet_id,
        })
    }

    /// This will
    /// - validate that `ledger_home` exists and that the config file exists
    /// - load and validate the config file
    /// - return the loaded configuration object
    pub async fn load(ledger_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = ledger_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Ledger Home is missing")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let spreadsheet_id = extract_spreadsheet_id(&config_file.sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();

        Ok(Self {
            secrets: root.join(SECRETS),
            root,
            config_path,
            config_file,
            spreadsheet_id,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn sheet_url(&self) -> &str {
        &self.config_file.sheet_url
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn table_name(&self) -> &str {
        &self.config_file.table_name
    }

    pub fn auto_provision(&self) -> bool {
        self.config_file.auto_provision
    }

    pub fn session_limits(&self) -> SessionLimits {
        self.config_file.session
    }

    pub fn connect_retry(&self) -> RetryPolicy {
        self.config_file.retry.connect
    }

    pub fn operation_retry(&self) -> RetryPolicy {
        self.config_file.retry.operation
    }

    /// The fixed offset in which transactions are timestamped and months are delimited.
    pub fn utc_offset(&self) -> Result<FixedOffset> {
        let minutes = self.config_file.utc_offset_minutes;
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("utc_offset_minutes is out of range: {minutes}"))
    }

    /// Returns the stored `credentials_path` if it is absolute, otherwise resolves it against the
    /// home directory.
    pub fn credentials_path(&self) -> PathBuf {
        let p = self.config_file.credentials_path();
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// The retry policies for the two kinds of remote work.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct RetrySettings {
    connect: RetryPolicy,
    operation: RetryPolicy,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            connect: RetryPolicy::connect_default(),
            operation: RetryPolicy::operation_default(),
        }
    }
}

/// Represents the serialization and deserialization format of the configuration file. Only
/// `app_name`, `config_version` and `sheet_url` are required.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "ledger",
///   "config_version": 1,
///   "sheet_url": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
///   "table_name": "Transactions",
///   "credentials_path": ".secrets/service_account.json",
///   "auto_provision": true,
///   "utc_offset_minutes": 420,
///   "session": { "max_age_secs": 3600, "max_idle_secs": 1800 },
///   "retry": {
///     "connect": { "max_attempts": 5, "base_delay": 2000, "multiplier": 2.0, "max_delay": 60000 },
///     "operation": { "max_attempts": 3, "base_delay": 1000, "multiplier": 2.0, "max_delay": 10000 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "ledger"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// URL (or bare id) of the Google Sheet
    sheet_url: String,

    /// The tab that holds the transactions
    #[serde(default = "default_table")]
    table_name: String,

    /// Path to the service account key (relative to the home directory, or absolute).
    /// Defaults to $LEDGER_HOME/.secrets/service_account.json if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credentials_path: Option<PathBuf>,

    /// Create the ledger tab, with its header, when it does not exist
    #[serde(default = "default_true")]
    auto_provision: bool,

    /// Offset from UTC of the ledger's local time, in minutes
    #[serde(default = "default_utc_offset")]
    utc_offset_minutes: i32,

    #[serde(default)]
    session: SessionLimits,

    #[serde(default)]
    retry: RetrySettings,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_utc_offset() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sheet_url: String::new(),
            table_name: default_table(),
            credentials_path: None,
            auto_provision: true,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            session: SessionLimits::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from `path`, failing if it cannot be read or parsed, or if it belongs to
    /// another application.
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            !config.table_name.trim().is_empty(),
            "table_name in config file must not be empty"
        );

        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
    }

    fn credentials_path(&self) -> PathBuf {
        self.credentials_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(SERVICE_ACCOUNT_JSON))
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL such as
/// `https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/edit`. A value without any `/` is taken
/// to be the ID itself.
fn extract_spreadsheet_id(url: &str) -> Result<&str> {
    let url = url.trim();
    if url.is_empty() {
        bail!("The sheet URL is empty")
    }
    if !url.contains('/') {
        return Ok(url);
    }

    let parts: Vec<&str> = url.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            let id_part = parts[i + 1];
            let id = id_part
                .split(['?', '#'])
                .next()
                .unwrap_or(id_part);
            if !id.is_empty() {
                return Ok(id);
            }
        }
    }
    bail!(
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::SERVICE_ACCOUNT;
    use std::time::Duration;
    use tempfile::TempDir;

    const SHEET_URL: &str =
        "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";

    #[tokio::test]
    async fn test_config_create_and_load() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("ledger_home");
        let key_file = dir.path().join("key.json");
        utils::write(&key_file, SERVICE_ACCOUNT).await.unwrap();

        let config = Config::create(&home_dir, &key_file, SHEET_URL).await.unwrap();
        assert_eq!(SHEET_URL, config.sheet_url());
        assert_eq!(
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
            config.spreadsheet_id()
        );
        assert!(config.secrets().is_dir());
        assert!(!key_file.exists());
        let moved = utils::read(&config.credentials_path()).await.unwrap();
        assert_eq!(SERVICE_ACCOUNT, moved);

        let loaded = Config::load(&home_dir).await.unwrap();
        assert_eq!(loaded.spreadsheet_id(), config.spreadsheet_id());
        assert_eq!(loaded.table_name(), "Transactions");
        assert!(loaded.auto_provision());
        assert_eq!(loaded.session_limits(), SessionLimits::default());
        assert_eq!(loaded.connect_retry(), RetryPolicy::connect_default());
        assert_eq!(loaded.operation_retry(), RetryPolicy::operation_default());
        assert_eq!(loaded.utc_offset().unwrap().local_minus_utc(), 7 * 3600);
    }

    #[tokio::test]
    async fn test_config_create_rejects_bad_key() {
        let dir = TempDir::new().unwrap();
        let key_file = dir.path().join("key.json");
        utils::write(&key_file, "{}").await.unwrap();
        let result = Config::create(dir.path().join("home"), &key_file, SHEET_URL).await;
        assert!(result.is_err());
        assert!(key_file.exists());
        assert!(!dir.path().join("home").exists());
    }

    #[tokio::test]
    async fn test_config_load_missing() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(dir.path().join("nope")).await.is_err());
        let err = Config::load(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("config file is missing"));
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "ledger",
            "config_version": 1,
            "sheet_url": "minimal"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let config = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(config.sheet_url, "minimal");
        assert_eq!(config.table_name, "Transactions");
        assert_eq!(config.utc_offset_minutes, 420);
        assert_eq!(
            config.credentials_path(),
            PathBuf::from(SECRETS).join(SERVICE_ACCOUNT_JSON)
        );
    }

    #[tokio::test]
    async fn test_config_file_load_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "ledger",
            "config_version": 1,
            "sheet_url": "abc",
            "table_name": "Kas",
            "credentials_path": "/etc/ledger/key.json",
            "auto_provision": false,
            "utc_offset_minutes": -300,
            "session": { "max_age_secs": 60, "max_idle_secs": 30 },
            "retry": {
                "operation": { "max_attempts": 7, "base_delay": 10, "multiplier": 3.0, "max_delay": 500 }
            }
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let config = Config::load(temp_dir.path()).await.unwrap();
        assert_eq!(config.table_name(), "Kas");
        assert!(!config.auto_provision());
        assert_eq!(config.credentials_path(), PathBuf::from("/etc/ledger/key.json"));
        assert_eq!(config.utc_offset().unwrap().local_minus_utc(), -5 * 3600);
        assert_eq!(config.session_limits().max_idle(), Duration::from_secs(30));
        assert_eq!(config.operation_retry().max_attempts(), 7);
        assert_eq!(config.operation_retry().delay(1), Duration::from_millis(10));
        assert_eq!(config.connect_retry(), RetryPolicy::connect_default());
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "tiller",
            "config_version": 1,
            "sheet_url": "abc"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let result = ConfigFile::load(&config_path).await;
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let t = TempDir::new().unwrap();
        let path = t.path().join("file.json");
        let original = ConfigFile {
            sheet_url: "https://docs.google.com/spreadsheets/d/test123".to_string(),
            credentials_path: Some(PathBuf::from(".secrets/other.json")),
            ..ConfigFile::default()
        };
        original.save(&path).await.unwrap();
        assert_eq!(original, ConfigFile::load(&path).await.unwrap());
    }

    #[test]
    fn test_utc_offset_out_of_range() {
        let config = Config {
            root: PathBuf::from("/"),
            secrets: PathBuf::from("/.secrets"),
            config_path: PathBuf::from("/config.json"),
            config_file: ConfigFile {
                utc_offset_minutes: 24 * 60,
                ..ConfigFile::default()
            },
            spreadsheet_id: "x".to_string(),
        };
        assert!(config.utc_offset().is_err());
    }

    #[test]
    fn test_extract_spreadsheet_id() {
        assert_eq!(
            extract_spreadsheet_id(SHEET_URL).unwrap(),
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL"
        );
        assert_eq!(
            extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/ABC123?foo=bar").unwrap(),
            "ABC123"
        );
        assert_eq!(
            extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/ABC123#gid=0").unwrap(),
            "ABC123"
        );
        assert_eq!(extract_spreadsheet_id(" ABC123 ").unwrap(), "ABC123");
        assert!(extract_spreadsheet_id("https://example.com/invalid").is_err());
        assert!(extract_spreadsheet_id("").is_err());
    }
}
