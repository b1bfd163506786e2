use crate::api::Mode;
use crate::commands::{open_ledger, Out};
use crate::ledger::Status;
use crate::Config;
use anyhow::{Context, Result};

/// Connects to the sheet, reads the ledger and reports what was found.
pub async fn status(config: Config, mode: Mode) -> Result<Out<Status>> {
    let ledger = open_ledger(&config, mode).await?;
    let status = ledger
        .status()
        .await
        .with_context(|| format!("Unable to reach the sheet '{}'", config.spreadsheet_id()))?;
    let message = format!(
        "Connection is {}. Table '{}' holds {} transactions",
        status.connection(),
        status.table(),
        status.transaction_count()
    );
    Ok(Out::new(message, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use crate::test::create_config;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status() {
        let dir = TempDir::new().unwrap();
        let config = create_config(&dir).await;
        let out = status(config, Mode::Test).await.unwrap();
        let status = out.structure().unwrap();
        assert_eq!(status.connection(), ConnectionState::Connected);
        assert_eq!(status.transaction_count(), 8);
        assert_eq!(
            out.message(),
            "Connection is connected. Table 'Transactions' holds 8 transactions"
        );
    }
}
