use crate::api::Mode;
use crate::args::RecordArgs;
use crate::commands::{open_ledger, Out};
use crate::model::Transaction;
use crate::Config;
use anyhow::{Context, Result};

/// Appends one transaction to the ledger, timestamped now.
pub async fn record(config: Config, mode: Mode, args: RecordArgs) -> Result<Out<Transaction>> {
    let ledger = open_ledger(&config, mode).await?;
    let transaction = ledger
        .append_transaction(
            args.kind(),
            args.amount(),
            args.category(),
            args.description(),
        )
        .await
        .context("Unable to record the transaction")?;
    let message = format!(
        "Recorded {} of {} in '{}' at {}",
        transaction.kind(),
        transaction.amount(),
        transaction.category(),
        transaction.timestamp()
    );
    Ok(Out::new(message, transaction))
}
