//! Implements the `Sheet` and `Connector` traits against the Google Sheets v4 API.
//!
//! Reads go through the `sheets::Client`. Listing tabs, adding a tab and appending rows use the REST
//! endpoints directly with `reqwest`.

use crate::api::credentials::CredentialProvider;
use crate::api::oauth::TokenProvider;
use crate::api::{Connector, Sheet};
use crate::{LedgerError, Result};
use serde::Deserialize;
use sheets::types::{DateTimeRenderOption, Dimension, ValueRange, ValueRenderOption};
use sheets::ClientError;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

/// Opens sessions against one spreadsheet. Each `connect` authenticates and returns a fresh handle.
#[derive(Debug)]
pub(super) struct GoogleConnector {
    spreadsheet_id: String,
    tokens: Arc<TokenProvider>,
    http: reqwest::Client,
}

impl GoogleConnector {
    pub(super) fn new(
        spreadsheet_id: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let http = reqwest::Client::new();
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            tokens: Arc::new(TokenProvider::new(credentials, http.clone())),
            http,
        }
    }
}

#[async_trait::async_trait]
impl Connector for GoogleConnector {
    async fn connect(&self) -> Result<Arc<dyn Sheet>> {
        // A new session must not reuse a token that the previous session was refused with.
        self.tokens.clear().await;
        let _ = self.tokens.token().await?;
        debug!("Authenticated for spreadsheet {}", self.spreadsheet_id);
        Ok(Arc::new(GoogleSheet {
            spreadsheet_id: self.spreadsheet_id.clone(),
            tokens: self.tokens.clone(),
            http: self.http.clone(),
        }))
    }
}

/// A handle to one spreadsheet. The access token is refreshed as needed before every call.
#[derive(Debug)]
struct GoogleSheet {
    spreadsheet_id: String,
    tokens: Arc<TokenProvider>,
    http: reqwest::Client,
}

impl GoogleSheet {
    fn url(&self, suffix: &[&str]) -> Result<Url> {
        let mut url = Url::parse(SHEETS_API)
            .map_err(|e| LedgerError::Configuration(format!("Bad API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| LedgerError::Configuration("Bad API URL".to_string()))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .extend(suffix);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Sheet for GoogleSheet {
    async fn tables(&self) -> Result<Vec<String>> {
        trace!("tables for {}", self.spreadsheet_id);
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");
        let response = self
            .http
            .get(url)
            .bearer_auth(self.tokens.token().await?)
            .send()
            .await?;
        let response = check(response, "Listing the spreadsheet's tabs").await?;
        let spreadsheet: Spreadsheet = response.json().await?;
        Ok(spreadsheet
            .sheets
            .into_iter()
            .map(|s| s.properties.title)
            .collect())
    }

    async fn create_table(&self, table: &str) -> Result<()> {
        debug!("Creating tab '{table}'");
        let url = self.url(&[])?;
        let url = Url::parse(&format!("{url}:batchUpdate"))
            .map_err(|e| LedgerError::Configuration(format!("Bad API URL: {e}")))?;
        let response = self
            .http
            .post(url)
            .bearer_auth(self.tokens.token().await?)
            .json(&serde_json::json!({
                "requests": [{"addSheet": {"properties": {"title": table}}}]
            }))
            .send()
            .await?;
        check(response, &format!("Adding tab '{table}'")).await?;
        Ok(())
    }

    async fn header(&self, table: &str) -> Result<Vec<String>> {
        trace!("header for {table}");
        let client = create_sheets_client(&self.tokens).await?;
        let response = client
            .spreadsheets()
            .values_get(
                &self.spreadsheet_id,
                &header_range(table),
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                ValueRenderOption::FormattedValue,
            )
            .await
            .map_err(|e| map_client_error(e, &format!("Fetching the header of '{table}'")))?;
        Ok(response.body.values.into_iter().next().unwrap_or_default())
    }

    async fn set_header(&self, table: &str, header: &[&str]) -> Result<()> {
        debug!("Writing the header of '{table}'");
        let range = header_range(table);
        let mut url = self.url(&["values", &range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = ValueRange {
            major_dimension: Some(Dimension::Rows),
            range,
            values: vec![header.iter().map(|s| s.to_string()).collect()],
        };
        let response = self
            .http
            .put(url)
            .bearer_auth(self.tokens.token().await?)
            .json(&body)
            .send()
            .await?;
        check(response, &format!("Writing the header of '{table}'")).await?;
        Ok(())
    }

    async fn get(&self, table: &str) -> Result<Vec<Vec<String>>> {
        trace!("get for {table}");
        let client = create_sheets_client(&self.tokens).await?;
        let response = client
            .spreadsheets()
            .values_get(
                &self.spreadsheet_id,
                &a1_range(table),
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                ValueRenderOption::FormattedValue,
            )
            .await
            .map_err(|e| map_client_error(e, &format!("Fetching '{table}'")))?;
        Ok(response.body.values)
    }

    async fn append(&self, table: &str, row: &[String]) -> Result<()> {
        trace!("append to {table}");
        let range = a1_range(table);
        let mut url = self.url(&["values", &format!("{range}:append")])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = ValueRange {
            major_dimension: Some(Dimension::Rows),
            range,
            values: vec![row.to_vec()],
        };
        let response = self
            .http
            .post(url)
            .bearer_auth(self.tokens.token().await?)
            .json(&body)
            .send()
            .await?;
        check(response, &format!("Appending to '{table}'")).await?;
        Ok(())
    }
}

/// The five ledger columns of `table`, quoted so that tab names with spaces work.
fn a1_range(table: &str) -> String {
    format!("{}!A:E", quoted(table))
}

/// The header cells of `table`.
fn header_range(table: &str) -> String {
    format!("{}!A1:E1", quoted(table))
}

fn quoted(table: &str) -> String {
    format!("'{}'", table.replace('\'', "''"))
}

/// Turns a non-success response into a classified `LedgerError`.
async fn check(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read response body".to_string());
    Err(LedgerError::from_status(status.as_u16(), context, &body))
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// Creates a new sheets client with a refreshed access token.
async fn create_sheets_client(tokens: &TokenProvider) -> Result<sheets::Client> {
    let access_token = tokens.token().await?;

    // The sheets crate wants OAuth client details for its own refresh flow, which is not used here.
    Ok(sheets::Client::new(
        String::new(),
        String::new(),
        String::new(),
        access_token,
        String::new(),
    ))
}

fn map_client_error(e: ClientError, context: &str) -> LedgerError {
    match e {
        ClientError::HttpError { status, error, .. } => {
            LedgerError::from_status(status.as_u16(), context, &error)
        }
        ClientError::ReqwestError(inner) => LedgerError::Unavailable(format!("{context}: {inner}")),
        ClientError::ReqwestMiddleWareError(inner) => {
            LedgerError::Unavailable(format!("{context}: {inner}"))
        }
        ClientError::EmptyRefreshToken => {
            LedgerError::Authentication(format!("{context}: empty access token"))
        }
        other => LedgerError::Remote(format!("{context}: {other}")),
    }
}
