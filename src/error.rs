//! The error taxonomy of the ledger core.
//!
//! Everything below the command layer returns `LedgerError` so that callers can tell a transient
//! remote hiccup apart from broken credentials or corrupted sheet data. The command layer wraps
//! these in `anyhow` with additional context.

use thiserror::Error;

/// Result type alias used throughout the ledger core.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors produced by the ledger store, its connection and the report engine.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Missing or invalid credentials, spreadsheet id or table name. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The remote store rejected our credentials. Never retried; the session is invalidated.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The remote store is throttling us. Transient.
    #[error("Rate limited by the remote store: {0}")]
    RateLimited(String),

    /// Connectivity problem or server-side failure. Transient.
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    /// A transient error kept recurring until the retry policy gave up.
    #[error("'{operation}' failed after {attempts} attempts")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<LedgerError>,
    },

    /// The ledger table does not exist and auto-provisioning is disabled.
    #[error("Table '{0}' was not found in the spreadsheet")]
    TableNotFound(String),

    /// A row in the ledger table could not be parsed. `row` is the 1-based sheet row number, the
    /// header being row 1.
    #[error("Unable to decode row {row}: {reason}")]
    Decode { row: usize, reason: String },

    /// Any other error reported by the remote API that retrying will not fix.
    #[error("Remote store error: {0}")]
    Remote(String),

    /// A report total does not fit in the integer range.
    #[error("Amount overflow while computing {0}")]
    Overflow(String),

    /// A year/month pair that is not a calendar month.
    #[error("Invalid period {year}-{month}")]
    InvalidPeriod { year: i32, month: u32 },
}

impl LedgerError {
    /// Errors that are expected to go away if the same call is made again later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::RateLimited(_) | LedgerError::Unavailable(_)
        )
    }

    /// Errors after which the current session must not be reused.
    pub fn is_authentication(&self) -> bool {
        matches!(self, LedgerError::Authentication(_))
    }

    /// Classifies an HTTP failure from the remote store. `context` describes the call that failed
    /// and `body` is whatever the server sent back, which is searched for Google's rate-limit
    /// markers because some endpoints report quota errors as 403.
    pub(crate) fn from_status(status: u16, context: &str, body: &str) -> Self {
        let message = format!("{context} (HTTP {status}): {}", body.trim());
        if status == 429 || body.contains("RESOURCE_EXHAUSTED") || body.contains("rateLimitExceeded")
        {
            LedgerError::RateLimited(message)
        } else if status >= 500 || status == 408 {
            LedgerError::Unavailable(message)
        } else if status == 401 || status == 403 {
            LedgerError::Authentication(message)
        } else {
            LedgerError::Remote(message)
        }
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => LedgerError::from_status(status.as_u16(), "request failed", &e.to_string()),
            None if e.is_decode() => LedgerError::Remote(format!("unreadable response: {e}")),
            None => LedgerError::Unavailable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LedgerError::RateLimited("x".into()).is_transient());
        assert!(LedgerError::Unavailable("x".into()).is_transient());
        assert!(!LedgerError::Authentication("x".into()).is_transient());
        assert!(!LedgerError::TableNotFound("x".into()).is_transient());
        let exhausted = LedgerError::RetryExhausted {
            operation: "append".into(),
            attempts: 3,
            last: Box::new(LedgerError::RateLimited("x".into())),
        };
        assert!(!exhausted.is_transient());
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            LedgerError::from_status(429, "get", ""),
            LedgerError::RateLimited(_)
        ));
        assert!(matches!(
            LedgerError::from_status(403, "get", r#"{"reason": "rateLimitExceeded"}"#),
            LedgerError::RateLimited(_)
        ));
        assert!(matches!(
            LedgerError::from_status(403, "get", "PERMISSION_DENIED"),
            LedgerError::Authentication(_)
        ));
        assert!(matches!(
            LedgerError::from_status(503, "get", ""),
            LedgerError::Unavailable(_)
        ));
        assert!(matches!(
            LedgerError::from_status(400, "get", "bad range"),
            LedgerError::Remote(_)
        ));
    }
}
