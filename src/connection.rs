//! The lifecycle of the session with the remote store.
//!
//! A session is opened lazily on first use, reused while it is fresh, and replaced when it grows
//! too old, sits idle for too long, or is invalidated after an authentication failure. However many
//! tasks ask for a handle at once, at most one of them connects; the rest wait for its outcome.

use crate::api::{Connector, Sheet};
use crate::clock::Clock;
use crate::model::HEADER;
use crate::retry::RetryPolicy;
use crate::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// How long a session may live, and how long it may sit unused, before it is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionLimits {
    max_age_secs: u64,
    max_idle_secs: u64,
}

impl SessionLimits {
    pub fn new(max_age: Duration, max_idle: Duration) -> Self {
        Self {
            max_age_secs: max_age.as_secs(),
            max_idle_secs: max_idle.as_secs(),
        }
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn max_idle(&self) -> Duration {
        Duration::from_secs(self.max_idle_secs)
    }
}

impl Default for SessionLimits {
    /// One hour of age, thirty minutes of idleness.
    fn default() -> Self {
        Self {
            max_age_secs: 3600,
            max_idle_secs: 1800,
        }
    }
}

/// The observable state of the session, for health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
    /// Connected, but the next use will reconnect.
    Stale,
}

serde_plain::derive_display_from_serialize!(ConnectionState);

enum Session {
    Unconnected,
    Connecting,
    Connected(Live),
}

struct Live {
    sheet: Arc<dyn Sheet>,
    connected_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
}

/// Owns the single session with the remote store. Share it between tasks with an `Arc`.
#[derive(Debug)]
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    table: String,
    auto_provision: bool,
    limits: SessionLimits,
    retry: RetryPolicy,
    session: Mutex<Session>,
    connected: Notify,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Session::Unconnected => f.write_str("Unconnected"),
            Session::Connecting => f.write_str("Connecting"),
            Session::Connected(live) => f
                .debug_struct("Connected")
                .field("connected_at", &live.connected_at)
                .field("last_used", &live.last_used)
                .finish(),
        }
    }
}

impl ConnectionManager {
    /// Creates a manager for `table`, using the default session limits, the default connect retry
    /// policy, and creating the table if it is missing.
    pub fn new(connector: Arc<dyn Connector>, clock: Arc<dyn Clock>, table: impl Into<String>) -> Self {
        Self {
            connector,
            clock,
            table: table.into(),
            auto_provision: true,
            limits: SessionLimits::default(),
            retry: RetryPolicy::connect_default(),
            session: Mutex::new(Session::Unconnected),
            connected: Notify::new(),
        }
    }

    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// When disabled, a missing table fails the connect with `LedgerError::TableNotFound`.
    pub fn with_auto_provision(mut self, auto_provision: bool) -> Self {
        self.auto_provision = auto_provision;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns a handle to a fresh session, connecting first if there is none or it is stale.
    pub async fn handle(&self) -> Result<Arc<dyn Sheet>> {
        loop {
            let notified = self.connected.notified();
            tokio::pin!(notified);

            let must_wait = {
                let mut session = self.lock();
                let stale = match &*session {
                    Session::Connected(live) => match self.staleness(live) {
                        None => return Ok(live.sheet.clone()),
                        Some(reason) => Some(reason),
                    },
                    Session::Connecting | Session::Unconnected => None,
                };
                if matches!(*session, Session::Connecting) {
                    // Registered while the lock is held, so the wake-up cannot be missed.
                    notified.as_mut().enable();
                    true
                } else {
                    if let Some(reason) = stale {
                        info!("The session is stale ({reason}), reconnecting");
                    }
                    *session = Session::Connecting;
                    false
                }
            };

            if must_wait {
                debug!("Waiting for another task to finish connecting");
                notified.await;
                continue;
            }
            return self.connect().await;
        }
    }

    /// Drops the current session. The next call to `handle` reconnects.
    pub fn invalidate(&self) {
        let mut session = self.lock();
        if let Session::Connected(_) = *session {
            info!("Invalidating the session");
            *session = Session::Unconnected;
        }
    }

    /// Records a successful operation, which resets the idle timer.
    pub fn mark_used(&self) {
        let now = self.clock.now();
        if let Session::Connected(live) = &mut *self.lock() {
            live.last_used = now;
        }
    }

    pub fn state(&self) -> ConnectionState {
        match &*self.lock() {
            Session::Unconnected => ConnectionState::Unconnected,
            Session::Connecting => ConnectionState::Connecting,
            Session::Connected(live) if self.staleness(live).is_some() => ConnectionState::Stale,
            Session::Connected(_) => ConnectionState::Connected,
        }
    }

    /// Runs the connect for a caller that has moved the session to `Connecting`.
    async fn connect(&self) -> Result<Arc<dyn Sheet>> {
        // Puts the session back to Unconnected and wakes the waiters, however this future ends.
        let _guard = ConnectGuard { manager: self };
        let this = self;
        let sheet = match self
            .retry
            .execute("connect", move || this.open_session())
            .await
        {
            Ok(sheet) => sheet,
            Err(e) => {
                warn!("Unable to connect to the remote store: {e}");
                return Err(e);
            }
        };

        let now = self.clock.now();
        *self.lock() = Session::Connected(Live {
            sheet: sheet.clone(),
            connected_at: now,
            last_used: now,
        });
        info!("Connected, using table '{}'", self.table);
        Ok(sheet)
    }

    /// Authenticates, opens the spreadsheet and makes sure the ledger table exists and starts with
    /// a header row. Each step checks the sheet first, so a retry after a partial provisioning
    /// picks up where the failed attempt stopped.
    async fn open_session(&self) -> Result<Arc<dyn Sheet>> {
        let sheet = self.connector.connect().await?;
        let tables = sheet.tables().await?;
        if !tables.iter().any(|t| t == &self.table) {
            if !self.auto_provision {
                return Err(LedgerError::TableNotFound(self.table.clone()));
            }
            info!("Table '{}' does not exist, creating it", self.table);
            sheet.create_table(&self.table).await?;
        }

        let header = sheet.header(&self.table).await?;
        if header.iter().all(|cell| cell.trim().is_empty()) {
            if !self.auto_provision {
                return Err(LedgerError::Decode {
                    row: 1,
                    reason: format!("table '{}' has no header row", self.table),
                });
            }
            info!("Table '{}' has no header row, writing it", self.table);
            sheet.set_header(&self.table, &HEADER).await?;
        }
        Ok(sheet)
    }

    /// Why `live` may no longer be used, or `None` if it is fresh.
    fn staleness(&self, live: &Live) -> Option<String> {
        let now = self.clock.now();
        let age = elapsed(live.connected_at, now);
        let idle = elapsed(live.last_used, now);
        if age > self.limits.max_age() {
            Some(format!("connected {}s ago", age.as_secs()))
        } else if idle > self.limits.max_idle() {
            Some(format!("idle for {}s", idle.as_secs()))
        } else {
            None
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A clock that moved backwards counts as no time passing.
fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

struct ConnectGuard<'a> {
    manager: &'a ConnectionManager,
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        {
            let mut session = self.manager.lock();
            if let Session::Connecting = *session {
                *session = Session::Unconnected;
            }
        }
        self.manager.connected.notify_waiters();
    }
}
