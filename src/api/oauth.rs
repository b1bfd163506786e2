//! Service-account OAuth 2.0: a JWT assertion signed with the account's private key is exchanged
//! for a short-lived access token, which is cached until shortly before it expires.

use crate::api::credentials::{CredentialProvider, ServiceAccountKey};
use crate::api::SPREADSHEETS_SCOPE;
use crate::{LedgerError, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Hands out access tokens, refreshing them when they are expired or about to expire.
#[derive(Debug)]
pub(crate) struct TokenProvider {
    credentials: Arc<dyn CredentialProvider>,
    http: reqwest::Client,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub(crate) fn new(credentials: Arc<dyn CredentialProvider>, http: reqwest::Client) -> Self {
        Self {
            credentials,
            http,
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid access token. Concurrent callers share one refresh.
    pub(crate) async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.is_expired(Utc::now()) {
                return Ok(token.access_token.clone());
            }
            debug!("Access token expired at {}, refreshing", token.expires_at);
        }
        let token = self.fetch().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Forgets the cached token so that the next call to `token` fetches a new one.
    pub(crate) async fn clear(&self) {
        *self.cached.lock().await = None;
    }

    async fn fetch(&self) -> Result<AccessToken> {
        let key = self.credentials.key().await?;
        let now = Utc::now();
        let assertion = assertion(&key, now)?;
        trace!("Requesting access token for {}", key.client_email());

        let response = self
            .http
            .post(key.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            // The token endpoint answers 400 invalid_grant for a revoked or unknown key.
            return Err(match status.as_u16() {
                400 | 401 | 403 => LedgerError::Authentication(format!(
                    "The token request for {} was rejected: {}",
                    key.client_email(),
                    body.trim()
                )),
                code => LedgerError::from_status(code, "token request", &body),
            });
        }

        let body: TokenResponse = response.json().await?;
        debug!("Obtained an access token valid for {}s", body.expires_in);
        Ok(AccessToken {
            access_token: body.access_token,
            expires_at: now + Duration::seconds(body.expires_in),
        })
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Check if the token is expired or will expire soon (within 5 minutes)
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + Duration::minutes(5)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Builds the signed RS256 JWT that is exchanged for an access token.
fn assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String> {
    let iat = now.timestamp();
    let claims = Claims {
        iss: key.client_email(),
        scope: SPREADSHEETS_SCOPE,
        aud: key.token_uri(),
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id().map(str::to_string);
    let signing_key = EncodingKey::from_rsa_pem(key.private_key().as_bytes()).map_err(|e| {
        LedgerError::Configuration(format!(
            "The private key of {} is not a valid RSA PEM key: {e}",
            key.client_email()
        ))
    })?;
    jsonwebtoken::encode(&header, &claims, &signing_key)
        .map_err(|e| LedgerError::Configuration(format!("Unable to sign the token request: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::credentials::InlineKey;

    #[test]
    fn test_token_expiry_buffer() {
        let now = Utc::now();
        let token = AccessToken {
            access_token: "abc".into(),
            expires_at: now + Duration::minutes(10),
        };
        assert!(!token.is_expired(now));
        assert!(token.is_expired(now + Duration::minutes(6)));
        assert!(token.is_expired(now + Duration::minutes(11)));
    }

    #[test]
    fn test_bad_private_key_is_a_configuration_error() {
        let key = ServiceAccountKey::parse(
            r#"{"type": "service_account", "private_key": "garbage", "client_email": "a@b.c"}"#,
        )
        .unwrap();
        assert!(matches!(
            assertion(&key, Utc::now()),
            Err(LedgerError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_credential_errors_surface_before_any_request() {
        let provider = TokenProvider::new(
            Arc::new(InlineKey::new("{ not json")),
            reqwest::Client::new(),
        );
        assert!(matches!(
            provider.token().await,
            Err(LedgerError::Configuration(_))
        ));
    }
}
