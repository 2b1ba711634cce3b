//! Service-account authentication: signed JWT assertion exchanged for a
//! short-lived bearer token, cached until shortly before expiry.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::SheetError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

pub const SCOPES: &[&str] = &[
    "https://spreadsheets.google.com/feeds",
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.file",
    "https://www.googleapis.com/auth/drive",
];

const ASSERTION_LIFETIME_SECS: i64 = 3600;
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens are refreshed this many seconds before they expire.
pub const REFRESH_BUFFER_SECS: i64 = 60;

/// The fields of a Google service-account key file that we need.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, SheetError> {
        serde_json::from_str(json).map_err(SheetError::Credentials)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub(crate) fn new(key: &ServiceAccountKey, scopes: &[&str], now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            iss: key.client_email.clone(),
            scope: scopes.join(" "),
            aud: key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
pub(crate) struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub(crate) fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_BUFFER_SECS) < self.expires_at
    }
}

/// Hands out bearer tokens for a service account.
#[derive(Debug)]
pub struct TokenSource {
    key: ServiceAccountKey,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            key,
            cached: Mutex::new(None),
        }
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// A valid bearer token, exchanging a fresh assertion when needed.
    pub async fn bearer(&self, http: &reqwest::Client) -> Result<String, SheetError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.access_token.clone());
        }

        let token = self.exchange(http, now).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn exchange(
        &self,
        http: &reqwest::Client,
        now: DateTime<Utc>,
    ) -> Result<CachedToken, SheetError> {
        let assertion = self.sign_assertion(now)?;
        let response = http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetError::Auth(format!("HTTP {status}: {body}")));
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!(
            "obtained access token for {} (expires in {}s)",
            self.key.client_email,
            token.expires_in
        );
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, SheetError> {
        let claims = Claims::new(&self.key, SCOPES, now);
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &key,
        )?)
    }
}
