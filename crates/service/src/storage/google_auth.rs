//! OAuth access tokens for the Sheets API.
//!
//! Either a pre-issued bearer token or a service-account key exchanged
//! through the JWT-bearer grant. Exchanged tokens are reused until shortly
//! before they expire.

use chrono::Utc;
use configs::SheetsCredentials;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::StoreError;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Refresh this many seconds before the reported expiry.
const EXPIRY_SKEW_SECS: i64 = 60;
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields of a Google service-account key file that the grant needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

struct CachedToken {
    token: String,
    expires_at: i64,
}

pub enum TokenSource {
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        signing_key: EncodingKey,
        cached: Mutex<Option<CachedToken>>,
    },
}

impl TokenSource {
    pub fn from_credentials(creds: &SheetsCredentials) -> Result<Self, StoreError> {
        let json = match creds {
            SheetsCredentials::AccessToken(token) => return Ok(Self::Static(token.clone())),
            SheetsCredentials::ServiceAccountJson(json) => json.clone(),
            SheetsCredentials::ServiceAccountFile(path) => std::fs::read_to_string(path)
                .map_err(|e| StoreError::Auth(format!("cannot read service account key {path}: {e}")))?,
        };
        let key: ServiceAccountKey = serde_json::from_str(&json)
            .map_err(|e| StoreError::Auth(format!("invalid service account key: {e}")))?;
        Self::service_account(key)
    }

    pub fn service_account(key: ServiceAccountKey) -> Result<Self, StoreError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| StoreError::Auth(format!("invalid service account private key: {e}")))?;
        info!(client_email = %key.client_email, "using service account credentials");
        Ok(Self::ServiceAccount { key, signing_key, cached: Mutex::new(None) })
    }

    /// A bearer token valid for at least the next minute.
    pub async fn access_token(&self, http: &reqwest::Client) -> Result<String, StoreError> {
        let (key, signing_key, cached) = match self {
            Self::Static(token) => return Ok(token.clone()),
            Self::ServiceAccount { key, signing_key, cached } => (key, signing_key, cached),
        };

        let now = Utc::now().timestamp();
        let mut slot = cached.lock().await;
        if let Some(t) = slot.as_ref().filter(|t| t.expires_at - EXPIRY_SKEW_SECS > now) {
            return Ok(t.token.clone());
        }

        let claims = Claims {
            iss: &key.client_email,
            scope: SHEETS_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, signing_key)
            .map_err(|e| StoreError::Auth(e.to_string()))?;

        let resp = http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!("token endpoint returned {status}: {body}")));
        }
        let token: TokenResponse = resp.json().await.map_err(|e| StoreError::Decode(e.to_string()))?;
        debug!(expires_in = token.expires_in, "access token issued");

        *slot = Some(CachedToken { token: token.access_token.clone(), expires_at: now + token.expires_in });
        Ok(token.access_token)
    }
}
