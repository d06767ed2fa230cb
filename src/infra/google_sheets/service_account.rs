// =============================================================================
// SERVICE ACCOUNT AUTHENTICATION
// =============================================================================
//
// Google service accounts authenticate with a self-signed JWT (RS256) that is
// exchanged at the credential's token_uri for a short-lived access token.
//
// **Setup:**
// 1. Create a service account in Google Cloud Console and download a JSON key.
// 2. Enable the Google Sheets API and the Google Drive API for the project.
// 3. Share the spreadsheet with the service account email
//    (name@project.iam.gserviceaccount.com) as an Editor.
// 4. Point `GOOGLE_SERVICE_ACCOUNT_KEY` at the key file, or put the JSON itself
//    in `GOOGLE_SERVICE_ACCOUNT_JSON`.

use super::google_sheets_client::SheetsError;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Read/write access to sheets plus lookup of spreadsheets by name.
pub const SHEETS_SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Service account credentials from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    /// Used as the JWT issuer.
    client_email: String,

    /// PEM encoded.
    private_key: String,

    #[serde(default = "default_token_uri")]
    token_uri: String,
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    /// At most one hour after `iat`.
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// Authenticator that handles OAuth2 with service account credentials.
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    scope: String,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountAuth {
    /// Creates a new authenticator from the JSON key content.
    pub fn from_json(json: &str) -> Result<Self, SheetsError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)
            .map_err(|e| SheetsError::Credentials(e.to_string()))?;

        // Fail at startup rather than on the first submit.
        EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| SheetsError::Credentials(format!("invalid private key: {}", e)))?;

        Ok(Self {
            credentials,
            scope: SHEETS_SCOPES.to_string(),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.credentials.client_email
    }

    /// Gets a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String, SheetsError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + Duration::from_secs(60) {
                    return Ok(token.token.clone());
                }
            }
        }

        let (new_token, lifetime) = self.fetch_new_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(CachedToken {
                token: new_token.clone(),
                expires_at: SystemTime::now() + lifetime,
            });
        }

        Ok(new_token)
    }

    fn signed_assertion(&self, now: u64) -> Result<String, SheetsError> {
        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| SheetsError::Auth(e.to_string()))?;
        encode(&header, &claims, &key).map_err(|e| SheetsError::Auth(e.to_string()))
    }

    async fn fetch_new_token(&self) -> Result<(String, Duration), SheetsError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SheetsError::Auth(e.to_string()))?
            .as_secs();
        let jwt = self.signed_assertion(now)?;

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(SheetsError::Auth(format!(
                "token exchange failed ({}): {}",
                status, text
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        // Cap at 55 minutes so a slow clock never hands out a dead token.
        let lifetime = token_response.expires_in.unwrap_or(3600).min(55 * 60);
        tracing::debug!(lifetime_secs = lifetime, "Fetched Google access token");

        Ok((token_response.access_token, Duration::from_secs(lifetime)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::google_sheets::test_support::StubServer;
    use std::sync::atomic::Ordering;

    #[test]
    fn malformed_json_is_a_credentials_error() {
        let err = ServiceAccountAuth::from_json("{ not json").err().unwrap();
        assert!(matches!(err, SheetsError::Credentials(_)));
    }

    #[test]
    fn missing_fields_are_rejected() {
        let json = r#"{"client_email": "bot@x.iam.gserviceaccount.com"}"#;
        let err = ServiceAccountAuth::from_json(json).err().unwrap();
        assert!(err.to_string().contains("private_key"));
    }

    #[test]
    fn bad_private_key_is_rejected_up_front() {
        let json = r#"{
            "client_email": "bot@x.iam.gserviceaccount.com",
            "private_key": "not a pem key"
        }"#;
        let err = ServiceAccountAuth::from_json(json).err().unwrap();
        assert!(err.to_string().contains("invalid private key"));
    }

    #[test]
    fn token_uri_defaults_to_google() {
        let creds: ServiceAccountCredentials = serde_json::from_str(
            r#"{"client_email": "a@b", "private_key": "k"}"#,
        )
        .unwrap();
        assert_eq!(creds.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[tokio::test]
    async fn access_token_is_cached_until_near_expiry() {
        let stub = StubServer::start().await;
        let auth = ServiceAccountAuth::from_json(&stub.credentials_json()).unwrap();

        let first = auth.get_access_token().await.unwrap();
        let second = auth.get_access_token().await.unwrap();

        assert_eq!(first, "ya29.test-1");
        assert_eq!(second, first);
        assert_eq!(stub.state.token_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_inside_refresh_margin_is_fetched_again() {
        let stub = StubServer::start().await;
        // Already within the 60 second margin when it arrives.
        stub.state.token_lifetime_secs.store(45, Ordering::SeqCst);
        let auth = ServiceAccountAuth::from_json(&stub.credentials_json()).unwrap();

        assert_eq!(auth.get_access_token().await.unwrap(), "ya29.test-1");
        assert_eq!(auth.get_access_token().await.unwrap(), "ya29.test-2");
        assert_eq!(stub.state.token_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejected_assertion_is_an_auth_error() {
        let stub = StubServer::start().await;
        let json = serde_json::json!({
            "client_email": "memo-bot@test.iam.gserviceaccount.com",
            "private_key": crate::infra::google_sheets::test_support::TEST_PRIVATE_KEY,
            "token_uri": format!("{}/not-a-token-endpoint", stub.base_url),
        })
        .to_string();
        let auth = ServiceAccountAuth::from_json(&json).unwrap();

        let err = auth.get_access_token().await.unwrap_err();
        assert!(matches!(err, SheetsError::Auth(ref msg) if msg.contains("404")));
    }
}
