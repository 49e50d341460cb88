//! Google Cloud access tokens shared by the Datastore and Cloud Storage
//! adapters.

use std::path::Path;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const SCOPES: &str =
    "https://www.googleapis.com/auth/datastore https://www.googleapis.com/auth/devstorage.read_write";
/// Lifetime of a signed assertion; Google caps it at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("token endpoint returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("unusable credentials: {0}")]
    Credentials(String),

    #[error("could not read credentials file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Where access tokens come from.
#[derive(Clone)]
pub enum Credentials {
    /// Pre-issued bearer token, used as-is.
    Static(String),
    /// OAuth client refresh token (`gcloud auth application-default login`).
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
    /// Service-account key, exchanged through a signed JWT assertion.
    ServiceAccount(ServiceAccountKey),
    /// GCE / Cloud Run metadata server.
    Metadata,
}

/// The parts of a service-account key file needed to mint tokens.
#[derive(Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub private_key_id: Option<String>,
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

impl ServiceAccountKey {
    /// RS256-signed JWT-bearer assertion issued at `issued_at` (unix seconds).
    pub fn assertion(&self, issued_at: i64) -> Result<String, AuthError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: SCOPES.to_string(),
            aud: self.token_uri.clone(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(&header, &claims, &key)?)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Static(_) => f.write_str("Static(..)"),
            Credentials::AuthorizedUser { client_id, .. } => f
                .debug_struct("AuthorizedUser")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Credentials::ServiceAccount(key) => f.debug_tuple("ServiceAccount").field(key).finish(),
            Credentials::Metadata => f.write_str("Metadata"),
        }
    }
}

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    client_email: Option<String>,
    private_key: Option<String>,
    private_key_id: Option<String>,
    token_uri: Option<String>,
}

impl Credentials {
    /// Parse an application-default or service-account credentials JSON file.
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, AuthError> {
        let file: CredentialsFile =
            serde_json::from_str(raw).map_err(|e| AuthError::Credentials(e.to_string()))?;
        match file.kind.as_str() {
            "authorized_user" => match (file.client_id, file.client_secret, file.refresh_token) {
                (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                    Ok(Credentials::AuthorizedUser {
                        client_id,
                        client_secret,
                        refresh_token,
                    })
                }
                _ => Err(AuthError::Credentials(
                    "authorized_user credentials need client_id, client_secret and refresh_token"
                        .into(),
                )),
            },
            "service_account" => match (file.client_email, file.private_key) {
                (Some(client_email), Some(private_key)) => {
                    Ok(Credentials::ServiceAccount(ServiceAccountKey {
                        client_email,
                        private_key,
                        private_key_id: file.private_key_id,
                        token_uri: file.token_uri.unwrap_or_else(|| TOKEN_URL.to_string()),
                    }))
                }
                _ => Err(AuthError::Credentials(
                    "service_account credentials need client_email and private_key".into(),
                )),
            },
            other => Err(AuthError::Credentials(format!(
                "credential type `{other}` is not supported; use authorized_user, \
                 service_account, GOOGLE_OAUTH_ACCESS_TOKEN or the metadata server"
            ))),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Hands out bearer tokens, refreshing them shortly before they expire.
pub struct TokenSource {
    http: reqwest::Client,
    credentials: Credentials,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(http: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            http,
            credentials,
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String, AuthError> {
        if let Credentials::Static(token) = &self.credentials {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let response = self.fetch().await?;
        let lifetime = Duration::from_secs(response.expires_in.unwrap_or(3600));
        tracing::debug!("refreshed Google access token, valid for {:?}", lifetime);

        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });
        Ok(response.access_token)
    }

    async fn fetch(&self) -> Result<TokenResponse, AuthError> {
        let request = match &self.credentials {
            Credentials::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
            } => self.http.post(TOKEN_URL).form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
            ]),
            Credentials::ServiceAccount(key) => {
                let assertion = key.assertion(chrono::Utc::now().timestamp())?;
                self.http.post(&key.token_uri).form(&[
                    ("grant_type", JWT_BEARER_GRANT),
                    ("assertion", assertion.as_str()),
                ])
            }
            Credentials::Metadata => self
                .http
                .get(METADATA_TOKEN_URL)
                .header("Metadata-Flavor", "Google"),
            Credentials::Static(_) => {
                return Err(AuthError::Credentials("static tokens are never refreshed".into()))
            }
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status {
                code: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_authorized_user_file() {
        let creds = Credentials::from_json(
            r#"{"type":"authorized_user","client_id":"id","client_secret":"s","refresh_token":"r"}"#,
        )
        .unwrap();
        assert!(matches!(creds, Credentials::AuthorizedUser { .. }));
    }

    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/service_account_key.pem");
    const PUBLIC_KEY: &str = include_str!("../tests/fixtures/service_account_key.pub.pem");

    fn service_account_json() -> String {
        serde_json::json!({
            "type": "service_account",
            "project_id": "league-admin",
            "private_key_id": "key-1",
            "private_key": PRIVATE_KEY,
            "client_email": "api@league-admin.iam.gserviceaccount.com",
            "client_id": "1234",
            "token_uri": "https://oauth2.googleapis.com/token"
        })
        .to_string()
    }

    #[test]
    fn service_account_key_signs_a_bearer_assertion() {
        let key = match Credentials::from_json(&service_account_json()).unwrap() {
            Credentials::ServiceAccount(key) => key,
            other => panic!("unexpected credentials: {other:?}"),
        };
        assert_eq!(key.client_email, "api@league-admin.iam.gserviceaccount.com");
        assert!(!format!("{key:?}").contains("PRIVATE KEY"));

        let now = chrono::Utc::now().timestamp();
        let assertion = key.assertion(now).unwrap();

        let header = jsonwebtoken::decode_header(&assertion).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some("key-1"));

        let mut validation = jsonwebtoken::Validation::new(Algorithm::RS256);
        validation.set_audience(&["https://oauth2.googleapis.com/token"]);
        validation.set_issuer(&["api@league-admin.iam.gserviceaccount.com"]);
        let decoded = jsonwebtoken::decode::<AssertionClaims>(
            &assertion,
            &jsonwebtoken::DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();
        assert_eq!(decoded.claims.iat, now);
        assert_eq!(decoded.claims.exp, now + 3600);
        let scopes: Vec<&str> = decoded.claims.scope.split(' ').collect();
        assert_eq!(
            scopes,
            [
                "https://www.googleapis.com/auth/datastore",
                "https://www.googleapis.com/auth/devstorage.read_write"
            ]
        );
    }

    #[test]
    fn service_account_token_uri_defaults_to_google() {
        let raw = r#"{"type":"service_account","client_email":"a@b","private_key":"k"}"#;
        match Credentials::from_json(raw).unwrap() {
            Credentials::ServiceAccount(key) => {
                assert_eq!(key.token_uri, TOKEN_URL);
                assert!(key.private_key_id.is_none());
                assert!(matches!(key.assertion(0), Err(AuthError::Signing(_))));
            }
            other => panic!("unexpected credentials: {other:?}"),
        }
    }

    #[test]
    fn rejects_incomplete_service_account_keys() {
        let err = Credentials::from_json(r#"{"type":"service_account","private_key":"k"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("client_email"));
    }

    #[test]
    fn rejects_unknown_credential_types() {
        let err = Credentials::from_json(r#"{"type":"external_account"}"#).unwrap_err();
        assert!(err.to_string().contains("external_account"));
    }

    #[tokio::test]
    async fn static_token_is_returned_verbatim() {
        let source = TokenSource::new(reqwest::Client::new(), Credentials::Static("abc".into()));
        assert_eq!(source.token().await.unwrap(), "abc");
    }
}
