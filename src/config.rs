//! Process configuration read from the environment (and `.env`).

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const CREDENTIALS_FILE_NAME: &str = "google-credentials.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is not in the correct format: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("could not decode GOOGLE_CREDENTIALS_BASE64: {0}")]
    Credentials(String),

    #[error("could not write credentials file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Datastore {
        project_id: String,
        emulator_host: Option<String>,
    },
    Sqlite {
        database_url: String,
    },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobBackend {
    Gcs { bucket: String },
    Local { root: PathBuf, public_base: String },
}

/// Where Google credentials come from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    AccessToken(String),
    /// Inline base64 JSON, written to a file at startup.
    Encoded(String),
    File(PathBuf),
    Metadata,
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::AccessToken(_) => f.write_str("AccessToken(..)"),
            CredentialSource::Encoded(_) => f.write_str("Encoded(..)"),
            CredentialSource::File(path) => f.debug_tuple("File").field(path).finish(),
            CredentialSource::Metadata => f.write_str("Metadata"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub store: StoreBackend,
    pub blobs: BlobBackend,
    pub credentials: CredentialSource,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let host = match var("HOST") {
            Some(raw) => parse("HOST", &raw)?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let port = match var("PORT") {
            Some(raw) => parse("PORT", &raw)?,
            None => DEFAULT_PORT,
        };
        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(raw) => parse("MAX_UPLOAD_BYTES", &raw)?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let store = match var("STORE_BACKEND").as_deref().unwrap_or("datastore") {
            "datastore" => StoreBackend::Datastore {
                project_id: var("GOOGLE_CLOUD_PROJECT_ID")
                    .ok_or(ConfigError::Missing("GOOGLE_CLOUD_PROJECT_ID"))?,
                emulator_host: var("DATASTORE_EMULATOR_HOST"),
            },
            "sqlite" => StoreBackend::Sqlite {
                database_url: var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        let blobs = match var("BLOB_BACKEND").as_deref().unwrap_or("gcs") {
            "gcs" => BlobBackend::Gcs {
                bucket: var("GOOGLE_CLOUD_STORAGE_BUCKET")
                    .ok_or(ConfigError::Missing("GOOGLE_CLOUD_STORAGE_BUCKET"))?,
            },
            "local" => {
                let base = var("PUBLIC_BASE_URL").unwrap_or_else(|| {
                    let shown = if host.is_unspecified() {
                        "localhost".to_string()
                    } else {
                        host.to_string()
                    };
                    format!("http://{shown}:{port}")
                });
                BlobBackend::Local {
                    root: PathBuf::from(var("LOCAL_MEDIA_DIR").unwrap_or_else(|| "./media".into())),
                    public_base: format!("{}/media", base.trim_end_matches('/')),
                }
            }
            other => {
                return Err(ConfigError::Invalid {
                    name: "BLOB_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        let credentials = if let Some(token) = var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            CredentialSource::AccessToken(token)
        } else if let Some(encoded) = var("GOOGLE_CREDENTIALS_BASE64") {
            CredentialSource::Encoded(encoded)
        } else if let Some(path) = var("GOOGLE_APPLICATION_CREDENTIALS") {
            CredentialSource::File(PathBuf::from(path))
        } else {
            CredentialSource::Metadata
        };

        Ok(Self {
            host,
            port,
            store,
            blobs,
            credentials,
            max_upload_bytes,
        })
    }

    /// Whether any configured backend talks to Google Cloud with credentials.
    pub fn needs_google_auth(&self) -> bool {
        let datastore = matches!(
            self.store,
            StoreBackend::Datastore {
                emulator_host: None,
                ..
            }
        );
        datastore || matches!(self.blobs, BlobBackend::Gcs { .. })
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

/// Decode inline base64 credentials into `dir/google-credentials.json`
/// and return the file's path.
pub fn materialize_credentials(encoded: &str, dir: &Path) -> Result<PathBuf, ConfigError> {
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ConfigError::Credentials(e.to_string()))?;
    if serde_json::from_slice::<serde_json::Value>(&decoded).is_err() {
        return Err(ConfigError::Credentials("decoded value is not JSON".into()));
    }

    let path = dir.join(CREDENTIALS_FILE_NAME);
    std::fs::write(&path, decoded)?;
    tracing::info!("google credentials written to {}", path.display());
    Ok(path)
}
