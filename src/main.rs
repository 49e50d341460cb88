use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use league_admin_api::cache::Cache;
use league_admin_api::commands;
use league_admin_api::config::{self, BlobBackend, Config, CredentialSource, StoreBackend};
use league_admin_api::db::{DatastoreStore, EntityStore, MemoryStore, SqliteStore};
use league_admin_api::gcp::{Credentials, TokenSource};
use league_admin_api::storage::{BlobStore, GcsBlobStore, LocalBlobStore};
use league_admin_api::{app, AppState, HttpOptions};

/// League admin API server and maintenance jobs
#[derive(Parser)]
#[command(name = "league_admin_api")]
#[command(about = "League admin API", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Give every player without a team a placeholder team
    BackfillPlayerTeam {
        #[arg(long, default_value = "Unknown")]
        value: String,
    },

    /// Delete every player and its image
    PurgePlayers,
}

struct Backends {
    store: Arc<dyn EntityStore>,
    blobs: Arc<dyn BlobStore>,
}

async fn connect(config: &Config) -> Result<Backends> {
    let http = reqwest::Client::new();

    let tokens = if config.needs_google_auth() {
        let credentials = match &config.credentials {
            CredentialSource::AccessToken(token) => Credentials::Static(token.clone()),
            CredentialSource::Encoded(encoded) => {
                let path = config::materialize_credentials(encoded, &std::env::temp_dir())?;
                Credentials::from_file(&path)?
            }
            CredentialSource::File(path) => Credentials::from_file(path)
                .with_context(|| format!("reading {}", path.display()))?,
            CredentialSource::Metadata => Credentials::Metadata,
        };
        tracing::info!("Using Google credentials: {:?}", credentials);
        Some(Arc::new(TokenSource::new(http.clone(), credentials)))
    } else {
        None
    };
    let token_source = || tokens.clone().context("Google credentials are not configured");

    let store: Arc<dyn EntityStore> = match &config.store {
        StoreBackend::Datastore {
            project_id,
            emulator_host: Some(host),
        } => {
            tracing::info!("Using Datastore emulator at {}", host);
            Arc::new(DatastoreStore::emulator(http.clone(), host, project_id.clone()))
        }
        StoreBackend::Datastore { project_id, .. } => {
            tracing::info!("Using Datastore project {}", project_id);
            Arc::new(DatastoreStore::new(http.clone(), project_id.clone(), token_source()?))
        }
        StoreBackend::Sqlite { database_url } => {
            let store = SqliteStore::connect(database_url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connection established.");
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let blobs: Arc<dyn BlobStore> = match &config.blobs {
        BlobBackend::Gcs { bucket } => {
            tracing::info!("Using Cloud Storage bucket {}", bucket);
            Arc::new(GcsBlobStore::new(http, bucket.clone(), token_source()?))
        }
        BlobBackend::Local { root, public_base } => {
            tokio::fs::create_dir_all(root)
                .await
                .with_context(|| format!("creating {}", root.display()))?;
            tracing::info!("Storing media in {}", root.display());
            Arc::new(LocalBlobStore::new(root.clone(), public_base.clone()))
        }
    };

    Ok(Backends { store, blobs })
}

async fn serve(config: Config, backends: Backends) -> Result<()> {
    let media_dir = match &config.blobs {
        BlobBackend::Local { root, .. } => Some(root.clone()),
        BlobBackend::Gcs { .. } => None,
    };
    let state = AppState::new(backends.store, backends.blobs, Cache::default());
    let app = app(
        state,
        HttpOptions {
            media_dir,
            max_upload_bytes: config.max_upload_bytes,
        },
    );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .context("Failed to start server.")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let backends = connect(&config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!("Starting api server...");
            serve(config, backends).await
        }
        Command::BackfillPlayerTeam { value } => {
            let updated = commands::backfill_player_team(backends.store.as_ref(), &value).await?;
            tracing::info!("Updated {} players without a team", updated);
            Ok(())
        }
        Command::PurgePlayers => {
            let deleted =
                commands::purge_players(backends.store.as_ref(), backends.blobs.as_ref()).await?;
            tracing::info!("Deleted {} players", deleted);
            Ok(())
        }
    }
}
