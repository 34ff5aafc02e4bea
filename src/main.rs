//! AITC Sync Backend
//!
//! REST backend storing each user's installed apps and registered devices,
//! with SQLite or in-memory persistence.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod facade;
mod models;
mod storage;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, StorageKind};
use db::Repository;
use facade::CollectionFacade;
use storage::{MemoryStorage, StorageBackend};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<CollectionFacade>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting AITC Sync Backend");
    tracing::info!("Storage: {:?}", config.storage);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (AITC_API_PSK). Authentication is disabled!");
    }
    if config.ignore_unknown_fields {
        tracing::info!("Unknown record fields will be stored instead of rejected");
    }

    let storage = open_storage(&config).await?;
    let state = AppState {
        facade: Arc::new(CollectionFacade::new(
            storage,
            config.ignore_unknown_fields,
        )),
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Open the configured storage engine.
async fn open_storage(config: &Config) -> Result<Arc<dyn StorageBackend>, sqlx::Error> {
    match config.storage {
        StorageKind::Sqlite => {
            tracing::info!("Database path: {:?}", config.db_path);
            let pool = db::init_database(&config.db_path).await?;
            Ok(Arc::new(Repository::new(pool)))
        }
        StorageKind::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    let sync_routes = Router::new()
        .route("/{userid}/{collection}", get(api::get_collection))
        .route("/{userid}/{collection}/", get(api::get_collection))
        .route(
            "/{userid}/{collection}/{item}",
            get(api::get_item)
                .put(api::put_item)
                .delete(api::delete_item),
        )
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/1.0", sync_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
