mod classify;
mod routes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::Method;
use axum::http::header::CONTENT_TYPE;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use alcove_blob::FsBlobStore;
use alcove_db::Database;
use alcove_engine::{Engine, Limits, reaper, reconcile};
use alcove_types::RoomTtl;

use crate::routes::AppState;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alcove_server=debug,alcove_engine=info,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = env_or("ALCOVE_HOST", "0.0.0.0");
    let port: u16 = env_parse("ALCOVE_PORT", 3400);
    let db_path: PathBuf = env_or("ALCOVE_DB_PATH", "alcove.db").into();
    let blob_dir: PathBuf = env_or("ALCOVE_BLOB_DIR", "./blob-storage").into();
    let reap_interval_secs: u64 = env_parse("ALCOVE_REAP_INTERVAL_SECS", 3600);
    let reconcile_interval_secs: u64 = env_parse("ALCOVE_RECONCILE_INTERVAL_SECS", 6 * 3600);

    let default_ttl_hours: u64 = env_parse("ALCOVE_DEFAULT_TTL_HOURS", 24);
    let default_ttl = RoomTtl::from_hours(default_ttl_hours).unwrap_or(RoomTtl::OneDay);
    let limits = Limits {
        room_item_limit: env_parse("ALCOVE_ROOM_ITEM_LIMIT", 200),
        max_payload_bytes: env_parse("ALCOVE_MAX_PAYLOAD_BYTES", 50 * 1024 * 1024),
        default_ttl,
        ..Limits::default()
    };
    let body_limit = limits.max_payload_bytes as usize + 64 * 1024;

    // Init stores and engine
    let db = Arc::new(Database::open(&db_path)?);
    let blobs = Arc::new(FsBlobStore::new(blob_dir).await?);
    let engine = Arc::new(Engine::new(db, blobs, limits));

    // Background lifecycle tasks
    tokio::spawn(reaper::run_reaper_loop(engine.clone(), reap_interval_secs));
    tokio::spawn(reconcile::run_reconcile_loop(
        engine.clone(),
        reconcile_interval_secs,
    ));

    let state = AppState { engine };

    // CORS — permissive; the room code is the credential, not the origin.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE]);

    let app = Router::new()
        .route("/rooms", post(routes::create_room))
        .route(
            "/rooms/{code}",
            get(routes::get_room)
                .patch(routes::update_room)
                .delete(routes::delete_room),
        )
        .route(
            "/rooms/{code}/items",
            get(routes::list_items).post(routes::create_text_item),
        )
        .route("/rooms/{code}/files", post(routes::upload_file))
        .route("/rooms/{code}/history", get(routes::room_history))
        .route("/rooms/{code}/restore", post(routes::restore_room))
        .route("/items/{id}", get(routes::get_item).delete(routes::delete_item))
        .route("/items/{id}/data", get(routes::download_item))
        .route("/health", get(routes::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Alcove listening on {}", addr);
    info!(
        "Default room TTL: {} hours; reap interval: {}s",
        default_ttl_hours, reap_interval_secs
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
