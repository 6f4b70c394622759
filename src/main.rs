//! # Sentence Mixer Backend - Main Application Entry Point
//!
//! HTTP backend for transcript-driven media remixing: clients upload an
//! audio or video source, receive a word-level transcript, and get back new
//! clips assembled from the words they select.
//!
//! ## Application Architecture:
//! - **config**: configuration loading (TOML file + environment variables)
//! - **error**: the application error taxonomy and HTTP error responses
//! - **state**: shared state handed to every request handler
//! - **session**: per-session artifact storage and the retention sweep
//! - **transcription**: model selection, the model registry, and the
//!   engine-agnostic recognition driver
//! - **media**: WAV handling, ffmpeg wrappers, and clip reconstruction
//! - **pipeline**: the ingestion and generation flows
//! - **handlers**: the HTTP endpoints (`PUT /source`, `PUT /generate`)
//! - **health**: the health/metrics endpoint

mod config;
mod error;
mod handlers;
mod health;
mod media;
mod pipeline;
mod session;
mod state;
mod transcription;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use session::store::SessionStore;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcription::engine::TranscriptionBackend;
use transcription::registry::ModelRegistry;

/// Global shutdown signal set by the signal handler task.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting sentence-mixer-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let store = Arc::new(SessionStore::new(config.storage.root.clone())?);
    let registry = Arc::new(ModelRegistry::new(speech_backend()));

    // Background sweep reclaiming expired session directories.
    tokio::spawn(session::sweep::run_periodic(
        store.clone(),
        Duration::from_secs(config.storage.sweep_interval_secs),
        Duration::from_secs(config.storage.retention_secs),
    ));

    let app_state = AppState::new(config.clone(), store, registry);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .route("/source", web::put().to(handlers::upload_source))
            .route("/generate", web::put().to(handlers::generate_output))
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// The speech engine this binary was built with. Without the `vosk` feature
/// the server still runs (and can serve generation for already-transcribed
/// sessions), but every ingest fails with a clear model-load error.
#[cfg(feature = "vosk")]
fn speech_backend() -> Arc<dyn TranscriptionBackend> {
    Arc::new(transcription::vosk::VoskBackend)
}

#[cfg(not(feature = "vosk"))]
fn speech_backend() -> Arc<dyn TranscriptionBackend> {
    tracing::warn!("built without a speech engine; uploads cannot be transcribed");
    Arc::new(transcription::engine::UnconfiguredBackend)
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentence_mixer_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Listen for SIGTERM/SIGINT and flip the global shutdown flag.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
