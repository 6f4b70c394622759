//! # Application State Management
//!
//! Shared state handed to every HTTP request handler: configuration, the
//! session store, the model registry, both pipelines, and request metrics.
//!
//! ## Sharing pattern:
//! - Immutable pieces (config, start time) are cloned or copied freely
//! - The store, registry, and pipelines are internally synchronized and
//!   shared behind `Arc`
//! - Metrics are the only handler-mutated state, behind `Arc<RwLock<_>>`;
//!   every access is a short lock-update-release

use crate::config::AppConfig;
use crate::pipeline::generate::GeneratePipeline;
use crate::pipeline::ingest::IngestPipeline;
use crate::session::store::SessionStore;
use crate::transcription::model::ModelSelector;
use crate::transcription::registry::ModelRegistry;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Request counters exposed by the health endpoint.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total HTTP requests handled since start
    pub request_count: u64,

    /// Requests that ended in an error response
    pub error_count: u64,

    /// Uploads currently being ingested (stored, extracted, or transcribing)
    pub active_ingests: u32,
}

/// State shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<SessionStore>,
    pub registry: Arc<ModelRegistry>,
    pub ingest: Arc<IngestPipeline>,
    pub generate: Arc<GeneratePipeline>,
    metrics: Arc<RwLock<AppMetrics>>,
    start_time: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<SessionStore>, registry: Arc<ModelRegistry>) -> Self {
        let selector = ModelSelector::new(config.models.clone());
        let ingest = Arc::new(IngestPipeline::new(store.clone(), selector, registry.clone()));
        let generate = Arc::new(GeneratePipeline::new(store.clone()));
        AppState {
            config: Arc::new(config),
            store,
            registry,
            ingest,
            generate,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.metrics.write().unwrap().request_count += 1;
    }

    pub fn record_error(&self) {
        self.metrics.write().unwrap().error_count += 1;
    }

    pub fn ingest_started(&self) {
        self.metrics.write().unwrap().active_ingests += 1;
    }

    pub fn ingest_finished(&self) {
        let mut metrics = self.metrics.write().unwrap();
        // Guard against underflow if finish is ever double-counted.
        if metrics.active_ingests > 0 {
            metrics.active_ingests -= 1;
        }
    }

    /// Snapshot the counters; the clone releases the lock before the caller
    /// serializes anything.
    pub fn metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap().clone()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
