use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.metrics_snapshot();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
        "service": {
            "name": "sentence-mixer-backend",
            "version": env!("CARGO_PKG_VERSION"),
            "host": state.config.server.host,
            "port": state.config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "active_ingests": metrics.active_ingests
        },
        "models": {
            "loaded": state.registry.loaded_count(),
            "dir": state.config.models.dir.display().to_string()
        },
        "storage": {
            "root": state.store.root().display().to_string(),
            "retention_secs": state.config.storage.retention_secs
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::session::store::SessionStore;
    use crate::transcription::engine::UnconfiguredBackend;
    use crate::transcription::registry::ModelRegistry;
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_health_reports_counters() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.root = tmp.path().join("storage");
        let store = Arc::new(SessionStore::new(config.storage.root.clone()).unwrap());
        let registry = Arc::new(ModelRegistry::new(Arc::new(UnconfiguredBackend)));
        let state = AppState::new(config, store, registry);
        state.record_request();

        let response = health_check(web::Data::new(state)).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::OK);
    }
}
