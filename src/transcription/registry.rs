//! # Model Registry
//!
//! Process-lifetime cache of loaded speech models, one per
//! `(language, accuracy-tier)` key. Concurrent transcription requests for
//! the same language share the loaded model read-only; concurrent first use
//! performs a single-flight load rather than loading the model twice.
//!
//! Load failures are reported to the caller but never cached, so a transient
//! failure (model still syncing to disk, for example) can be retried by the
//! next request.

use crate::error::AppResult;
use crate::transcription::engine::{LoadedModel, TranscriptionBackend};
use crate::transcription::model::{ModelKey, ModelSpec};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// One registry slot. The inner mutex serializes loading for this key only;
/// loads of different models proceed in parallel.
#[derive(Default)]
struct ModelSlot {
    model: Mutex<Option<Arc<dyn LoadedModel>>>,
}

/// Registry of loaded models keyed by language and accuracy tier.
pub struct ModelRegistry {
    backend: Arc<dyn TranscriptionBackend>,
    slots: Mutex<HashMap<ModelKey, Arc<ModelSlot>>>,
}

impl ModelRegistry {
    pub fn new(backend: Arc<dyn TranscriptionBackend>) -> Self {
        ModelRegistry {
            backend,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get the loaded model for `spec`, loading it on first use.
    ///
    /// ## Single-flight guarantee:
    /// The outer map lock is held only long enough to find or create the
    /// slot; the blocking load happens under the per-key slot lock, so two
    /// concurrent first uses of the same key result in exactly one load and
    /// two concurrent loads of *different* keys do not serialize each other.
    pub fn acquire(&self, spec: &ModelSpec) -> AppResult<Arc<dyn LoadedModel>> {
        let slot = {
            let mut slots = self.slots.lock().unwrap();
            slots.entry(spec.key).or_default().clone()
        };

        let mut guard = slot.model.lock().unwrap();
        if let Some(model) = guard.as_ref() {
            return Ok(model.clone());
        }

        tracing::info!(model = %spec.name, key = %spec.key, "loading speech model");
        let started = Instant::now();
        let model = self.backend.load_model(spec)?;
        tracing::info!(
            model = %spec.name,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "speech model loaded"
        );

        *guard = Some(model.clone());
        Ok(model)
    }

    /// Number of models currently resident (for the health endpoint).
    pub fn loaded_count(&self) -> usize {
        let slots = self.slots.lock().unwrap();
        slots
            .values()
            .filter(|slot| slot.model.lock().unwrap().is_some())
            .count()
    }
}
