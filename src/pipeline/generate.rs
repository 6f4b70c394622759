//! # Generation Pipeline
//!
//! Turns a client's word selection into output media for an existing
//! session. Generation is read-only with respect to the session's source and
//! transcript; only the output artifact is (atomically) replaced.

use crate::error::{AppError, AppResult};
use crate::media::reconstruct::{MediaReconstructor, OutputKind};
use crate::session::store::{ArtifactKind, SessionStore};
use crate::transcription::word::decode_selection;
use std::fmt;
use std::sync::Arc;

/// Observable checkpoints of one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateStage {
    RequestReceived,
    SourceLocated,
    Reconstructing,
    OutputReady,
}

impl fmt::Display for GenerateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerateStage::RequestReceived => "request_received",
            GenerateStage::SourceLocated => "source_located",
            GenerateStage::Reconstructing => "reconstructing",
            GenerateStage::OutputReady => "output_ready",
        };
        f.write_str(name)
    }
}

/// One generation request, decoded from the wire by the handler.
pub struct GenerateRequest {
    pub session_key: String,
    /// Wire-format word array (the same shape the client received at ingest)
    pub chosen_words_json: String,
    pub is_video: bool,
    pub audio_only: bool,
}

impl GenerateRequest {
    /// A video session can still ask for just the audio track.
    pub fn output_kind(&self) -> OutputKind {
        if self.is_video && !self.audio_only {
            OutputKind::Video
        } else {
            OutputKind::Audio
        }
    }
}

/// Generated media plus the content type the handler should serve it with.
#[derive(Debug)]
pub struct GenerateOutcome {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Synchronous generation pipeline; blocking work, run off request threads.
pub struct GeneratePipeline {
    store: Arc<SessionStore>,
    reconstructor: MediaReconstructor,
}

impl GeneratePipeline {
    pub fn new(store: Arc<SessionStore>) -> Self {
        GeneratePipeline {
            reconstructor: MediaReconstructor::new(store.clone()),
            store,
        }
    }

    fn stage(&self, key: &str, stage: GenerateStage) {
        tracing::info!(session = key, stage = %stage, "generate");
    }

    /// Run one generation end to end.
    ///
    /// ## Failures:
    /// - Session never ingested (no directory or no transcript) →
    ///   `SessionNotFound`
    /// - Malformed selection JSON → `BadRequest`
    /// - Empty or degenerate selection → `EmptySelection` / `InvalidRange`
    /// - Source media missing or unreadable → `SourceUnavailable`
    pub fn run(&self, request: GenerateRequest) -> AppResult<GenerateOutcome> {
        let key = request.session_key.as_str();
        self.stage(key, GenerateStage::RequestReceived);

        let session = self.store.open_existing(key)?;
        // A directory without a transcript is a session that never finished
        // ingestion; to the client that session does not exist.
        if !self.store.has_artifact(&session, ArtifactKind::Transcript) {
            return Err(AppError::SessionNotFound(key.to_string()));
        }
        self.stage(key, GenerateStage::SourceLocated);

        let ranges = decode_selection(&request.chosen_words_json)?;
        let kind = request.output_kind();

        self.stage(key, GenerateStage::Reconstructing);
        let bytes = self.reconstructor.reconstruct(&session, &ranges, kind)?;
        self.stage(key, GenerateStage::OutputReady);

        Ok(GenerateOutcome {
            bytes,
            content_type: kind.content_type(),
        })
    }
}
