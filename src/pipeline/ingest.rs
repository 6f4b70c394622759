//! # Ingestion Pipeline
//!
//! Drives an uploaded source from raw bytes to a client-ready transcript:
//! persist the source, derive the normalized mono audio, run speech
//! recognition, and publish the transcript artifact.
//!
//! Each stage transition is logged with the session key so an operator can
//! see where a slow or failed upload got stuck. The transcript artifact is
//! written only after transcription succeeds; a failed ingest never leaves a
//! partial transcript behind.

use crate::error::{AppError, AppResult};
use crate::media::{ffmpeg, wav};
use crate::session::store::{ArtifactKind, SessionHandle, SessionStore};
use crate::transcription::engine::transcribe_wav;
use crate::transcription::model::ModelSelector;
use crate::transcription::registry::ModelRegistry;
use crate::transcription::word::encode_transcript;
use std::fmt;
use std::sync::Arc;

/// Observable checkpoints of one ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    Stored,
    AudioExtracted,
    Transcribing,
    TranscriptReady,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Received => "received",
            IngestStage::Stored => "stored",
            IngestStage::AudioExtracted => "audio_extracted",
            IngestStage::Transcribing => "transcribing",
            IngestStage::TranscriptReady => "transcript_ready",
        };
        f.write_str(name)
    }
}

/// One upload, already pulled off the wire by the handler.
#[derive(Debug)]
pub struct IngestRequest {
    pub session_key: String,
    pub language: String,
    pub use_high_accuracy: bool,
    pub is_video: bool,
    pub payload: Vec<u8>,
}

/// The ingest result: the wire-format transcript JSON handed back to the
/// client (and persisted verbatim as the transcript artifact).
#[derive(Debug)]
pub struct IngestOutcome {
    pub words_json: String,
    pub word_count: usize,
}

/// Synchronous ingestion pipeline. All of this is blocking work (filesystem,
/// ffmpeg, recognition), so callers run it off the request threads.
pub struct IngestPipeline {
    store: Arc<SessionStore>,
    selector: ModelSelector,
    registry: Arc<ModelRegistry>,
}

impl IngestPipeline {
    pub fn new(store: Arc<SessionStore>, selector: ModelSelector, registry: Arc<ModelRegistry>) -> Self {
        IngestPipeline {
            store,
            selector,
            registry,
        }
    }

    fn stage(&self, key: &str, stage: IngestStage) {
        tracing::info!(session = key, stage = %stage, "ingest");
    }

    /// Run the full ingestion for one upload.
    ///
    /// ## Process:
    /// 1. Resolve the model (unsupported language fails before any write)
    /// 2. Persist the source artifact as uploaded
    /// 3. Derive mono 16-bit PCM audio (in-process for plain WAV uploads,
    ///    ffmpeg for video and everything else)
    /// 4. Transcribe with the shared loaded model
    /// 5. Publish the transcript artifact and return its JSON
    pub fn run(&self, request: IngestRequest) -> AppResult<IngestOutcome> {
        let key = request.session_key.as_str();
        self.stage(key, IngestStage::Received);

        let spec = self.selector.select(&request.language, request.use_high_accuracy)?;

        let session = self.store.create_or_open(key)?;

        let source_kind = if request.is_video {
            ArtifactKind::SourceVideo
        } else {
            ArtifactKind::SourceAudio
        };
        self.store.write_artifact(&session, source_kind, &request.payload)?;
        self.stage(key, IngestStage::Stored);

        let audio_path = self.normalize_audio(&session, source_kind, &request.payload)?;
        self.stage(key, IngestStage::AudioExtracted);

        self.stage(key, IngestStage::Transcribing);
        let model = self.registry.acquire(&spec)?;
        let words = transcribe_wav(model.as_ref(), &audio_path)?;

        let words_json = encode_transcript(&words)?;
        self.store
            .write_artifact(&session, ArtifactKind::Transcript, words_json.as_bytes())?;
        self.stage(key, IngestStage::TranscriptReady);

        Ok(IngestOutcome {
            word_count: words.len(),
            words_json,
        })
    }

    /// Produce the session's normalized mono 16-bit PCM audio artifact.
    ///
    /// Plain 16-bit WAV uploads (including multichannel, which is downmixed)
    /// are converted in process; video and any other audio container go
    /// through ffmpeg.
    fn normalize_audio(
        &self,
        session: &SessionHandle,
        source_kind: ArtifactKind,
        payload: &[u8],
    ) -> AppResult<std::path::PathBuf> {
        let temp = self.store.temp_path(session, ".wav");

        if source_kind == ArtifactKind::SourceAudio {
            if let Some(pcm) = wav::normalize_wav_bytes(payload) {
                wav::write_mono_wav(&temp, &pcm)?;
                return self
                    .store
                    .promote_artifact(session, ArtifactKind::NormalizedAudio, &temp);
            }
        }

        let source_path = self.store.artifact_path(session, source_kind);
        ffmpeg::extract_audio(&source_path, &temp).map_err(classify_extract_error)?;
        self.store
            .promote_artifact(session, ArtifactKind::NormalizedAudio, &temp)
    }
}

/// A source ffmpeg ran on but could not read is the client's problem;
/// a missing or unspawnable ffmpeg is ours.
fn classify_extract_error(err: ffmpeg::FfmpegError) -> AppError {
    match err {
        ffmpeg::FfmpegError::Failed { .. } => AppError::AudioFormat(err.to_string()),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::transcription::engine::testing::{raw, ScriptedBackend};
    use std::io::Cursor;

    fn wav_payload(channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    fn pipeline(backend: ScriptedBackend) -> (tempfile::TempDir, Arc<SessionStore>, IngestPipeline) {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::new(tmp.path().join("storage")).unwrap());
        let config = AppConfig::default();
        let pipeline = IngestPipeline::new(
            store.clone(),
            ModelSelector::new(config.models),
            Arc::new(ModelRegistry::new(Arc::new(backend))),
        );
        (tmp, store, pipeline)
    }

    fn audio_request(key: &str, language: &str) -> IngestRequest {
        IngestRequest {
            session_key: key.to_string(),
            language: language.to_string(),
            use_high_accuracy: false,
            is_video: false,
            payload: wav_payload(1, &vec![0i16; 16000]),
        }
    }

    #[test]
    fn test_ingest_produces_wire_transcript_and_artifacts() {
        let backend = ScriptedBackend::new(vec![raw("hi", 0.93, 1.32), raw("there", 1.4, 2.0)]);
        let (_tmp, store, pipeline) = pipeline(backend);

        let outcome = pipeline.run(audio_request("1700000000000", "en")).unwrap();
        assert_eq!(outcome.word_count, 2);

        let value: serde_json::Value = serde_json::from_str(&outcome.words_json).unwrap();
        assert_eq!(value[0]["id"], "0.93");
        assert_eq!(value[0]["end"], "1.32");
        assert_eq!(value[0]["word"], "hi");

        // Source, normalized audio, and transcript are all persisted; the
        // transcript artifact is the response bytes verbatim.
        let session = store.open_existing("1700000000000").unwrap();
        assert!(store.has_artifact(&session, ArtifactKind::SourceAudio));
        assert!(store.has_artifact(&session, ArtifactKind::NormalizedAudio));
        assert_eq!(
            store.read_artifact(&session, ArtifactKind::Transcript).unwrap(),
            outcome.words_json.as_bytes()
        );
    }

    #[test]
    fn test_ingest_downmixes_stereo_upload_in_process() {
        let backend = ScriptedBackend::new(vec![raw("a", 0.0, 0.5)]);
        let (_tmp, store, pipeline) = pipeline(backend);

        let request = IngestRequest {
            payload: wav_payload(2, &vec![100i16; 32000]),
            ..audio_request("1700000000001", "en")
        };
        pipeline.run(request).unwrap();

        let session = store.open_existing("1700000000001").unwrap();
        let pcm = wav::read_mono_wav(&store.artifact_path(&session, ArtifactKind::NormalizedAudio))
            .unwrap();
        // 32000 interleaved stereo samples -> 16000 mono frames.
        assert_eq!(pcm.samples.len(), 16000);
    }

    #[test]
    fn test_unsupported_language_fails_before_any_write() {
        let backend = ScriptedBackend::new(Vec::new());
        let (_tmp, store, pipeline) = pipeline(backend);

        let err = pipeline.run(audio_request("1700000000002", "xx")).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedLanguage(_)));
        assert!(store.open_existing("1700000000002").is_err());
    }

    #[test]
    fn test_failed_model_load_leaves_no_transcript() {
        let (_tmp, store, pipeline) = pipeline(ScriptedBackend::failing());

        let err = pipeline.run(audio_request("1700000000003", "en")).unwrap_err();
        assert!(matches!(err, AppError::ModelLoad(_)));

        let session = store.open_existing("1700000000003").unwrap();
        assert!(!store.has_artifact(&session, ArtifactKind::Transcript));
        // The source was persisted before the failure; re-ingest can retry.
        assert!(store.has_artifact(&session, ArtifactKind::SourceAudio));
    }

    #[test]
    fn test_reingest_replaces_transcript() {
        let backend = ScriptedBackend::new(vec![raw("first", 0.0, 1.0)]);
        let (_tmp, store, pipeline) = pipeline(backend);

        let first = pipeline.run(audio_request("1700000000004", "en")).unwrap();
        let second = pipeline.run(audio_request("1700000000004", "en")).unwrap();
        assert_eq!(first.words_json, second.words_json);

        let session = store.open_existing("1700000000004").unwrap();
        assert_eq!(
            store.read_artifact(&session, ArtifactKind::Transcript).unwrap(),
            second.words_json.as_bytes()
        );
    }

    #[test]
    fn test_unreadable_source_classified_as_audio_format() {
        use crate::media::ffmpeg::FfmpegError;
        use std::os::unix::process::ExitStatusExt;

        let failed = FfmpegError::Failed {
            status: std::process::ExitStatus::from_raw(256),
            stderr: "Invalid data found when processing input".to_string(),
        };
        assert!(matches!(
            classify_extract_error(failed),
            AppError::AudioFormat(_)
        ));

        // Operational failures stay server-side errors.
        assert!(matches!(
            classify_extract_error(FfmpegError::NotFound),
            AppError::Storage(_)
        ));
    }

    #[test]
    fn test_invalid_session_key_is_bad_request() {
        let backend = ScriptedBackend::new(Vec::new());
        let (_tmp, _store, pipeline) = pipeline(backend);

        let err = pipeline.run(audio_request("../escape", "en")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
