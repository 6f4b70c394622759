//! # Transcription Engine
//!
//! Engine-agnostic transcription driver. Concrete speech engines sit behind
//! the [`TranscriptionBackend`] / [`LoadedModel`] / [`SpeechRecognizer`]
//! traits; this module owns what is actually contractual about
//! transcription:
//!
//! - the audio must be mono 16-bit PCM (the ingestion pipeline normalized it
//!   exactly once),
//! - the stream is fed to the recognizer in fixed-size frame chunks with a
//!   final flush for any trailing result,
//! - degenerate recognizer fragments (a result with no word list, a known
//!   engine quirk rather than an error) are silently filtered out,
//! - the surviving words are flattened into one sequence in stream order.
//!
//! Chunk size is an internal performance detail, not an observable contract.

use crate::error::{AppError, AppResult};
use crate::transcription::model::ModelSpec;
use crate::transcription::word::TranscriptWord;
use std::path::Path;
use std::sync::Arc;

/// Frames fed to the recognizer per call.
pub const CHUNK_FRAMES: usize = 4000;

/// One raw word from a recognizer fragment, offsets in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// One flushed decoding result from the recognizer.
///
/// `words` is `None` when the engine produced a degenerate fragment (text
/// only, no word list). Those fragments are dropped during normalization.
#[derive(Debug, Clone, Default)]
pub struct RecognizerFragment {
    pub text: String,
    pub words: Option<Vec<RawWord>>,
}

/// Stateful decoder for one audio stream. Consumes the stream monotonically,
/// so emitted words never need deduplication or re-sorting.
pub trait SpeechRecognizer: Send {
    /// Feed one chunk of mono 16-bit PCM frames. Returns a fragment when the
    /// engine finalized an utterance on this chunk.
    fn accept_waveform(&mut self, samples: &[i16]) -> AppResult<Option<RecognizerFragment>>;

    /// Flush any trailing partial result.
    fn finalize(&mut self) -> AppResult<RecognizerFragment>;
}

/// A model materialized in memory, shareable read-only across concurrent
/// transcriptions. Each transcription opens its own recognizer.
pub trait LoadedModel: Send + Sync {
    /// Human-readable model name for logs.
    fn name(&self) -> &str;

    fn create_recognizer(&self, sample_rate: u32) -> AppResult<Box<dyn SpeechRecognizer>>;
}

/// Polymorphic adapter over concrete speech-recognition engines.
pub trait TranscriptionBackend: Send + Sync {
    /// Load the model resource described by `spec` into memory.
    ///
    /// Fails with `ModelLoad` when the resource is missing or corrupt.
    fn load_model(&self, spec: &ModelSpec) -> AppResult<Arc<dyn LoadedModel>>;
}

/// Placeholder backend used when the binary was built without a speech
/// engine feature. Every load fails with a clear `ModelLoad` error instead
/// of a confusing panic at request time.
pub struct UnconfiguredBackend;

impl TranscriptionBackend for UnconfiguredBackend {
    fn load_model(&self, spec: &ModelSpec) -> AppResult<Arc<dyn LoadedModel>> {
        Err(AppError::ModelLoad(format!(
            "cannot load {}: server was built without a speech engine (enable the `vosk` feature)",
            spec.name
        )))
    }
}

/// Transcribe a normalized mono WAV file with an already-loaded model.
///
/// ## Process:
/// 1. Open and validate the WAV (mono, 16-bit integer PCM)
/// 2. Feed the samples to a fresh recognizer in [`CHUNK_FRAMES`] chunks
/// 3. Flush the trailing result
/// 4. Filter degenerate fragments and flatten into `TranscriptWord`s
///
/// ## Failures:
/// - Unreadable or non-mono/non-16-bit audio → `AudioFormat`
/// - Recognizer construction/decoding failures bubble up unchanged
pub fn transcribe_wav(model: &dyn LoadedModel, wav_path: &Path) -> AppResult<Vec<TranscriptWord>> {
    let mut reader = hound::WavReader::open(wav_path)
        .map_err(|e| AppError::AudioFormat(format!("failed to open {}: {}", wav_path.display(), e)))?;

    let spec = reader.spec();
    if spec.channels != 1 {
        return Err(AppError::AudioFormat(format!(
            "expected mono audio, got {} channels",
            spec.channels
        )));
    }
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(AppError::AudioFormat(format!(
            "expected 16-bit integer PCM, got {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::AudioFormat(format!("failed to read samples: {}", e)))?;

    let mut recognizer = model.create_recognizer(spec.sample_rate)?;

    let mut fragments = Vec::new();
    for chunk in samples.chunks(CHUNK_FRAMES) {
        if let Some(fragment) = recognizer.accept_waveform(chunk)? {
            fragments.push(fragment);
        }
    }
    fragments.push(recognizer.finalize()?);

    let words = collect_words(fragments);

    tracing::debug!(
        model = model.name(),
        words = words.len(),
        duration_secs = samples.len() as f64 / spec.sample_rate as f64,
        "transcription complete"
    );

    Ok(words)
}

/// Normalize recognizer fragments into the canonical word sequence.
///
/// Fragments with no word list are a known engine quirk and are dropped, not
/// errors. The filter is idempotent: every surviving entry carries words.
pub fn collect_words(fragments: Vec<RecognizerFragment>) -> Vec<TranscriptWord> {
    fragments
        .into_iter()
        .filter_map(|fragment| fragment.words)
        .flatten()
        .map(|raw| TranscriptWord {
            text: raw.word,
            start: raw.start,
            end: raw.end,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted backend used by engine and pipeline tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Recognizer that replays a fixed script of fragments: one per
    /// `accept_waveform` call until the script runs dry, then an empty final
    /// flush. Also counts every sample it was fed.
    pub struct ScriptedRecognizer {
        fragments: Vec<RecognizerFragment>,
        pub samples_seen: Arc<AtomicUsize>,
        pub chunks_seen: Arc<AtomicUsize>,
        final_fragment: RecognizerFragment,
    }

    impl SpeechRecognizer for ScriptedRecognizer {
        fn accept_waveform(&mut self, samples: &[i16]) -> AppResult<Option<RecognizerFragment>> {
            self.samples_seen.fetch_add(samples.len(), Ordering::SeqCst);
            self.chunks_seen.fetch_add(1, Ordering::SeqCst);
            if self.fragments.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.fragments.remove(0)))
            }
        }

        fn finalize(&mut self) -> AppResult<RecognizerFragment> {
            Ok(self.final_fragment.clone())
        }
    }

    pub struct ScriptedModel {
        name: String,
        fragments: Mutex<Vec<RecognizerFragment>>,
        final_fragment: RecognizerFragment,
        pub samples_seen: Arc<AtomicUsize>,
        pub chunks_seen: Arc<AtomicUsize>,
    }

    impl ScriptedModel {
        pub fn new(fragments: Vec<RecognizerFragment>, final_fragment: RecognizerFragment) -> Self {
            ScriptedModel {
                name: "scripted".to_string(),
                fragments: Mutex::new(fragments),
                final_fragment,
                samples_seen: Arc::new(AtomicUsize::new(0)),
                chunks_seen: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Convenience: a model whose final flush carries the given words.
        pub fn with_words(words: Vec<RawWord>) -> Self {
            Self::new(
                Vec::new(),
                RecognizerFragment {
                    text: words.iter().map(|w| w.word.clone()).collect::<Vec<_>>().join(" "),
                    words: Some(words),
                },
            )
        }
    }

    impl LoadedModel for ScriptedModel {
        fn name(&self) -> &str {
            &self.name
        }

        fn create_recognizer(&self, _sample_rate: u32) -> AppResult<Box<dyn SpeechRecognizer>> {
            Ok(Box::new(ScriptedRecognizer {
                fragments: self.fragments.lock().unwrap().clone(),
                samples_seen: self.samples_seen.clone(),
                chunks_seen: self.chunks_seen.clone(),
                final_fragment: self.final_fragment.clone(),
            }))
        }
    }

    /// Backend returning scripted models; counts loads for single-flight
    /// registry tests.
    pub struct ScriptedBackend {
        pub loads: Arc<AtomicUsize>,
        pub fail_loads: bool,
        words: Vec<RawWord>,
    }

    impl ScriptedBackend {
        pub fn new(words: Vec<RawWord>) -> Self {
            ScriptedBackend {
                loads: Arc::new(AtomicUsize::new(0)),
                fail_loads: false,
                words,
            }
        }

        pub fn failing() -> Self {
            ScriptedBackend {
                loads: Arc::new(AtomicUsize::new(0)),
                fail_loads: true,
                words: Vec::new(),
            }
        }
    }

    impl TranscriptionBackend for ScriptedBackend {
        fn load_model(&self, spec: &ModelSpec) -> AppResult<Arc<dyn LoadedModel>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail_loads {
                return Err(AppError::ModelLoad(format!("scripted failure for {}", spec.name)));
            }
            Ok(Arc::new(ScriptedModel::with_words(self.words.clone())))
        }
    }

    pub fn raw(word: &str, start: f64, end: f64) -> RawWord {
        RawWord {
            word: word.to_string(),
            start,
            end,
        }
    }
}
