//! # Vosk Engine Adapter
//!
//! Thin adapter binding the engine-agnostic transcription traits to the
//! Vosk/Kaldi recognizer. Compiled only with the `vosk` cargo feature since
//! it links against the native libvosk library.
//!
//! The adapter intentionally contains no normalization logic; fragments are
//! passed through as the engine produced them (including the degenerate
//! no-word-list case) and the driver in `engine.rs` filters them.

use crate::error::{AppError, AppResult};
use crate::transcription::engine::{
    LoadedModel, RawWord, RecognizerFragment, SpeechRecognizer, TranscriptionBackend,
};
use crate::transcription::model::ModelSpec;
use std::sync::Arc;
use vosk::{CompleteResult, DecodingState, Model, Recognizer};

/// Backend producing Vosk models.
pub struct VoskBackend;

impl VoskBackend {
    pub fn new() -> Self {
        VoskBackend
    }
}

impl Default for VoskBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptionBackend for VoskBackend {
    fn load_model(&self, spec: &ModelSpec) -> AppResult<Arc<dyn LoadedModel>> {
        let path = spec.path.to_str().ok_or_else(|| {
            AppError::ModelLoad(format!("model path is not valid UTF-8: {}", spec.path.display()))
        })?;

        let model = Model::new(path).ok_or_else(|| {
            AppError::ModelLoad(format!(
                "failed to load model {} from {}",
                spec.name,
                spec.path.display()
            ))
        })?;

        Ok(Arc::new(VoskModel {
            name: spec.name.clone(),
            model,
        }))
    }
}

struct VoskModel {
    name: String,
    model: Model,
}

impl LoadedModel for VoskModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_recognizer(&self, sample_rate: u32) -> AppResult<Box<dyn SpeechRecognizer>> {
        let mut recognizer = Recognizer::new(&self.model, sample_rate as f32).ok_or_else(|| {
            AppError::ModelLoad(format!("failed to create recognizer for {}", self.name))
        })?;
        // Word-level timestamps are the whole point of this service.
        recognizer.set_words(true);

        Ok(Box::new(VoskRecognizer { inner: recognizer }))
    }
}

struct VoskRecognizer {
    inner: Recognizer,
}

impl VoskRecognizer {
    fn fragment_from(result: CompleteResult<'_>) -> RecognizerFragment {
        let single = result.single();
        match single {
            Some(res) => RecognizerFragment {
                text: res.text.to_string(),
                words: if res.result.is_empty() {
                    // The engine quirk: a finalized utterance with text-only
                    // payload and no word list.
                    None
                } else {
                    Some(
                        res.result
                            .iter()
                            .map(|w| RawWord {
                                word: w.word.to_string(),
                                start: w.start as f64,
                                end: w.end as f64,
                            })
                            .collect(),
                    )
                },
            },
            None => RecognizerFragment::default(),
        }
    }
}

impl SpeechRecognizer for VoskRecognizer {
    fn accept_waveform(&mut self, samples: &[i16]) -> AppResult<Option<RecognizerFragment>> {
        match self.inner.accept_waveform(samples) {
            Ok(DecodingState::Finalized) => Ok(Some(Self::fragment_from(self.inner.result()))),
            Ok(DecodingState::Running) => Ok(None),
            Ok(DecodingState::Failed) | Err(_) => Err(AppError::AudioFormat(
                "recognizer failed to decode waveform".to_string(),
            )),
        }
    }

    fn finalize(&mut self) -> AppResult<RecognizerFragment> {
        Ok(Self::fragment_from(self.inner.final_result()))
    }
}
