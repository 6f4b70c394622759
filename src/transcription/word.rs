//! # Transcript Words and the Wire Format
//!
//! Canonical representation of one recognized spoken word, plus the JSON
//! shape exchanged with clients. The wire shape is the historical contract
//! of the service: each word is `{"id": "<start>", "end": "<end>", "word":
//! "<text>"}` with the time offsets serialized as strings and `id` doubling
//! as the start offset.
//!
//! Downstream selection is keyed purely on the `(start, end)` pair; the word
//! text is informational and never used as a lookup key.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// One recognized spoken word with start/end offsets in seconds from the
/// beginning of the source audio.
///
/// Created in bulk by the transcription backend during ingestion and
/// immutable afterwards; the generation side only ever reads these.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptWord {
    /// Recognized token
    pub text: String,

    /// Inclusive start offset (seconds), monotonically derived from the
    /// recognizer's frame position
    pub start: f64,

    /// End offset (seconds); invariant `end > start`
    pub end: f64,
}

/// A closed-open time interval `[start, end)` in seconds, selected for
/// extraction from the source media.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl From<&TranscriptWord> for TimeRange {
    fn from(word: &TranscriptWord) -> Self {
        TimeRange {
            start: word.start,
            end: word.end,
        }
    }
}

/// Wire representation of one word: `{"id": "0.93", "end": "1.32",
/// "word": "hi"}`. `id` is the start offset as a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireWord {
    pub id: String,
    pub end: String,
    pub word: String,
}

impl From<&TranscriptWord> for WireWord {
    fn from(word: &TranscriptWord) -> Self {
        WireWord {
            id: word.start.to_string(),
            end: word.end.to_string(),
            word: word.text.clone(),
        }
    }
}

impl WireWord {
    /// Parse the string-typed offsets back into a time range, rejecting
    /// malformed shapes at the boundary instead of failing deep inside
    /// reconstruction.
    pub fn time_range(&self) -> AppResult<TimeRange> {
        let start: f64 = self
            .id
            .trim()
            .parse()
            .map_err(|_| AppError::BadRequest(format!("word id is not a number: {:?}", self.id)))?;
        let end: f64 = self
            .end
            .trim()
            .parse()
            .map_err(|_| AppError::BadRequest(format!("word end is not a number: {:?}", self.end)))?;

        if !start.is_finite() || !end.is_finite() {
            return Err(AppError::BadRequest(format!(
                "word offsets must be finite: id {:?} end {:?}",
                self.id, self.end
            )));
        }

        Ok(TimeRange { start, end })
    }
}

/// Serialize a transcript to the wire JSON array. This exact string is both
/// the persisted transcript artifact and the `wordsJson` ingest response.
pub fn encode_transcript(words: &[TranscriptWord]) -> AppResult<String> {
    let wire: Vec<WireWord> = words.iter().map(WireWord::from).collect();
    Ok(serde_json::to_string(&wire)?)
}

/// Parse a client word selection into time ranges, preserving the caller's
/// order exactly. The sequence is deliberately NOT re-sorted by time;
/// out-of-order selections are the point of the feature.
pub fn decode_selection(json: &str) -> AppResult<Vec<TimeRange>> {
    let wire: Vec<WireWord> = serde_json::from_str(json)?;
    wire.iter().map(WireWord::time_range).collect()
}
