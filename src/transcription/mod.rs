//! # Transcription Module
//!
//! Everything between a normalized mono audio file and the canonical
//! word-timestamp transcript:
//!
//! - **word**: the `TranscriptWord` data model and the `{id, end, word}`
//!   wire format
//! - **model**: language set and model selection (the only place the
//!   language/accuracy matrix lives)
//! - **registry**: process-lifetime model cache with single-flight loading
//! - **engine**: engine-agnostic chunked decoding driver and fragment
//!   normalization
//! - **vosk**: the concrete engine adapter (feature-gated, links libvosk)

pub mod engine;
pub mod model;
pub mod registry;
#[cfg(feature = "vosk")]
pub mod vosk;
pub mod word;
