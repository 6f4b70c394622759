//! # Generation Handler
//!
//! `PUT /generate`: JSON body selecting words from an ingested session:
//!
//! ```json
//! {
//!   "sessionKey": "1700000000000",
//!   "chosenWords": [{"id": "0.93", "end": "1.32", "word": "hi"}],
//!   "isVideo": false,
//!   "audioOnly": false
//! }
//! ```
//!
//! `chosenWords` may also arrive as a JSON-encoded string (some clients
//! double-encode the array); both shapes are accepted. The response body is
//! the generated media, served as `audio/wav` or `video/mp4`.

use crate::error::{AppError, AppResult};
use crate::pipeline::generate::GenerateRequest;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

/// The selected word array, either inline or double-encoded.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChosenWords {
    Encoded(String),
    Inline(Vec<serde_json::Value>),
}

impl ChosenWords {
    fn into_json(self) -> AppResult<String> {
        match self {
            ChosenWords::Encoded(json) => Ok(json),
            ChosenWords::Inline(words) => Ok(serde_json::to_string(&words)?),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    pub session_key: String,
    pub chosen_words: ChosenWords,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub audio_only: bool,
}

impl GenerateBody {
    fn into_request(self) -> AppResult<GenerateRequest> {
        Ok(GenerateRequest {
            session_key: self.session_key,
            chosen_words_json: self.chosen_words.into_json()?,
            is_video: self.is_video,
            audio_only: self.audio_only,
        })
    }
}

/// Handle `PUT /generate`.
pub async fn generate_output(
    state: web::Data<AppState>,
    body: web::Json<GenerateBody>,
) -> Result<HttpResponse, AppError> {
    state.record_request();

    let result = run_generate(&state, body.into_inner()).await;
    if result.is_err() {
        state.record_error();
    }
    result
}

async fn run_generate(
    state: &web::Data<AppState>,
    body: GenerateBody,
) -> Result<HttpResponse, AppError> {
    let request = body.into_request()?;

    tracing::info!(
        session = %request.session_key,
        is_video = request.is_video,
        audio_only = request.audio_only,
        "generation requested"
    );

    let pipeline = state.generate.clone();
    let outcome = web::block(move || pipeline.run(request))
        .await
        .map_err(|e| AppError::Storage(format!("generate task failed: {}", e)))??;

    Ok(HttpResponse::Ok()
        .content_type(outcome.content_type)
        .body(outcome.bytes))
}
