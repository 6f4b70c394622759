//! # Source Upload Handler
//!
//! `PUT /source`: multipart upload of one audio or video source. Fields:
//!
//! - `key`: session key (clients send a millisecond timestamp)
//! - `isVideo`: whether the payload is a video container
//! - `lang`: ISO 639-1 language code
//! - `useBigModel`: prefer the high-accuracy English model
//! - `file`: the media bytes
//!
//! Responds with `{"wordsJson": "<wire-format word array>"}`.

use crate::error::{AppError, AppResult};
use crate::pipeline::ingest::IngestRequest;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use serde_json::json;

/// Uploads larger than this are rejected before any processing.
const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// Accumulated multipart form fields.
#[derive(Default)]
struct UploadForm {
    key: Option<String>,
    is_video: Option<String>,
    lang: Option<String>,
    use_big_model: Option<String>,
    file: Option<Vec<u8>>,
}

/// Parse the loosely-typed boolean strings clients send for `isVideo` and
/// `useBigModel`. A missing field means false.
fn parse_flag(value: Option<&str>, field: &str) -> AppResult<bool> {
    match value {
        None => Ok(false),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            other => Err(AppError::BadRequest(format!(
                "field {} is not a boolean: {:?}",
                field, other
            ))),
        },
    }
}

async fn read_form(mut payload: actix_multipart::Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .ok_or_else(|| AppError::BadRequest("Missing field name".to_string()))?
            .to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
            if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(AppError::BadRequest(format!(
                    "upload exceeds {} bytes",
                    MAX_UPLOAD_BYTES
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "key" => form.key = Some(text_field(bytes, "key")?),
            "isVideo" => form.is_video = Some(text_field(bytes, "isVideo")?),
            "lang" => form.lang = Some(text_field(bytes, "lang")?),
            "useBigModel" => form.use_big_model = Some(text_field(bytes, "useBigModel")?),
            "file" => form.file = Some(bytes),
            // Unknown fields are ignored, not errors.
            _ => {}
        }
    }

    Ok(form)
}

fn text_field(bytes: Vec<u8>, field: &str) -> AppResult<String> {
    String::from_utf8(bytes)
        .map_err(|_| AppError::BadRequest(format!("field {} is not valid UTF-8", field)))
}

impl UploadForm {
    fn into_request(self) -> AppResult<IngestRequest> {
        let session_key = self
            .key
            .ok_or_else(|| AppError::BadRequest("missing field: key".to_string()))?;
        let language = self
            .lang
            .ok_or_else(|| AppError::BadRequest("missing field: lang".to_string()))?;
        let payload = self
            .file
            .ok_or_else(|| AppError::BadRequest("missing field: file".to_string()))?;
        if payload.is_empty() {
            return Err(AppError::BadRequest("uploaded file is empty".to_string()));
        }

        Ok(IngestRequest {
            session_key,
            language,
            use_high_accuracy: parse_flag(self.use_big_model.as_deref(), "useBigModel")?,
            is_video: parse_flag(self.is_video.as_deref(), "isVideo")?,
            payload,
        })
    }
}

/// Handle `PUT /source`.
pub async fn upload_source(
    state: web::Data<AppState>,
    payload: actix_multipart::Multipart,
) -> Result<HttpResponse, AppError> {
    state.record_request();

    let result = run_ingest(&state, payload).await;
    if result.is_err() {
        state.record_error();
    }
    result
}

async fn run_ingest(
    state: &web::Data<AppState>,
    payload: actix_multipart::Multipart,
) -> Result<HttpResponse, AppError> {
    let request = read_form(payload).await?.into_request()?;

    tracing::info!(
        session = %request.session_key,
        language = %request.language,
        is_video = request.is_video,
        bytes = request.payload.len(),
        "source upload received"
    );

    state.ingest_started();
    let pipeline = state.ingest.clone();
    let outcome = web::block(move || pipeline.run(request)).await;
    state.ingest_finished();

    let outcome = outcome
        .map_err(|e| AppError::Storage(format!("ingest task failed: {}", e)))??;

    Ok(HttpResponse::Ok().json(json!({ "wordsJson": outcome.words_json })))
}
