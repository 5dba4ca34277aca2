//! Axum route handlers for the Generation API.

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use tracing::warn;

use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::errors::{AppError, AppJson};
use crate::generation::generator::{generate_story, StoryPlan};
use crate::generation::voice::{Expertise, Tone, WritingStyle};
use crate::llm_client::{is_supported_model, GenerationClient, DEFAULT_MODEL, SUPPORTED_MODELS};
use crate::models::story::{DownloadRequest, GenerateRequest, GenerateResponse, OptionsResponse};
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const DOWNLOAD_FILENAME: &str = "generated_story.txt";

/// Server-side key first, then the caller's `x-api-key` header.
fn resolve_api_key(config: &Config, headers: &HeaderMap) -> Result<String, AppError> {
    if let Some(key) = &config.gemini_api_key {
        return Ok(key.clone());
    }
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::Unauthorized(format!(
                "A Gemini API key is required: set GEMINI_API_KEY or send the {API_KEY_HEADER} header"
            ))
        })
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(value)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/options
///
/// Allow-lists the UI offers: models, personas, tones, writing styles.
pub async fn handle_options(State(state): State<AppState>) -> Json<OptionsResponse> {
    Json(OptionsResponse {
        models: SUPPORTED_MODELS.to_vec(),
        default_model: DEFAULT_MODEL,
        expertise: Expertise::tags(),
        tones: Tone::tags(),
        writing_styles: WritingStyle::tags(),
        max_parts: state.config.max_parts,
    })
}

/// POST /api/v1/generate
///
/// Full pipeline: validate → resolve credential → references → part loop.
/// The run is cancelled if the client disconnects before it finishes.
pub async fn handle_generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(request): AppJson<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let topic = required(&request.topic, "topic")?;
    let expertise = required(&request.expertise, "expertise")?;
    let tone = required(&request.tone, "tone")?;

    expertise
        .parse::<Expertise>()
        .map_err(|e| AppError::Validation(format!("Invalid expertise: {e}")))?;
    tone.parse::<Tone>()
        .map_err(|e| AppError::Validation(format!("Invalid tone: {e}")))?;
    if !is_supported_model(&request.model) {
        return Err(AppError::Validation(format!(
            "Unsupported model '{}'",
            request.model
        )));
    }

    let writing_style = match request.writing_style.trim() {
        "" => WritingStyle::default(),
        style => style
            .parse::<WritingStyle>()
            .map_err(|e| AppError::Validation(format!("Invalid writing_style: {e}")))?,
    };

    let api_key = resolve_api_key(&state.config, &headers)?;

    let template = match state.templates.get(&request.prompt_id).await {
        Some(stored) => Some(stored.template),
        None => {
            warn!(
                "Prompt template '{}' not found; using the built-in structure",
                request.prompt_id
            );
            None
        }
    };

    let plan = StoryPlan {
        topic: topic.to_string(),
        expertise: expertise.to_string(),
        tone: tone.to_string(),
        writing_style: writing_style.as_str().to_string(),
        context: request.context.trim().to_string(),
        reference_urls: request.reference_urls,
        total_parts: request.total_parts,
        template,
    };

    let cancel = CancellationToken::new();
    let on_disconnect = cancel.drop_guard();
    let client = GenerationClient::new(
        state.models.connect(&request.model, &api_key),
        state.config.retry_policy(),
        state.throttle.clone(),
    )
    .with_cancellation(cancel);

    let result = generate_story(
        &client,
        state.references.as_ref(),
        &plan,
        &state.config.run_settings(),
    )
    .await;
    on_disconnect.disarm();

    let output = result?;
    Ok(Json(GenerateResponse {
        success: true,
        story: output.story,
        parts: output.parts.len(),
        summaries: output.summaries,
        truncated: output.truncated,
    }))
}

/// POST /api/v1/download
///
/// Returns the story as a plain-text attachment.
pub async fn handle_download(
    AppJson(request): AppJson<DownloadRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.story.trim().is_empty() {
        return Err(AppError::Validation(
            "No story content to download".to_string(),
        ));
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_FILENAME}\""),
            ),
        ],
        Bytes::from(request.story),
    ))
}
