//! Axum route handlers for the prompt template API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::errors::{AppError, AppJson};
use crate::generation::composer::{compose_prompt, PartPosition, PromptInputs};
use crate::generation::voice::topic_category;
use crate::models::story::{PreviewRequest, PreviewResponse};
use crate::models::template::{PromptTemplateResponse, SavePromptRequest};
use crate::state::AppState;
use crate::templates::store::Templates;

/// GET /api/v1/prompts
pub async fn handle_list_prompts(State(state): State<AppState>) -> Json<Templates> {
    Json(state.templates.list().await)
}

/// GET /api/v1/prompts/:id
pub async fn handle_get_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PromptTemplateResponse>, AppError> {
    let template = state
        .templates
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Prompt template '{id}' not found")))?;

    Ok(Json(PromptTemplateResponse { id, template }))
}

/// POST /api/v1/prompts
///
/// Creates or replaces a template. Bodies referencing unknown placeholders are
/// rejected here, so a stored template always composes.
pub async fn handle_save_prompt(
    State(state): State<AppState>,
    AppJson(request): AppJson<SavePromptRequest>,
) -> Result<(StatusCode, Json<PromptTemplateResponse>), AppError> {
    let template = state
        .templates
        .save(&request.prompt_id, &request.name, &request.template)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PromptTemplateResponse {
            id: request.prompt_id.trim().to_string(),
            template,
        }),
    ))
}

/// DELETE /api/v1/prompts/:id
pub async fn handle_delete_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if !state.templates.delete(&id).await? {
        return Err(AppError::NotFound(format!(
            "Prompt template '{id}' not found or cannot be deleted"
        )));
    }
    Ok(Json(json!({ "message": format!("Prompt template '{id}' deleted") })))
}

/// POST /api/v1/prompts/preview
///
/// Composes the prompt a run would send for one part. No model call.
pub async fn handle_preview_prompt(
    State(state): State<AppState>,
    AppJson(request): AppJson<PreviewRequest>,
) -> Result<Json<PreviewResponse>, AppError> {
    if request.topic.trim().is_empty() {
        return Err(AppError::Validation("topic is required".to_string()));
    }

    let total_parts = state.config.run_settings().clamp_parts(request.total_parts);
    let position = PartPosition::of(request.part_number, total_parts)?;

    let (template, template_id) = match request.template {
        Some(body) => (Some(body), None),
        None => match state.templates.get(&request.prompt_id).await {
            Some(stored) => (Some(stored.template), Some(request.prompt_id.clone())),
            None => (None, None),
        },
    };

    let prompt = compose_prompt(
        &PromptInputs {
            topic: &request.topic,
            expertise: &request.expertise,
            tone: &request.tone,
            writing_style: &request.writing_style,
            context: &request.context,
            part_number: request.part_number,
            total_parts,
            summaries: &request.summaries,
        },
        template.as_deref(),
    )?;

    Ok(Json(PreviewResponse {
        prompt,
        position,
        topic_category: topic_category(&request.topic),
        template_id,
    }))
}
