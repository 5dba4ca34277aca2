pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::generation::handlers as generation;
use crate::state::AppState;
use crate::templates::handlers as templates;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Generation API
        .route("/api/v1/options", get(generation::handle_options))
        .route("/api/v1/generate", post(generation::handle_generate))
        .route("/api/v1/download", post(generation::handle_download))
        // Prompt template API
        .route(
            "/api/v1/prompts",
            get(templates::handle_list_prompts).post(templates::handle_save_prompt),
        )
        .route(
            "/api/v1/prompts/preview",
            post(templates::handle_preview_prompt),
        )
        .route(
            "/api/v1/prompts/:id",
            get(templates::handle_get_prompt).delete(templates::handle_delete_prompt),
        )
        .with_state(state)
}
