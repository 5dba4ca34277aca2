use std::sync::Arc;

use crate::config::Config;
use crate::generation::references::ReferenceExtractor;
use crate::llm_client::throttle::Throttle;
use crate::llm_client::ModelConnector;
use crate::templates::store::TemplateStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Binds a model name and credential per request. Default: GeminiConnector.
    pub models: Arc<dyn ModelConnector>,
    /// Process-wide request throttle shared by every run.
    pub throttle: Arc<dyn Throttle>,
    pub templates: Arc<TemplateStore>,
    /// Turns reference URLs into text. Default: YoutubeExtractor.
    pub references: Arc<dyn ReferenceExtractor>,
}
