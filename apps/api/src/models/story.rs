use serde::{Deserialize, Serialize};

use crate::generation::composer::PartPosition;
use crate::generation::voice::TopicCategory;
use crate::llm_client::DEFAULT_MODEL;

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_writing_style() -> String {
    "balanced".to_string()
}

fn default_total_parts() -> u32 {
    2
}

fn default_prompt_id() -> String {
    "default".to_string()
}

fn default_part_number() -> u32 {
    1
}

/// Body of `POST /api/v1/generate`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub expertise: String,
    #[serde(default)]
    pub tone: String,
    #[serde(default = "default_writing_style")]
    pub writing_style: String,
    #[serde(default)]
    pub context: String,
    #[serde(default, alias = "youtube_urls")]
    pub reference_urls: Vec<String>,
    #[serde(default = "default_total_parts")]
    pub total_parts: u32,
    #[serde(default = "default_prompt_id")]
    pub prompt_id: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub story: String,
    pub parts: usize,
    pub summaries: usize,
    pub truncated: bool,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub story: String,
}

#[derive(Debug, Serialize)]
pub struct OptionsResponse {
    pub models: Vec<&'static str>,
    pub default_model: &'static str,
    pub expertise: Vec<&'static str>,
    pub tones: Vec<&'static str>,
    pub writing_styles: Vec<&'static str>,
    pub max_parts: u32,
}

/// Body of `POST /api/v1/prompts/preview`.
///
/// `template` previews an unsaved body; otherwise `prompt_id` is looked up and
/// the built-in structure is used when it is missing.
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub expertise: String,
    #[serde(default)]
    pub tone: String,
    #[serde(default = "default_writing_style")]
    pub writing_style: String,
    #[serde(default)]
    pub context: String,
    #[serde(default = "default_part_number")]
    pub part_number: u32,
    #[serde(default = "default_total_parts")]
    pub total_parts: u32,
    #[serde(default)]
    pub summaries: Vec<String>,
    #[serde(default = "default_prompt_id")]
    pub prompt_id: String,
    pub template: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub prompt: String,
    pub position: PartPosition,
    pub topic_category: TopicCategory,
    pub template_id: Option<String>,
}
