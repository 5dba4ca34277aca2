use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored prompt template. The store file maps id → `PromptTemplate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub template: String,
    /// Absent on records written before timestamps were tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SavePromptRequest {
    #[serde(default)]
    pub prompt_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub template: String,
}

#[derive(Debug, Serialize)]
pub struct PromptTemplateResponse {
    pub id: String,
    #[serde(flatten)]
    pub template: PromptTemplate,
}
