//! Prompt template store backed by a JSON file.
//!
//! Reads are concurrent; writes are serialized behind the write lock and
//! persisted by writing a temp file in the same directory and renaming it over
//! the old one, so a crash never leaves a half-written store.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::generation::composer::{validate_template, ComposeError};
use crate::generation::prompts::DEFAULT_STORY_TEMPLATE;
use crate::models::template::PromptTemplate;

/// Always present; cannot be deleted.
pub const DEFAULT_TEMPLATE_ID: &str = "default";

/// Ids shadowed by fixed routes under `/api/v1/prompts/`.
pub const RESERVED_TEMPLATE_IDS: &[&str] = &["preview"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Template id '{0}' is reserved")]
    ReservedId(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(#[from] ComposeError),

    #[error("Failed to write template store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode template store: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Templates = BTreeMap<String, PromptTemplate>;

fn builtin_default() -> PromptTemplate {
    PromptTemplate {
        name: "Default Template".to_string(),
        template: DEFAULT_STORY_TEMPLATE.to_string(),
        updated_at: None,
    }
}

fn default_templates() -> Templates {
    BTreeMap::from([(DEFAULT_TEMPLATE_ID.to_string(), builtin_default())])
}

pub struct TemplateStore {
    path: PathBuf,
    templates: RwLock<Templates>,
}

impl TemplateStore {
    /// Loads the store from `path`.
    ///
    /// A missing file is created with just the default template. A file that
    /// does not parse is logged and replaced in memory by the defaults; it is
    /// left on disk untouched until the next successful save.
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();

        let templates = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<Templates>(&raw) {
                Ok(mut templates) => {
                    templates
                        .entry(DEFAULT_TEMPLATE_ID.to_string())
                        .or_insert_with(builtin_default);
                    templates
                }
                Err(e) => {
                    warn!(
                        "Template store {} is not valid JSON ({e}); using defaults",
                        path.display()
                    );
                    default_templates()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let templates = default_templates();
                persist(&path, &templates)
                    .await
                    .with_context(|| format!("Failed to create template store {}", path.display()))?;
                templates
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read template store {}", path.display()))
            }
        };

        info!(
            "Template store loaded from {} ({} templates)",
            path.display(),
            templates.len()
        );

        Ok(Self {
            path,
            templates: RwLock::new(templates),
        })
    }

    pub async fn get(&self, id: &str) -> Option<PromptTemplate> {
        self.templates.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Templates {
        self.templates.read().await.clone()
    }

    /// Creates or replaces a template. The body is validated before anything
    /// is written; the in-memory map only changes once the file is persisted.
    pub async fn save(
        &self,
        id: &str,
        name: &str,
        template: &str,
    ) -> Result<PromptTemplate, StoreError> {
        let id = id.trim();
        let name = name.trim();
        if id.is_empty() {
            return Err(StoreError::MissingField("prompt_id"));
        }
        if RESERVED_TEMPLATE_IDS.contains(&id) {
            return Err(StoreError::ReservedId(id.to_string()));
        }
        if name.is_empty() {
            return Err(StoreError::MissingField("name"));
        }
        if template.trim().is_empty() {
            return Err(StoreError::MissingField("template"));
        }
        validate_template(template)?;

        let record = PromptTemplate {
            name: name.to_string(),
            template: template.to_string(),
            updated_at: Some(Utc::now()),
        };

        let mut guard = self.templates.write().await;
        let mut next = guard.clone();
        next.insert(id.to_string(), record.clone());
        persist(&self.path, &next).await?;
        *guard = next;

        info!("Saved prompt template '{id}'");
        Ok(record)
    }

    /// Removes a template. Returns `false` for the default template and for
    /// unknown ids.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        if id == DEFAULT_TEMPLATE_ID {
            return Ok(false);
        }

        let mut guard = self.templates.write().await;
        if !guard.contains_key(id) {
            return Ok(false);
        }
        let mut next = guard.clone();
        next.remove(id);
        persist(&self.path, &next).await?;
        *guard = next;

        info!("Deleted prompt template '{id}'");
        Ok(true)
    }
}

async fn persist(path: &Path, templates: &Templates) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(templates)?;
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
