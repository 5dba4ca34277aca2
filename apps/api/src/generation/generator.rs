//! Story Generation — the continuity controller.
//!
//! Flow: validate template → extract references → integrate references →
//!       for each part: compose → generate → split → summarize → delay.
//!
//! Parts run strictly in order because each prompt carries the summaries of
//! every earlier part. A failed primary call fails the whole run; no partial
//! story is ever returned. Summary and reference failures only degrade
//! continuity and are logged.

use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::generation::composer::{compose_prompt, validate_template, ComposeError, PromptInputs};
use crate::generation::prompts::SUMMARY_PROMPT_TEMPLATE;
use crate::generation::references::{extract_references, integrate_references, merge_context, ReferenceExtractor};
use crate::generation::splitter::{split_long_content, SplitPolicy, PARAGRAPH_SEPARATOR};
use crate::llm_client::{GenerationClient, GenerationError, GenerationErrorKind};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Validated input for one run. Tags are kept as strings; the composer
/// handles unknown ones.
#[derive(Debug, Clone, Default)]
pub struct StoryPlan {
    pub topic: String,
    pub expertise: String,
    pub tone: String,
    pub writing_style: String,
    pub context: String,
    pub reference_urls: Vec<String>,
    /// Requested part count; clamped to `1..=RunSettings::max_parts`.
    pub total_parts: u32,
    /// Body of a custom prompt template. `None` uses the built-in structure.
    pub template: Option<String>,
}

/// Per-process generation policy, built from `Config`.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub max_parts: u32,
    pub part_delay: Duration,
    pub split: SplitPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_parts: 2,
            part_delay: Duration::from_secs(2),
            split: SplitPolicy::default(),
        }
    }
}

impl RunSettings {
    pub fn clamp_parts(&self, requested: u32) -> u32 {
        requested.clamp(1, self.max_parts.max(1))
    }
}

/// A completed run.
#[derive(Debug, Clone, Serialize)]
pub struct StoryOutput {
    /// Parts joined by a blank line.
    pub story: String,
    pub parts: Vec<String>,
    /// Summaries generated and carried forward.
    pub summaries: usize,
    /// True if the splitter's chunk cap dropped text from any part.
    pub truncated: bool,
}

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("Invalid prompt template: {0}")]
    Template(#[from] ComposeError),

    #[error("Error generating story part {part}: {source}")]
    Generation {
        part: u32,
        #[source]
        source: GenerationError,
    },

    #[error("Generation cancelled")]
    Cancelled,
}

// ────────────────────────────────────────────────────────────────────────────
// Run
// ────────────────────────────────────────────────────────────────────────────

/// Runs one multi-part generation.
pub async fn generate_story(
    client: &GenerationClient,
    extractor: &dyn ReferenceExtractor,
    plan: &StoryPlan,
    settings: &RunSettings,
) -> Result<StoryOutput, StoryError> {
    let run_id = Uuid::new_v4();
    let started = Instant::now();
    let cancel = client.cancellation().clone();
    let total_parts = settings.clamp_parts(plan.total_parts);
    let template = plan.template.as_deref();

    if let Some(body) = template {
        validate_template(body)?;
    }

    info!(
        "Run {run_id}: topic={:?} expertise={} tone={} style={} parts={} (requested {})",
        plan.topic, plan.expertise, plan.tone, plan.writing_style, total_parts, plan.total_parts
    );

    let context = if plan.reference_urls.is_empty() {
        plan.context.clone()
    } else {
        let texts = extract_references(extractor, &plan.reference_urls).await;
        info!(
            "Run {run_id}: {}/{} references extracted",
            texts.len(),
            plan.reference_urls.len()
        );
        let block = integrate_references(client, &plan.topic, &texts).await;
        merge_context(&plan.context, &block)
    };

    let mut parts: Vec<String> = Vec::with_capacity(total_parts as usize);
    let mut summaries: Vec<String> = Vec::new();
    let mut truncated = false;

    for part in 1..=total_parts {
        if cancel.is_cancelled() {
            info!("Run {run_id}: cancelled before part {part}");
            return Err(StoryError::Cancelled);
        }

        let prompt = compose_prompt(
            &PromptInputs {
                topic: &plan.topic,
                expertise: &plan.expertise,
                tone: &plan.tone,
                writing_style: &plan.writing_style,
                context: &context,
                part_number: part,
                total_parts,
                summaries: &summaries,
            },
            template,
        )?;

        let raw = client.generate(&prompt).await.map_err(|source| match source.kind {
            GenerationErrorKind::Cancelled => StoryError::Cancelled,
            _ => StoryError::Generation { part, source },
        })?;

        let outcome = split_long_content(&raw, &settings.split);
        if outcome.truncated() {
            warn!(
                "Run {run_id}: part {part} truncated, {} of {} chunks dropped",
                outcome.dropped,
                outcome.dropped + outcome.chunks.len()
            );
            truncated = true;
        }
        if outcome.oversized > 0 {
            warn!(
                "Run {run_id}: part {part} has {} paragraph(s) longer than {} chars",
                outcome.oversized, settings.split.max_chars
            );
        }
        parts.push(outcome.joined());
        info!("Run {run_id}: part {part}/{total_parts} generated ({} chars)", raw.chars().count());

        if part < total_parts {
            let summary_prompt = SUMMARY_PROMPT_TEMPLATE.replace("{text}", &raw);
            match client.generate(&summary_prompt).await {
                Ok(summary) => summaries.push(summary),
                Err(e) if e.kind == GenerationErrorKind::Cancelled => {
                    return Err(StoryError::Cancelled)
                }
                Err(e) => warn!(
                    "Run {run_id}: summary for part {part} unavailable, continuing with less continuity: {e}"
                ),
            }

            if !cancel.sleep(settings.part_delay).await {
                info!("Run {run_id}: cancelled after part {part}");
                return Err(StoryError::Cancelled);
            }
        }
    }

    info!(
        "Run {run_id}: completed {} parts in {}ms",
        parts.len(),
        started.elapsed().as_millis()
    );

    Ok(StoryOutput {
        story: parts.join(PARAGRAPH_SEPARATOR),
        parts,
        summaries: summaries.len(),
        truncated,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
