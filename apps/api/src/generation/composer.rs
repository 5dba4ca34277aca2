//! Prompt Composer — builds the prompt for one story part.
//!
//! Pure and deterministic: identical inputs always produce identical text.
//! Output = template body (built-in or custom) + position guidance +
//! continuity reminder.

use serde::Serialize;
use thiserror::Error;

use crate::generation::prompts::{
    CLOSING_GUIDANCE, CONTINUITY_REMINDER, DEFAULT_STORY_TEMPLATE, EARLY_MIDDLE_GUIDANCE,
    LATE_MIDDLE_GUIDANCE, MIDDLE_GUIDANCE, OPENING_GUIDANCE,
};
use crate::generation::voice::{
    expertise_instruction, tone_instruction, topic_category, writing_style_or_default,
};

/// Every placeholder a template may reference.
pub const PLACEHOLDERS: &[&str] = &[
    "part_number",
    "total_parts",
    "topic",
    "topic_category",
    "context_text",
    "previous_context",
    "expertise",
    "expertise_instructions",
    "tone",
    "tone_instructions",
    "writing_style",
    "category_instructions",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("Template references unknown placeholder '{{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("Template has an unbalanced brace at byte {0}")]
    UnbalancedBrace(usize),

    #[error("Invalid part position {part} of {total}")]
    InvalidPosition { part: u32, total: u32 },
}

/// Everything the composer needs for one part.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub topic: &'a str,
    pub expertise: &'a str,
    pub tone: &'a str,
    pub writing_style: &'a str,
    pub context: &'a str,
    /// 1-based.
    pub part_number: u32,
    pub total_parts: u32,
    pub summaries: &'a [String],
}

/// Where a part sits in the run; selects the guidance block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartPosition {
    /// `total == 1`: gets both opening and closing guidance, no band computation.
    Single,
    Opening,
    EarlyMiddle,
    Middle,
    LateMiddle,
    Closing,
}

impl PartPosition {
    pub fn of(part: u32, total: u32) -> Result<Self, ComposeError> {
        if total == 0 || part == 0 || part > total {
            return Err(ComposeError::InvalidPosition { part, total });
        }
        Ok(match (part, total) {
            (_, 1) => PartPosition::Single,
            (1, _) => PartPosition::Opening,
            (p, t) if p == t => PartPosition::Closing,
            (p, t) => {
                let progress = f64::from(p - 1) / f64::from(t - 1);
                if progress < 0.33 {
                    PartPosition::EarlyMiddle
                } else if progress < 0.66 {
                    PartPosition::Middle
                } else {
                    PartPosition::LateMiddle
                }
            }
        })
    }

    fn guidance(&self) -> String {
        match self {
            PartPosition::Single => format!("{OPENING_GUIDANCE}\n{CLOSING_GUIDANCE}"),
            PartPosition::Opening => OPENING_GUIDANCE.to_string(),
            PartPosition::EarlyMiddle => EARLY_MIDDLE_GUIDANCE.to_string(),
            PartPosition::Middle => MIDDLE_GUIDANCE.to_string(),
            PartPosition::LateMiddle => LATE_MIDDLE_GUIDANCE.to_string(),
            PartPosition::Closing => CLOSING_GUIDANCE.to_string(),
        }
    }
}

/// Builds the prompt for one part. `custom_template` replaces the built-in
/// structure; guidance and the continuity reminder are appended either way.
pub fn compose_prompt(
    inputs: &PromptInputs<'_>,
    custom_template: Option<&str>,
) -> Result<String, ComposeError> {
    let position = PartPosition::of(inputs.part_number, inputs.total_parts)?;
    let values = placeholder_values(inputs);
    let template = custom_template.unwrap_or(DEFAULT_STORY_TEMPLATE);

    let mut prompt = render_template(template, |name| {
        values
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    })?;

    prompt.push('\n');
    prompt.push_str(&position.guidance());
    prompt.push('\n');
    prompt.push_str(CONTINUITY_REMINDER);
    Ok(prompt)
}

/// Checks that a template only references known placeholders and has balanced braces.
pub fn validate_template(template: &str) -> Result<(), ComposeError> {
    render_template(template, |name| PLACEHOLDERS.contains(&name).then_some("")).map(|_| ())
}

fn placeholder_values(inputs: &PromptInputs<'_>) -> Vec<(&'static str, String)> {
    let context_text = if inputs.context.trim().is_empty() {
        String::new()
    } else {
        format!("\nAdditional Context:\n{}", inputs.context)
    };

    let previous_context = if inputs.part_number > 1 && !inputs.summaries.is_empty() {
        format!("\nPrevious parts summary:\n{}", inputs.summaries.join("\n"))
    } else {
        String::new()
    };

    let style = writing_style_or_default(inputs.writing_style);

    vec![
        ("part_number", inputs.part_number.to_string()),
        ("total_parts", inputs.total_parts.to_string()),
        ("topic", inputs.topic.to_string()),
        ("topic_category", topic_category(inputs.topic).to_string()),
        ("context_text", context_text),
        ("previous_context", previous_context),
        ("expertise", inputs.expertise.to_string()),
        (
            "expertise_instructions",
            expertise_instruction(inputs.expertise).to_string(),
        ),
        ("tone", inputs.tone.to_string()),
        ("tone_instructions", tone_instruction(inputs.tone).to_string()),
        ("writing_style", style.to_string()),
        ("category_instructions", style.instruction().to_string()),
    ]
}

/// Substitutes `{name}` placeholders. `{{` and `}}` are literal braces.
fn render_template<'v>(
    template: &str,
    lookup: impl Fn(&str) -> Option<&'v str>,
) -> Result<String, ComposeError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        match c {
            '{' => {
                if chars.next_if(|&(_, next)| next == '{').is_some() {
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    if inner == '{' {
                        return Err(ComposeError::UnbalancedBrace(idx));
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(ComposeError::UnbalancedBrace(idx));
                }
                let value =
                    lookup(&name).ok_or_else(|| ComposeError::UnknownPlaceholder(name.clone()))?;
                out.push_str(value);
            }
            '}' => {
                if chars.next_if(|&(_, next)| next == '}').is_some() {
                    out.push('}');
                } else {
                    return Err(ComposeError::UnbalancedBrace(idx));
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}
