//! Paragraph-aware chunking of oversized model output.
//!
//! Lengths are counted in chars, never bytes, and text is only ever cut on
//! `"\n\n"` boundaries. A paragraph longer than the threshold becomes its own
//! chunk and is counted in `oversized`; it is never truncated.

use serde::Serialize;

pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPolicy {
    pub max_chars: usize,
    /// Keep at most this many chunks. `None` keeps everything.
    pub max_chunks: Option<usize>,
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self {
            max_chars: 30_000,
            max_chunks: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitOutcome {
    pub chunks: Vec<String>,
    /// Chunks longer than the threshold (single oversized paragraphs).
    pub oversized: usize,
    /// Chunks discarded by `max_chunks`. Non-zero means the text was truncated.
    pub dropped: usize,
}

impl SplitOutcome {
    pub fn truncated(&self) -> bool {
        self.dropped > 0
    }

    /// Chunks rejoined with the paragraph separator.
    pub fn joined(&self) -> String {
        self.chunks.join(PARAGRAPH_SEPARATOR)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Splits `text` into chunks of at most `policy.max_chars` chars.
pub fn split_long_content(text: &str, policy: &SplitPolicy) -> SplitOutcome {
    let max = policy.max_chars.max(1);

    if char_len(text) <= max {
        return SplitOutcome {
            chunks: vec![text.to_string()],
            oversized: 0,
            dropped: 0,
        };
    }

    let separator_len = char_len(PARAGRAPH_SEPARATOR);
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    let mut has_current = false;

    for paragraph in text.split(PARAGRAPH_SEPARATOR) {
        let paragraph_len = char_len(paragraph);

        if has_current && current_len + separator_len + paragraph_len <= max {
            current.push_str(PARAGRAPH_SEPARATOR);
            current.push_str(paragraph);
            current_len += separator_len + paragraph_len;
            continue;
        }

        if has_current {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(paragraph);
        current_len = paragraph_len;
        has_current = true;
    }
    if has_current {
        chunks.push(current);
    }

    let oversized = chunks.iter().filter(|c| char_len(c) > max).count();

    let mut dropped = 0;
    if let Some(limit) = policy.max_chunks {
        let limit = limit.max(1);
        if chunks.len() > limit {
            dropped = chunks.len() - limit;
            chunks.truncate(limit);
        }
    }

    SplitOutcome {
        chunks,
        oversized,
        dropped,
    }
}
