// Story Generation Engine
// Implements: prompt composition, voice calibration, reference integration,
// the multi-part continuity loop and long-content splitting.
// All model calls go through llm_client; nothing here talks to Gemini directly.

pub mod composer;
pub mod generator;
pub mod handlers;
pub mod prompts;
pub mod references;
pub mod splitter;
pub mod voice;
