// Prompt templates: persistent store and its HTTP handlers.
// The composer reads templates; only explicit saves through the API write them.

pub mod handlers;
pub mod store;
