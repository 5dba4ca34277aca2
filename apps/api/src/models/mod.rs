pub mod story;
pub mod template;
