//! Template rendering for materialized configuration files.

mod engine;

pub use engine::TemplateEngine;
