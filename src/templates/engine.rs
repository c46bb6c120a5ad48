//! Tera template engine wrapper.
//!
//! Provides template loading and rendering for named template files and
//! inline templates supplied through configuration.

use std::path::Path;
use std::sync::Arc;

use tera::{Context, Tera};
use tracing::{debug, info};

use crate::error::AgentError;

/// Template engine for rendering configuration files.
///
/// Wraps Tera and provides a simplified interface for template operations.
#[derive(Clone)]
pub struct TemplateEngine {
    tera: Arc<Tera>,
}

impl TemplateEngine {
    /// Create a new template engine, loading templates from the specified directory.
    ///
    /// Templates are loaded recursively from the directory with `.tera` extension.
    pub fn new(template_dir: &Path) -> Result<Self, AgentError> {
        let pattern = template_dir.join("**/*.tera");
        let pattern_str = pattern.to_string_lossy();

        debug!(pattern = %pattern_str, "Loading templates");

        let tera = Tera::new(&pattern_str).map_err(|e| AgentError::Template {
            message: format!(
                "Failed to load templates from '{}': {}",
                template_dir.display(),
                e
            ),
        })?;

        let template_count = tera.get_template_names().count();
        info!(
            directory = %template_dir.display(),
            count = template_count,
            "Template engine initialized"
        );

        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    /// Create a template engine with no named templates.
    ///
    /// Inline rendering still works.
    pub fn empty() -> Self {
        Self {
            tera: Arc::new(Tera::default()),
        }
    }

    /// Build an engine from in-memory `(name, source)` pairs.
    pub fn from_sources(sources: &[(&str, &str)]) -> Result<Self, AgentError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(sources.iter().copied())
            .map_err(|e| AgentError::Template {
                message: format!("Failed to add templates: {}", e),
            })?;
        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    /// Render a named template with the given context.
    ///
    /// # Arguments
    ///
    /// * `template_name` - Name of the template (e.g., "elasticsearch/elasticsearch.yml.tera")
    /// * `context` - JSON value containing template variables
    pub fn render(
        &self,
        template_name: &str,
        context: &serde_json::Value,
    ) -> Result<String, AgentError> {
        let tera_context = to_context(context)?;

        self.tera
            .render(template_name, &tera_context)
            .map_err(|e| AgentError::Template {
                message: format!("Failed to render template '{}': {}", template_name, e),
            })
    }

    /// Render a template given as a string rather than by name.
    ///
    /// Autoescaping is off: these are config files, not HTML.
    pub fn render_inline(
        &self,
        source: &str,
        context: &serde_json::Value,
    ) -> Result<String, AgentError> {
        let tera_context = to_context(context)?;

        Tera::one_off(source, &tera_context, false).map_err(|e| AgentError::Template {
            message: format!("Failed to render inline template: {}", e),
        })
    }

    /// Check if a template exists.
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// List all available template names.
    pub fn list_templates(&self) -> Vec<&str> {
        self.tera.get_template_names().collect()
    }

    /// Get the number of loaded templates.
    pub fn template_count(&self) -> usize {
        self.tera.get_template_names().count()
    }
}

fn to_context(context: &serde_json::Value) -> Result<Context, AgentError> {
    Context::from_serialize(context).map_err(|e| AgentError::Template {
        message: format!("Invalid template context: {}", e),
    })
}
