//! Declarative directory and file specifications.

use std::path::PathBuf;

use crate::error::AgentError;

/// Where a file's content comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentSource {
    /// A named template known to the template engine.
    Template {
        name: String,
        params: serde_json::Value,
    },
    /// A template given as a string (typically from configuration).
    Inline {
        source: String,
        params: serde_json::Value,
    },
    /// Literal content written as-is.
    Static(String),
}

impl ContentSource {
    pub fn template(name: &str, params: serde_json::Value) -> Self {
        ContentSource::Template {
            name: name.to_string(),
            params,
        }
    }

    pub fn inline(source: &str, params: serde_json::Value) -> Self {
        ContentSource::Inline {
            source: source.to_string(),
            params,
        }
    }
}

/// A directory that must exist with the given ownership and mode.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectorySpec {
    pub path: PathBuf,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: Option<u32>,
    pub create_parents: bool,
}

impl DirectorySpec {
    /// A directory with parents created as needed and ownership untouched.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owner: None,
            group: None,
            mode: None,
            create_parents: true,
        }
    }

    pub fn owned_by(mut self, owner: &str, group: &str) -> Self {
        self.owner = Some(owner.to_string());
        self.group = Some(group.to_string());
        self
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn create_parents(mut self, create_parents: bool) -> Self {
        self.create_parents = create_parents;
        self
    }
}

/// A file whose full content is replaced on every materialization.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSpec {
    pub path: PathBuf,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: Option<u32>,
    pub content: ContentSource,
}

impl FileSpec {
    pub fn new(path: impl Into<PathBuf>, content: ContentSource) -> Self {
        Self {
            path: path.into(),
            owner: None,
            group: None,
            mode: None,
            content,
        }
    }

    pub fn owned_by(mut self, owner: &str, group: &str) -> Self {
        self.owner = Some(owner.to_string());
        self.group = Some(group.to_string());
        self
    }

    /// Set only the owning user, leaving the group untouched.
    pub fn owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Parse an octal mode string (e.g., "0644") to a u32.
pub fn parse_mode(mode_str: &str) -> Result<u32, AgentError> {
    let digits = mode_str.trim_start_matches('0');
    if digits.is_empty() {
        return if mode_str.is_empty() {
            Err(AgentError::invalid_parameter("mode", "Mode cannot be empty"))
        } else {
            Ok(0)
        };
    }
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|_| AgentError::invalid_parameter("mode", "Invalid octal mode"))?;
    if mode > 0o7777 {
        return Err(AgentError::invalid_parameter(
            "mode",
            format!("Mode {} is out of range", mode_str),
        ));
    }
    Ok(mode)
}
