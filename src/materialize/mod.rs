//! Configuration materialization.
//!
//! Turns declarative [`DirectorySpec`]s and [`FileSpec`]s into on-disk
//! state. Applying the same specs twice converges to the same result.
//! Processing is fail-fast: the first failing target aborts the rest.

mod spec;
mod writer;

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::AgentError;
use crate::templates::TemplateEngine;

pub use spec::{parse_mode, ContentSource, DirectorySpec, FileSpec};

use writer::{apply_mode, write_atomic, Ownership};

/// What a materialization run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Directories that did not exist before this run.
    pub created_directories: Vec<PathBuf>,
    /// Files written by this run.
    pub written_files: Vec<PathBuf>,
    /// Subset of `written_files` whose content differs from what was there.
    pub changed_files: Vec<PathBuf>,
}

/// Applies directory and file specs using a template engine for content.
#[derive(Clone)]
pub struct Materializer {
    engine: TemplateEngine,
}

impl Materializer {
    pub fn new(engine: TemplateEngine) -> Self {
        Self { engine }
    }

    /// Create all `directories`, then write all `files`, in order.
    ///
    /// Directories must be listed before files placed inside them; a file
    /// whose parent directory does not exist is an error.
    pub fn materialize(
        &self,
        directories: &[DirectorySpec],
        files: &[FileSpec],
    ) -> Result<MaterializeReport, AgentError> {
        let mut report = MaterializeReport::default();

        for dir in directories {
            if self.ensure_directory(dir)? {
                report.created_directories.push(dir.path.clone());
            }
        }

        for file in files {
            let changed = self.write_file(file)?;
            report.written_files.push(file.path.clone());
            if changed {
                report.changed_files.push(file.path.clone());
            }
        }

        info!(
            directories = directories.len(),
            created = report.created_directories.len(),
            files = files.len(),
            changed = report.changed_files.len(),
            "Configuration materialized"
        );

        Ok(report)
    }

    /// Render the content of a file spec.
    pub fn render(&self, content: &ContentSource) -> Result<String, AgentError> {
        match content {
            ContentSource::Template { name, params } => self.engine.render(name, params),
            ContentSource::Inline { source, params } => self.engine.render_inline(source, params),
            ContentSource::Static(text) => Ok(text.clone()),
        }
    }

    /// Returns whether the directory was created.
    fn ensure_directory(&self, dir: &DirectorySpec) -> Result<bool, AgentError> {
        let path = &dir.path;
        let ownership = Ownership::resolve(dir.owner.as_deref(), dir.group.as_deref())?;

        let created = match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => false,
            Ok(_) => {
                return Err(AgentError::materialize(
                    path,
                    io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        "path exists but is not a directory",
                    ),
                ));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(
                    path = %path.display(),
                    create_parents = dir.create_parents,
                    "Creating directory"
                );
                if dir.create_parents {
                    fs::create_dir_all(path)
                } else {
                    fs::create_dir(path)
                }
                .map_err(|e| AgentError::materialize(path, e))?;
                true
            }
            Err(e) => return Err(AgentError::materialize(path, e)),
        };

        apply_mode(path, dir.mode).map_err(|e| AgentError::materialize(path, e))?;
        ownership
            .apply(path)
            .map_err(|e| AgentError::materialize(path, e))?;

        Ok(created)
    }

    /// Returns whether the file content changed.
    fn write_file(&self, file: &FileSpec) -> Result<bool, AgentError> {
        let path = &file.path;
        let ownership = Ownership::resolve(file.owner.as_deref(), file.group.as_deref())?;
        let content = self.render(&file.content)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(AgentError::materialize(
                    path,
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("parent directory {} does not exist", parent.display()),
                    ),
                ));
            }
        }

        let changed = match fs::read(path) {
            Ok(existing) => existing != content.as_bytes(),
            Err(_) => true,
        };

        debug!(
            path = %path.display(),
            bytes = content.len(),
            changed,
            "Writing file"
        );

        write_atomic(path, content.as_bytes(), file.mode, ownership)
            .map_err(|e| AgentError::materialize(path, e))?;

        Ok(changed)
    }
}
