//! Filesystem primitives: atomic file replacement, ownership and mode.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{chown, PermissionsExt};
use std::path::{Path, PathBuf};

use nix::unistd::{Group, User};
use uuid::Uuid;

use crate::error::{AgentError, ValidationErrorKind};

/// Numeric ids resolved from owner/group names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Ownership {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl Ownership {
    /// Look up user and group names in the system database.
    pub fn resolve(owner: Option<&str>, group: Option<&str>) -> Result<Self, AgentError> {
        let uid = owner.map(lookup_uid).transpose()?;
        let gid = group.map(lookup_gid).transpose()?;
        Ok(Self { uid, gid })
    }

    pub fn is_empty(&self) -> bool {
        self.uid.is_none() && self.gid.is_none()
    }

    pub fn apply(&self, path: &Path) -> io::Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        chown(path, self.uid, self.gid)
    }
}

fn lookup_uid(name: &str) -> Result<u32, AgentError> {
    match User::from_name(name) {
        Ok(Some(user)) => Ok(user.uid.as_raw()),
        Ok(None) => Err(AgentError::Validation {
            kind: ValidationErrorKind::UnknownUser {
                user: name.to_string(),
            },
        }),
        Err(e) => Err(AgentError::Io(io::Error::from(e))),
    }
}

fn lookup_gid(name: &str) -> Result<u32, AgentError> {
    match Group::from_name(name) {
        Ok(Some(group)) => Ok(group.gid.as_raw()),
        Ok(None) => Err(AgentError::Validation {
            kind: ValidationErrorKind::UnknownGroup {
                group: name.to_string(),
            },
        }),
        Err(e) => Err(AgentError::Io(io::Error::from(e))),
    }
}

/// Set permission bits on `path`.
pub(crate) fn apply_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode)),
        None => Ok(()),
    }
}

/// Replace `path` with `content` atomically.
///
/// The content goes to a uniquely named sibling, is synced, gets its mode
/// and ownership, and is then renamed over the target. Readers see either
/// the old file or the new one. When no mode is given, the mode of an
/// existing target is carried over.
pub(crate) fn write_atomic(
    path: &Path,
    content: &[u8],
    mode: Option<u32>,
    ownership: Ownership,
) -> io::Result<()> {
    let temp_path = temp_sibling(path);

    let result = write_temp(&temp_path, path, content, mode, ownership)
        .and_then(|()| fs::rename(&temp_path, path));

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_temp(
    temp_path: &Path,
    target: &Path,
    content: &[u8],
    mode: Option<u32>,
    ownership: Ownership,
) -> io::Result<()> {
    // create_new: O_EXCL so a pre-planted temp path is never followed
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)?;
    file.write_all(content)?;
    file.sync_all()?;

    let mode = match mode {
        Some(mode) => Some(mode),
        None => match fs::metadata(target) {
            Ok(existing) => Some(existing.permissions().mode() & 0o7777),
            Err(_) => None,
        },
    };
    apply_mode(temp_path, mode)?;
    ownership.apply(temp_path)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        Uuid::new_v4().simple()
    );
    path.with_file_name(temp_name)
}
