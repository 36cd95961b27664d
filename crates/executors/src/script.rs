use std::{
    ffi::OsStr,
    path::{Component, Path, PathBuf},
};

use crate::runner::RunError;

pub const SCRIPT_EXTENSION: &str = "js";

/// A k6 script that exists on disk and carries the `.js` extension.
#[derive(Debug, Clone)]
pub struct ScriptPath {
    raw: String,
    path: PathBuf,
}

impl ScriptPath {
    /// Resolve `raw` against `cwd` and validate it. Existence is checked before
    /// the extension, so a missing `.txt` file reports as not found.
    ///
    /// `..` is collapsed lexically and symlinks are followed, so the extension
    /// that counts is the one on the file k6 will actually read.
    pub fn resolve(raw: &str, cwd: &Path) -> Result<Self, RunError> {
        let absolute = normalize(&std::path::absolute(cwd.join(raw))?);

        if !absolute.exists() {
            return Err(RunError::NotFound(raw.to_string()));
        }
        let path = std::fs::canonicalize(&absolute)?;
        if path.extension() != Some(OsStr::new(SCRIPT_EXTENSION)) {
            return Err(RunError::InvalidType(raw.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            path,
        })
    }

    /// The path exactly as the caller supplied it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The resolved target handed to k6.
    pub fn as_path(&self) -> &Path {
        &self.path
    }
}

/// Drop `.` and fold `..` into its parent without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    out.components().next_back(),
                    Some(Component::RootDir | Component::Prefix(_)) | None
                ) {
                    out.pop();
                }
            }
            other => out.push(other),
        }
    }
    out
}
