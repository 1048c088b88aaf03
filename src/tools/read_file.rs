//! The `readFile` tool.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ToolError;

/// Arguments accepted by `readFile`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadFileInput {
    /// File path, relative to the project root unless absolute.
    pub path: String,
}

/// Reads UTF-8 text files, resolving relative paths against a project root.
#[derive(Debug, Clone, Default)]
pub struct FileReader {
    root: Option<PathBuf>,
}

impl FileReader {
    /// Creates a reader. With no root, relative paths resolve against the
    /// process working directory.
    #[must_use]
    pub const fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// Resolves `path` to the location that will actually be read.
    #[must_use]
    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        match &self.root {
            Some(root) if candidate.is_relative() => root.join(candidate),
            _ => candidate.to_path_buf(),
        }
    }

    /// Reads the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::FileNotFound`] if nothing exists at the path,
    /// [`ToolError::NotARegularFile`] for directories and special files, and
    /// [`ToolError::ReadFailed`] if the contents cannot be read as text.
    pub fn read(&self, path: &str) -> Result<String, ToolError> {
        let resolved = self.resolve(path);

        if !resolved.exists() {
            return Err(ToolError::FileNotFound {
                path: path.to_string(),
            });
        }
        if !resolved.is_file() {
            return Err(ToolError::NotARegularFile {
                path: path.to_string(),
            });
        }

        std::fs::read_to_string(&resolved).map_err(|source| ToolError::ReadFailed {
            path: path.to_string(),
            source,
        })
    }
}
