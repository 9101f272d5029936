//! Per-page build sandboxes.
//!
//! Each page is compiled in its own fresh directory below the project's
//! sandbox root (`<root>/.typage/`). Sandboxes live inside the project so
//! root-relative and rewritten relative references stay resolvable. The
//! directory is removed when the [`Sandbox`] is dropped, on success or error.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::core::ARTIFACT_EXT;

/// Directory (relative to the project root) holding all sandboxes.
pub const SANDBOX_DIR: &str = ".typage";

/// Name of the composed document inside a sandbox.
pub const DOCUMENT_NAME: &str = "main.typ";

/// A fresh, exclusively owned build directory for one page.
#[derive(Debug)]
pub struct Sandbox {
    dir: TempDir,
    key: String,
}

impl Sandbox {
    /// Create a new empty sandbox below `root`.
    pub fn create(root: &Path) -> Result<Self> {
        let base = root.join(SANDBOX_DIR);
        fs::create_dir_all(&base)
            .with_context(|| format!("Failed to create sandbox root {}", base.display()))?;

        let dir = tempfile::Builder::new()
            .prefix("page-")
            .tempdir_in(&base)
            .with_context(|| format!("Failed to create sandbox in {}", base.display()))?;

        let name = dir
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .context("Sandbox directory name is not UTF-8")?
            .to_string();

        Ok(Self {
            dir,
            key: format!("{SANDBOX_DIR}/{name}"),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Root-relative key of the composed document.
    pub fn document_key(&self) -> String {
        format!("{}/{DOCUMENT_NAME}", self.key)
    }

    /// Absolute path of the composed document.
    pub fn document_path(&self) -> PathBuf {
        self.path().join(DOCUMENT_NAME)
    }

    /// Absolute path where the compiler must place its artifact.
    pub fn artifact_path(&self) -> PathBuf {
        self.document_path().with_extension(ARTIFACT_EXT)
    }

    /// Write the composed document.
    pub fn write_document(&self, document: &str) -> Result<PathBuf> {
        let path = self.document_path();
        fs::write(&path, document)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Read the compiled artifact, if the compiler produced one.
    pub fn read_artifact(&self) -> Option<Vec<u8>> {
        fs::read(self.artifact_path()).ok()
    }
}
