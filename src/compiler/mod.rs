//! Page compilation.
//!
//! - [`scheduler`] - which pages a change affects
//! - [`dependency`] - the file dependency graph
//! - [`page`] - building one page end to end
//! - [`compose`] / [`rewrite`] - document assembly
//! - [`sandbox`] - per-page build directories
//! - [`typst`] - the external compiler seam

pub mod compose;
pub mod dependency;
pub mod page;
pub mod rewrite;
pub mod sandbox;
pub mod scheduler;
pub mod typst;

use std::path::PathBuf;

use crate::config::SiteConfig;
use crate::core::FileTree;
use crate::layout::{InheritanceMode, LayoutPolicy};

pub use dependency::{DependencyGraph, build_graph};
pub use page::{PageError, build_page};
pub use scheduler::{Change, ChangeScope, affected_pages, classify_change};
pub use typst::{PageCompiler, TypstCompiler};

/// Everything a page build needs, shared by all pages of one build.
#[derive(Debug, Clone)]
pub struct CompileContext {
    /// Project root
    pub root: PathBuf,
    /// Output directory
    pub output: PathBuf,
    /// Root-relative key of the content directory
    pub content_dir: String,
    pub index: String,
    pub mode: InheritanceMode,
    pub max_depth: usize,
    /// Content subtree, for layout resolution
    pub content_tree: FileTree,
}

impl CompileContext {
    /// Snapshot configuration and the content subtree of `tree`.
    pub fn new(config: &SiteConfig, tree: &FileTree) -> Self {
        let content_dir = config.content_key();
        let content_tree = tree.get_key(&content_dir).cloned().unwrap_or_default();

        Self {
            root: config.root.clone(),
            output: config.build.output.clone(),
            content_dir,
            index: config.build.index.clone(),
            mode: config.build.layout.mode,
            max_depth: config.build.layout.max_depth,
            content_tree,
        }
    }

    #[inline]
    pub fn policy(&self) -> LayoutPolicy<'_> {
        LayoutPolicy {
            mode: self.mode,
            max_depth: self.max_depth,
            index: &self.index,
        }
    }
}
