//! Dependency tracking for incremental builds.
//!
//! - `DependencyGraph`: pure data structure with forward/reverse mappings
//! - `build_graph`: one pass over a [`FileTree`] recording every edge
//!
//! Edges come from two places:
//! - relative references (`#import "../lib.typ"`, `#image("./a.png")`, ...)
//! - layout inheritance (a page depends on every layout applying to it)
//!
//! All keys are `/`-separated paths relative to the project root.

use rustc_hash::{FxHashMap, FxHashSet};

use super::rewrite::resolve_reference;
use crate::core::{FileTree, join_key};
use crate::layout::{LayoutPolicy, is_markup, is_page_file, resolve_layouts};
use crate::{debug, scan};

pub type KeySet = FxHashSet<String>;
type KeySetMap = FxHashMap<String, KeySet>;

// =============================================================================
// Data Structure
// =============================================================================

/// Bidirectional dependency graph.
///
/// Maintains both forward (file → deps) and reverse (dep → files) mappings
/// for efficient lookups in either direction.
///
/// # Invariants
/// - Forward and reverse mappings are always consistent
/// - Self-references are excluded
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Forward: file → files it uses
    forward: KeySetMap,
    /// Reverse: file → files that use it
    reverse: KeySetMap,
}

impl DependencyGraph {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record dependencies for a file.
    ///
    /// Replaces any existing dependencies for this file.
    pub fn record<I>(&mut self, file: &str, deps: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.remove_file(file);

        let deps: KeySet = deps
            .into_iter()
            .map(Into::into)
            .filter(|dep| dep != file)
            .collect();

        for dep in &deps {
            self.reverse
                .entry(dep.clone())
                .or_default()
                .insert(file.to_string());
        }

        self.forward.insert(file.to_string(), deps);
    }

    /// Files that directly depend on `file`.
    #[inline]
    pub fn used_by(&self, file: &str) -> Option<&KeySet> {
        self.reverse.get(file)
    }

    /// Number of files with at least one dependent.
    #[inline]
    pub fn reverse_count(&self) -> usize {
        self.reverse.len()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(FxHashSet::len).sum()
    }

    /// Remove a file and clean up its reverse mappings.
    fn remove_file(&mut self, file: &str) {
        let Some(old_deps) = self.forward.remove(file) else {
            return;
        };

        for dep in old_deps {
            if let Some(dependents) = self.reverse.get_mut(&dep) {
                dependents.remove(file);
                if dependents.is_empty() {
                    self.reverse.remove(&dep);
                }
            }
        }
    }
}

// =============================================================================
// Construction
// =============================================================================

/// Build the dependency graph of a whole project tree.
///
/// `content_dir` is the key of the content subtree; pages inside it get
/// layout edges according to `policy`. Every markup file anywhere in the
/// tree gets reference edges. References that escape the root are skipped.
pub fn build_graph(tree: &FileTree, content_dir: &str, policy: &LayoutPolicy<'_>) -> DependencyGraph {
    let content_prefix: Vec<&str> = crate::core::split_key(content_dir).collect();
    let empty = FileTree::default();
    let content_tree = tree.get(&content_prefix).unwrap_or(&empty);

    let mut graph = DependencyGraph::new();

    for (segments, content) in tree.files() {
        let Some(name) = segments.last().copied() else {
            continue;
        };
        if !is_markup(name) {
            continue;
        }
        let key = segments.join("/");

        let mut deps: Vec<String> = match content.as_text() {
            Some(source) => scan::references(source)
                .into_iter()
                .filter(scan::Reference::is_relative)
                .filter_map(|r| {
                    let resolved = resolve_reference(&key, &r.path);
                    if resolved.is_none() {
                        debug!("dep"; "{} in {} escapes the project root", r.path, key);
                    }
                    resolved
                })
                .collect(),
            None => Vec::new(),
        };

        if let Some(page) = segments.strip_prefix(content_prefix.as_slice())
            && is_page_file(name, content, policy.index)
        {
            let resolved = resolve_layouts(page, content_tree, policy);
            deps.extend(
                resolved
                    .candidates()
                    .iter()
                    .map(|layout| join_key(content_dir, &layout.path)),
            );
        }

        graph.record(&key, deps);
    }

    debug!("dep"; "graph has {} edges over {} files", graph.edge_count(), graph.forward.len());
    graph
}

// =============================================================================
// Tests
// =============================================================================
