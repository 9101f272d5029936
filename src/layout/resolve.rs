//! Ancestor layout lookup.

use serde::{Deserialize, Serialize};

use super::{LayoutPolicy, is_layout_file};
use crate::core::FileTree;
use crate::debug;

/// How layouts are inherited from ancestor directories.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum InheritanceMode {
    /// Only the page's own directory
    None,
    /// Nearest ancestor layout
    #[default]
    Fallback,
    /// All ancestor layouts, styles merged
    Merge,
}

/// A layout found in some ancestor directory of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutCandidate {
    /// Layout file path, relative to the content tree
    pub path: Vec<String>,
    /// Layout source text
    pub source: String,
    /// Levels between the page directory and the layout (0 = same directory)
    pub depth: usize,
}

/// Outcome of layout resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// No layout applies (`none`/`fallback`)
    None,
    /// Exactly one layout (`none`/`fallback`)
    Single(LayoutCandidate),
    /// Every ancestor layout, nearest first; may be empty (`merge`)
    Merged(Vec<LayoutCandidate>),
}

impl Resolved {
    /// All candidates, nearest first.
    pub fn candidates(&self) -> &[LayoutCandidate] {
        match self {
            Self::None => &[],
            Self::Single(layout) => std::slice::from_ref(layout),
            Self::Merged(layouts) => layouts,
        }
    }
}

/// Find the layout(s) applying to `page`.
///
/// `page` is the page path relative to the content tree `tree`. Missing
/// directories are treated as having no layout. Pure over `tree`.
pub fn resolve_layouts<S: AsRef<str>>(
    page: &[S],
    tree: &FileTree,
    policy: &LayoutPolicy<'_>,
) -> Resolved {
    let page_dir: Vec<&str> = match page.split_last() {
        Some((_, dir)) => dir.iter().map(AsRef::as_ref).collect(),
        None => return empty(policy),
    };

    match policy.mode {
        InheritanceMode::None => {
            layout_at(tree, &page_dir, 0, policy.index).map_or(Resolved::None, Resolved::Single)
        }
        InheritanceMode::Fallback => ancestors(&page_dir)
            .find_map(|(depth, dir)| layout_at(tree, dir, depth, policy.index))
            .map_or(Resolved::None, Resolved::Single),
        InheritanceMode::Merge => {
            let found = ancestors(&page_dir)
                .take_while(|(depth, _)| *depth <= policy.max_depth)
                .filter_map(|(depth, dir)| layout_at(tree, dir, depth, policy.index))
                .collect();

            let skipped = policy.max_depth + 1;
            if skipped <= page_dir.len()
                && layout_at(tree, &page_dir[..page_dir.len() - skipped], skipped, policy.index)
                    .is_some()
            {
                debug!("layout"; "merge depth {} reached, ignoring layouts above {}",
                    policy.max_depth, page.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("/"));
            }

            Resolved::Merged(found)
        }
    }
}

fn empty(policy: &LayoutPolicy<'_>) -> Resolved {
    match policy.mode {
        InheritanceMode::Merge => Resolved::Merged(Vec::new()),
        _ => Resolved::None,
    }
}

/// `(depth, directory)` pairs from `dir` up to the tree root.
fn ancestors<'a, 'b>(dir: &'b [&'a str]) -> impl Iterator<Item = (usize, &'b [&'a str])> {
    (0..=dir.len()).map(move |depth| (depth, &dir[..dir.len() - depth]))
}

fn layout_at(tree: &FileTree, dir: &[&str], depth: usize, index: &str) -> Option<LayoutCandidate> {
    let children = tree.get(dir)?.children()?;
    let FileTree::Leaf(content) = children.get(index)? else {
        return None;
    };
    if !is_layout_file(index, content, index) {
        return None;
    }

    let mut path: Vec<String> = dir.iter().map(|s| (*s).to_string()).collect();
    path.push(index.to_string());
    Some(LayoutCandidate {
        path,
        source: content.as_text()?.to_string(),
        depth,
    })
}

// ============================================================================
// Tests
// ============================================================================
