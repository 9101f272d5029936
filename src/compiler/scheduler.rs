//! Incremental scheduling: which pages must be rebuilt after a change.

use std::collections::VecDeque;

use super::dependency::{DependencyGraph, KeySet};
use crate::core::{FileTree, split_key};
use crate::layout::is_page_file;
use crate::page::Page;

/// How a changed file is handled by an incremental build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Participates in the page graph (markup, or anything in the content tree)
    Graph(String),
    /// Plain file outside the content tree; copied, never compiled
    Asset(String),
    /// Output, sandbox or hidden files
    Ignored,
}

/// Root-relative directories that decide how a change is classified.
#[derive(Debug, Clone, Copy)]
pub struct ChangeScope<'a> {
    pub content_dir: &'a str,
    /// Directories whose changes never trigger work (output, sandbox)
    pub ignored: &'a [String],
}

/// Classify a changed root-relative key.
pub fn classify_change(key: &str, scope: &ChangeScope<'_>) -> Change {
    let key = key.trim_matches('/');
    if key.is_empty()
        || split_key(key).any(|segment| segment.starts_with('.'))
        || scope.ignored.iter().any(|dir| is_within(key, dir))
    {
        return Change::Ignored;
    }

    let is_markup = key.rsplit('/').next().is_some_and(crate::layout::is_markup);
    if is_markup || is_within(key, scope.content_dir) {
        Change::Graph(key.to_string())
    } else {
        Change::Asset(key.to_string())
    }
}

/// Pages to rebuild after `changed` was modified.
///
/// Walks the reverse edges of `graph` transitively (cycle safe). The changed
/// file itself is included when it is a page. Only pages that exist in
/// `tree` are returned, sorted by path.
pub fn affected_pages(
    changed: &str,
    graph: &DependencyGraph,
    tree: &FileTree,
    content_dir: &str,
    index: &str,
) -> Vec<Page> {
    let keys = dependents(changed, graph);
    pages_for(keys.iter().map(String::as_str), tree, content_dir, index)
}

/// `changed` plus every file that transitively depends on it.
pub fn dependents(changed: &str, graph: &DependencyGraph) -> KeySet {
    let mut visited = KeySet::default();
    let mut queue = VecDeque::from([changed.to_string()]);
    visited.insert(changed.to_string());

    while let Some(key) = queue.pop_front() {
        let Some(users) = graph.used_by(&key) else {
            continue;
        };
        for user in users {
            if visited.insert(user.clone()) {
                queue.push_back(user.clone());
            }
        }
    }

    visited
}

/// Turn root-relative keys into the pages they name, dropping non-pages.
pub fn pages_for<'a>(
    keys: impl IntoIterator<Item = &'a str>,
    tree: &FileTree,
    content_dir: &str,
    index: &str,
) -> Vec<Page> {
    let prefix: Vec<&str> = split_key(content_dir).collect();

    let mut pages: Vec<Page> = keys
        .into_iter()
        .filter_map(|key| {
            let segments: Vec<&str> = split_key(key).collect();
            let path = segments.strip_prefix(prefix.as_slice())?;
            let name = path.last()?;
            let content = tree.content(&segments)?;
            is_page_file(name, content, index).then(|| Page::new(path, content.clone()))
        })
        .collect();

    pages.sort_by(|a, b| a.path.cmp(&b.path));
    pages.dedup_by(|a, b| a.path == b.path);
    pages
}

#[inline]
fn is_within(key: &str, dir: &str) -> bool {
    let dir = dir.trim_matches('/');
    dir.is_empty()
        || key == dir
        || key.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Content;

    fn leaf(s: &str) -> FileTree {
        FileTree::Leaf(Content::Text(s.to_string()))
    }

    fn dir<const N: usize>(entries: [(&str, FileTree); N]) -> FileTree {
        FileTree::Dir(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn project() -> FileTree {
        dir([
            ("lib.typ", leaf("")),
            (
                "content",
                dir([
                    ("index.typ", leaf("#let layout(body) = body")),
                    ("a.typ", leaf("")),
                    ("b.typ", leaf("")),
                    ("c.typ", leaf("")),
                ]),
            ),
        ])
    }

    fn keys(pages: &[Page]) -> Vec<String> {
        pages.iter().map(|p| p.key("content")).collect()
    }

    #[test]
    fn test_transitive_dependents() {
        let mut graph = DependencyGraph::new();
        graph.record("content/index.typ", ["lib.typ"]);
        graph.record("content/a.typ", ["content/index.typ"]);
        graph.record("content/b.typ", ["content/a.typ"]);

        let pages = affected_pages("lib.typ", &graph, &project(), "content", "index.typ");
        // the layout itself is not a page
        assert_eq!(keys(&pages), vec!["content/a.typ", "content/b.typ"]);
    }

    #[test]
    fn test_changed_page_is_included() {
        let graph = DependencyGraph::new();
        let pages = affected_pages("content/c.typ", &graph, &project(), "content", "index.typ");
        assert_eq!(keys(&pages), vec!["content/c.typ"]);
    }

    #[test]
    fn test_cycles_terminate() {
        let mut graph = DependencyGraph::new();
        graph.record("content/a.typ", ["content/b.typ"]);
        graph.record("content/b.typ", ["content/a.typ"]);

        let pages = affected_pages("content/a.typ", &graph, &project(), "content", "index.typ");
        assert_eq!(keys(&pages), vec!["content/a.typ", "content/b.typ"]);
    }

    #[test]
    fn test_deleted_files_are_not_pages() {
        let mut graph = DependencyGraph::new();
        graph.record("content/gone.typ", ["lib.typ"]);
        let pages = affected_pages("lib.typ", &graph, &project(), "content", "index.typ");
        assert!(pages.is_empty());
    }

    #[test]
    fn test_classify_change() {
        let ignored = vec!["public".to_string(), ".typage".to_string()];
        let scope = ChangeScope {
            content_dir: "content",
            ignored: &ignored,
        };

        assert_eq!(
            classify_change("content/a.typ", &scope),
            Change::Graph("content/a.typ".into())
        );
        assert_eq!(
            classify_change("content/data.json", &scope),
            Change::Graph("content/data.json".into())
        );
        assert_eq!(
            classify_change("templates/base.typ", &scope),
            Change::Graph("templates/base.typ".into())
        );
        assert_eq!(
            classify_change("assets/logo.png", &scope),
            Change::Asset("assets/logo.png".into())
        );
        assert_eq!(classify_change("public/index.pdf", &scope), Change::Ignored);
        assert_eq!(classify_change("publicity.png", &scope), Change::Asset("publicity.png".into()));
        assert_eq!(classify_change(".git/HEAD", &scope), Change::Ignored);
        assert_eq!(classify_change("content/.draft.typ", &scope), Change::Ignored);
    }
}
