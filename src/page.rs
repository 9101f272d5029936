//! Pages: non-layout markup files of the content tree.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;

use crate::core::{Content, FileTree, join_key, path_to_route, strip_extension};
use crate::layout::is_page_file;
use crate::scan;

/// A single buildable page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Path relative to the content directory
    pub path: Vec<String>,
    pub content: Content,
}

impl Page {
    pub fn new<S: AsRef<str>>(path: &[S], content: Content) -> Self {
        Self {
            path: path.iter().map(|s| s.as_ref().to_string()).collect(),
            content,
        }
    }

    /// Root-relative key of the source file.
    #[inline]
    pub fn key(&self, content_dir: &str) -> String {
        join_key(content_dir, &self.path)
    }

    /// Public route (`/blog/post/`).
    #[inline]
    pub fn route(&self, index: &str) -> String {
        path_to_route(&self.path, index)
    }

    /// Display title: first level-1 heading, else the file stem.
    pub fn title(&self) -> String {
        self.content
            .as_text()
            .and_then(scan::first_heading)
            .unwrap_or_else(|| {
                self.path
                    .last()
                    .map(|name| strip_extension(name).to_string())
                    .unwrap_or_default()
            })
    }
}

/// A page whose route another page already produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConflict {
    pub page: Page,
    pub route: String,
    /// Path of the page keeping the route
    pub owner: Vec<String>,
}

impl RouteConflict {
    pub fn message(&self, content_dir: &str) -> String {
        format!(
            "route {} is already built from {}",
            self.route,
            join_key(content_dir, &self.owner)
        )
    }
}

/// Pages of a content tree with their routes claimed.
#[derive(Debug, Default)]
pub struct PageSet {
    /// Buildable pages, in sorted path order
    pub pages: Vec<Page>,
    /// Pages left out because their route is taken
    pub conflicts: Vec<RouteConflict>,
}

/// Every page of a content tree, in sorted path order.
///
/// `blog.typ` and a non-layout `blog/index.typ` share the route `/blog/`;
/// the first in path order keeps it and the other becomes a conflict.
pub fn collect_pages(content_tree: &FileTree, index: &str) -> PageSet {
    let mut owners: FxHashMap<String, Vec<String>> = FxHashMap::default();
    let mut set = PageSet::default();

    for (path, content) in content_tree.files() {
        if !path.last().is_some_and(|name| is_page_file(name, content, index)) {
            continue;
        }
        let page = Page::new(&path, content.clone());
        match owners.entry(page.route(index)) {
            Entry::Occupied(owner) => set.conflicts.push(RouteConflict {
                route: owner.key().clone(),
                owner: owner.get().clone(),
                page,
            }),
            Entry::Vacant(slot) => {
                slot.insert(page.path.clone());
                set.pages.push(page);
            }
        }
    }

    set
}
