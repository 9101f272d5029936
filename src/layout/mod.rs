//! Layout inheritance.
//!
//! A layout is an index file (default `index.typ`) that defines
//! `#let layout(body) = ...`. Pages pick up layouts from their own directory
//! and its ancestors according to an [`InheritanceMode`]:
//!
//! | Mode       | Looks at                         | Result                 |
//! |------------|----------------------------------|------------------------|
//! | `none`     | page directory only              | one layout or nothing  |
//! | `fallback` | nearest ancestor with a layout   | one layout or nothing  |
//! | `merge`    | every ancestor up to `max_depth` | list, nearest first    |
//!
//! In merge mode, `set` rules of all found layouts are merged with
//! [`merge_styles`], nearest ancestor winning per element kind.

mod resolve;
mod style;

pub use resolve::{InheritanceMode, LayoutCandidate, Resolved, resolve_layouts};
pub use style::merge_styles;

use crate::core::Content;
use crate::scan;

/// Extension of markup source files.
pub const MARKUP_EXT: &str = "typ";

/// Everything layout resolution needs from the configuration.
#[derive(Debug, Clone, Copy)]
pub struct LayoutPolicy<'a> {
    pub mode: InheritanceMode,
    /// Deepest ancestor level inspected in merge mode (inclusive)
    pub max_depth: usize,
    /// Index / layout file name
    pub index: &'a str,
}

/// Whether a file is a layout definition.
///
/// Single source of truth for resolution, graph building and page filtering.
pub fn is_layout_file(name: &str, content: &Content, index: &str) -> bool {
    name == index && content.as_text().is_some_and(scan::is_layout)
}

/// Whether a file is a page: markup that is not a layout definition.
pub fn is_page_file(name: &str, content: &Content, index: &str) -> bool {
    is_markup(name) && !is_layout_file(name, content, index)
}

/// Whether a file name carries the markup extension.
#[inline]
pub fn is_markup(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext == MARKUP_EXT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Content {
        Content::Text(s.to_string())
    }

    #[test]
    fn test_layout_and_page_predicates_agree() {
        let layout = text("#let layout(body) = body");
        let plain = text("= Home");

        assert!(is_layout_file("index.typ", &layout, "index.typ"));
        assert!(!is_page_file("index.typ", &layout, "index.typ"));

        // Index without a layout binding is an ordinary page
        assert!(!is_layout_file("index.typ", &plain, "index.typ"));
        assert!(is_page_file("index.typ", &plain, "index.typ"));

        // Only the index name can be a layout
        assert!(!is_layout_file("base.typ", &layout, "index.typ"));
        assert!(is_page_file("base.typ", &layout, "index.typ"));
    }

    #[test]
    fn test_binary_markup_is_page_not_layout() {
        let binary = Content::Binary(vec![0xff]);
        assert!(!is_layout_file("index.typ", &binary, "index.typ"));
        assert!(is_page_file("index.typ", &binary, "index.typ"));
    }

    #[test]
    fn test_is_markup() {
        assert!(is_markup("post.typ"));
        assert!(!is_markup("post.typst"));
        assert!(!is_markup(".typ"));
        assert!(!is_markup("logo.png"));
    }
}
