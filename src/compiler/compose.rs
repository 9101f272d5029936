//! Document composition.
//!
//! Turns a page body plus its resolved layout(s) into one self-contained
//! document, placed at the sandbox document key:
//!
//! ```text
//! [merged set rules]        (merge mode, two or more layouts)
//! <nearest layout source>   (references rewritten)
//! #show: layout
//! <page body>               (references rewritten)
//! ```
//!
//! Without any layout the body is wrapped in a minimal shell instead.

use thiserror::Error;

use super::rewrite::rewrite_references;
use crate::core::{Content, join_key};
use crate::layout::{LayoutCandidate, Resolved, merge_styles};

/// Page defaults used when no layout applies.
const SHELL: &str = "#set page(paper: \"a4\", margin: 2cm)\n#set text(size: 11pt)\n";

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("page `{0}` is not valid UTF-8 text")]
    NotText(String),
}

/// Where the pieces of a document come from and where it goes.
///
/// All fields are root-relative keys.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    /// Content directory that layout paths are relative to
    pub content_dir: &'a str,
    /// The page source file
    pub page: &'a str,
    /// Where the composed document will be written
    pub document: &'a str,
}

/// Compose the final document for one page.
pub fn compose(
    resolved: &Resolved,
    body: &Content,
    placement: &Placement<'_>,
) -> Result<String, ComposeError> {
    let body = body
        .as_text()
        .ok_or_else(|| ComposeError::NotText(placement.page.to_string()))?;
    let body = rewrite_references(body, placement.page, placement.document);

    let document = match resolved.candidates() {
        [] => shell(&body),
        [single] => wrap(single, &body, placement),
        layouts @ [nearest, ..] => match resolved {
            Resolved::Merged(_) => {
                let mut doc: String = merge_styles(layouts)
                    .into_iter()
                    .map(|directive| format!("#{}\n", directive.text))
                    .collect();
                doc.push_str(&wrap(nearest, &body, placement));
                doc
            }
            _ => wrap(nearest, &body, placement),
        },
    };

    Ok(document)
}

fn shell(body: &str) -> String {
    format!("{SHELL}\n{body}")
}

fn wrap(layout: &LayoutCandidate, body: &str, placement: &Placement<'_>) -> String {
    let key = join_key(placement.content_dir, &layout.path);
    let source = rewrite_references(&layout.source, &key, placement.document);
    let mut doc = String::with_capacity(source.len() + body.len() + 24);
    doc.push_str(&source);
    if !source.ends_with('\n') {
        doc.push('\n');
    }
    doc.push_str("#show: layout\n");
    doc.push_str(body);
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLACEMENT: Placement<'static> = Placement {
        content_dir: "content",
        page: "content/blog/post.typ",
        document: ".typage/page-1/main.typ",
    };

    fn candidate(path: &[&str], depth: usize, source: &str) -> LayoutCandidate {
        LayoutCandidate {
            path: path.iter().map(|s| s.to_string()).collect(),
            source: source.to_string(),
            depth,
        }
    }

    fn body(s: &str) -> Content {
        Content::Text(s.to_string())
    }

    #[test]
    fn test_no_layout_uses_shell() {
        let doc = compose(&Resolved::None, &body("= Post"), &PLACEMENT).unwrap();
        assert!(doc.starts_with(SHELL));
        assert!(doc.ends_with("= Post"));

        let doc = compose(&Resolved::Merged(vec![]), &body("= Post"), &PLACEMENT).unwrap();
        assert!(doc.starts_with(SHELL));
    }

    #[test]
    fn test_single_layout_is_applied_with_show_rule() {
        let layout = candidate(&["blog", "index.typ"], 0, "#import \"./nav.typ\": nav\n#let layout(body) = { nav()\n body }");
        let doc = compose(&Resolved::Single(layout), &body("= Post"), &PLACEMENT).unwrap();

        assert!(doc.contains("#import \"../../content/blog/nav.typ\": nav"));
        let show = doc.find("#show: layout").unwrap();
        let post = doc.find("= Post").unwrap();
        assert!(show < post);
        assert!(!doc.contains(SHELL));
    }

    #[test]
    fn test_page_references_are_rewritten() {
        let doc = compose(&Resolved::None, &body("#image(\"./cover.png\")"), &PLACEMENT).unwrap();
        assert!(doc.contains("#image(\"../../content/blog/cover.png\")"));
    }

    #[test]
    fn test_merge_prepends_merged_styles() {
        let near = candidate(&["blog", "index.typ"], 0, "#let layout(body) = { set text(size: 12pt)\n body }");
        let far = candidate(&["index.typ"], 1, "#let layout(body) = { set text(size: 10pt)\n set page(paper: \"a5\")\n body }");
        let doc = compose(&Resolved::Merged(vec![near, far]), &body("x"), &PLACEMENT).unwrap();

        let lines: Vec<_> = doc.lines().collect();
        assert_eq!(lines[0], "#set text(size: 12pt)");
        assert_eq!(lines[1], "#set page(paper: \"a5\")");
        assert!(lines[2].starts_with("#let layout(body) = { set text(size: 12pt)"));
        assert!(doc.contains("#show: layout\nx"));
    }

    #[test]
    fn test_merge_single_layout_has_no_prelude() {
        let only = candidate(&["index.typ"], 1, "#let layout(body) = { set text(size: 10pt)\n body }");
        let doc = compose(&Resolved::Merged(vec![only]), &body("x"), &PLACEMENT).unwrap();
        assert!(doc.starts_with("#let layout"));
    }

    #[test]
    fn test_binary_body_is_rejected() {
        let err = compose(&Resolved::None, &Content::Binary(vec![0xff]), &PLACEMENT).unwrap_err();
        assert!(matches!(err, ComposeError::NotText(ref page) if page == "content/blog/post.typ"));
    }
}
