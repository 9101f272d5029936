//! Relative reference rewriting.
//!
//! A layout's source is pasted into a document that lives somewhere else
//! (the build sandbox), so its `./` and `../` references must be recomputed
//! to keep pointing at the same files:
//!
//! ```text
//! content/blog/index.typ:  #import "../lib.typ"        (-> content/lib.typ)
//! pasted into .typage/page-x/main.typ:
//!                          #import "../../content/lib.typ"
//! ```
//!
//! All paths here are `/`-separated keys relative to the project root.
//! Non-relative references (`/abs`, `@preview/pkg`) are left untouched.

use crate::core::split_key;
use crate::debug;
use crate::scan;

/// Resolve a relative `reference` written in file `from` to a root key.
///
/// Returns `None` when the reference climbs above the root.
pub fn resolve_reference(from: &str, reference: &str) -> Option<String> {
    let mut parts: Vec<&str> = split_key(from).collect();
    parts.pop();

    for segment in reference.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            name => parts.push(name),
        }
    }

    Some(parts.join("/"))
}

/// Relative path from file `to`'s directory to root key `target`.
///
/// Always starts with `./` or `../` so the result stays a relative reference.
pub fn relative_to(target: &str, to: &str) -> String {
    let target: Vec<&str> = split_key(target).collect();
    let mut to_dir: Vec<&str> = split_key(to).collect();
    to_dir.pop();

    let limit = to_dir.len().min(target.len().saturating_sub(1));
    let common = to_dir
        .iter()
        .zip(&target)
        .take(limit)
        .take_while(|(a, b)| a == b)
        .count();

    let ups = to_dir.len() - common;
    let rest = target[common..].join("/");
    if ups == 0 {
        format!("./{rest}")
    } else {
        format!("{}{rest}", "../".repeat(ups))
    }
}

/// Rewrite every relative reference in `source` (a file at key `from`) so it
/// resolves to the same file when `source` is placed at key `to`.
///
/// References that would climb above the root are kept verbatim.
pub fn rewrite_references(source: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(source.len() + 32);
    let mut last = 0;

    for reference in scan::references(source).into_iter().filter(scan::Reference::is_relative) {
        let Some(target) = resolve_reference(from, &reference.path) else {
            debug!("rewrite"; "{} escapes the project root in {}, kept as is", reference.path, from);
            continue;
        };
        out.push_str(&source[last..reference.span.start]);
        out.push_str(&relative_to(&target, to));
        last = reference.span.end;
    }

    out.push_str(&source[last..]);
    out
}
