//! Style merging across ancestor layouts.

use rustc_hash::FxHashMap;

use super::LayoutCandidate;
use crate::scan::{self, SetRule};

/// A single `set` rule extracted from a layout, keyed by element kind.
pub type StyleDirective = SetRule;

/// Merge the `set` rules of several layouts into one list.
///
/// `layouts` is ordered nearest first. Rules are applied from the farthest
/// ancestor to the nearest; a later rule for the same kind replaces the
/// earlier one in place, so the result lists each kind once, in the order it
/// was first seen, with the nearest layout's text.
pub fn merge_styles(layouts: &[LayoutCandidate]) -> Vec<StyleDirective> {
    let mut order: Vec<String> = Vec::new();
    let mut by_kind: FxHashMap<String, StyleDirective> = FxHashMap::default();

    for layout in layouts.iter().rev() {
        for rule in scan::set_rules(&layout.source) {
            if !by_kind.contains_key(&rule.kind) {
                order.push(rule.kind.clone());
            }
            by_kind.insert(rule.kind.clone(), rule);
        }
    }

    order
        .into_iter()
        .filter_map(|kind| by_kind.remove(&kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(depth: usize, source: &str) -> LayoutCandidate {
        LayoutCandidate {
            path: vec!["index.typ".to_string()],
            source: source.to_string(),
            depth,
        }
    }

    #[test]
    fn test_nearest_wins_per_kind() {
        // L0 is nearest, L1 its parent
        let l0 = candidate(0, "#let layout(body) = { set text(size: 12pt)\n body }");
        let l1 = candidate(1, "#let layout(body) = { set text(size: 10pt)\n body }");

        let merged = merge_styles(&[l0, l1]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].kind, "text");
        assert_eq!(merged[0].text, "set text(size: 12pt)");
    }

    #[test]
    fn test_first_seen_order_is_kept() {
        let near = candidate(
            0,
            "#let layout(body) = {\n  set par(justify: true)\n  set page(paper: \"a5\")\n  body\n}",
        );
        let far = candidate(
            2,
            "#let layout(body) = {\n  set page(paper: \"a4\")\n  set text(lang: \"en\")\n  body\n}",
        );

        let merged = merge_styles(&[near, far]);
        let kinds: Vec<_> = merged.iter().map(|d| d.kind.as_str()).collect();

        // page and text come from the farthest layout first, par is new
        assert_eq!(kinds, vec!["page", "text", "par"]);
        assert_eq!(merged[0].text, "set page(paper: \"a5\")");
        assert_eq!(merged[1].text, "set text(lang: \"en\")");
    }

    #[test]
    fn test_layouts_without_rules() {
        let bare = candidate(0, "#let layout(body) = body");
        assert!(merge_styles(&[bare]).is_empty());
        assert!(merge_styles(&[]).is_empty());
    }
}
