//! Best-effort structural scanning of Typst source.
//!
//! Nothing here parses Typst. Every query works on a *masked* copy of the
//! source in which raw/fenced blocks and comments are blanked out (replaced
//! by spaces, keeping byte offsets and newlines intact), then applies
//! line-oriented patterns.
//!
//! Masking is what keeps documentation from lying to us: a page that shows
//! ```` ```typ #let layout(body) = ... ``` ```` in a raw block is not a layout,
//! and an `#import` inside a comment is not a dependency.
//!
//! # False negatives
//!
//! Unusual formatting is simply not recognized:
//! - a layout binding that does not start at column 0
//! - a `set` rule that shares a line with another statement
//! - references built from string concatenation
//!
//! Callers treat a miss as "feature absent", never as an error.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// `#let layout(body) =` at column 0, exactly one plain parameter.
static LAYOUT_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^#let[ \t]+layout[ \t]*\([ \t]*[A-Za-z_][\w-]*[ \t]*\)[ \t]*=").unwrap()
});

/// `set kind(` at the start of a (trimmed) line, with optional `#`.
static SET_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#?set[ \t]+([A-Za-z][\w.-]*)[ \t]*\(").unwrap());

/// Path-carrying directives: `import`/`include` and file-reading functions.
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:#?\b(?:import|include)[ \t]+|\b(?:image|read|json|yaml|toml|csv|xml|cbor|bibliography|plugin)[ \t]*\([ \t]*)"([^"\n]*)""#,
    )
    .unwrap()
});

/// Level-1 heading.
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^=[ \t]+(.+?)[ \t]*$").unwrap());

// ============================================================================
// Masking
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    /// Inside `"..."`; strings never span lines
    Str,
    LineComment,
    /// Nesting depth of `/* */`
    BlockComment(usize),
    /// Inside raw text opened by this many backticks
    Raw(usize),
    /// Between `~~~` fence lines
    Tilde,
}

/// Blank out raw text and comments, preserving byte offsets.
///
/// A single pass over the source with string literals tracked first, so
/// `/*` or `//` inside `"..."` never opens a comment.
///
/// - `//` to end of line is blanked, except right after `:` (`https://`).
/// - `/* ... */` is blanked, nesting, possibly across lines.
/// - Raw text between runs of backticks is blanked with its fences.
/// - Lines between `~~~` fence lines are blanked.
///
/// String literals are kept, so reference paths stay visible.
pub fn mask(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut state = State::Code;
    let mut i = 0;

    while i < bytes.len() {
        let at_line_start = i == 0 || bytes[i - 1] == b'\n';
        if at_line_start && matches!(state, State::Code | State::Tilde) {
            let end = line_end(bytes, i);
            let opens_fence = source[i..end].trim_start().starts_with("~~~");
            if state == State::Tilde || opens_fence {
                blank(&mut out, &bytes[i..end]);
                if opens_fence {
                    state = if state == State::Tilde { State::Code } else { State::Tilde };
                }
                i = end;
                continue;
            }
        }

        let rest = &bytes[i..];
        let (next, taken) = match state {
            State::Code => match rest[0] {
                b'\\' => (State::Code, keep(&mut out, &rest[..rest.len().min(2)])),
                b'"' => (State::Str, keep(&mut out, &rest[..1])),
                b'`' => {
                    let run = rest.iter().take_while(|&&b| b == b'`').count();
                    (State::Raw(run), blank(&mut out, &rest[..run]))
                }
                _ if rest.starts_with(b"/*") => (State::BlockComment(1), blank(&mut out, &rest[..2])),
                _ if rest.starts_with(b"//") && (i == 0 || bytes[i - 1] != b':') => {
                    (State::LineComment, 0)
                }
                _ => (State::Code, keep(&mut out, &rest[..1])),
            },
            State::Str => match rest[0] {
                b'\\' if rest.get(1).is_some_and(|&b| b != b'\n') => {
                    (State::Str, keep(&mut out, &rest[..2]))
                }
                b'"' | b'\n' => (State::Code, keep(&mut out, &rest[..1])),
                _ => (State::Str, keep(&mut out, &rest[..1])),
            },
            State::LineComment => match rest[0] {
                b'\n' => (State::Code, keep(&mut out, &rest[..1])),
                _ => (State::LineComment, blank(&mut out, &rest[..1])),
            },
            State::BlockComment(depth) => {
                if rest.starts_with(b"/*") {
                    (State::BlockComment(depth + 1), blank(&mut out, &rest[..2]))
                } else if rest.starts_with(b"*/") {
                    let next = match depth {
                        1 => State::Code,
                        _ => State::BlockComment(depth - 1),
                    };
                    (next, blank(&mut out, &rest[..2]))
                } else {
                    (state, blank(&mut out, &rest[..1]))
                }
            }
            State::Raw(open) => {
                let run = rest.iter().take_while(|&&b| b == b'`').count();
                if run >= open {
                    (State::Code, blank(&mut out, &rest[..run]))
                } else {
                    (state, blank(&mut out, &rest[..run.max(1)]))
                }
            }
            State::Tilde => (state, blank(&mut out, &rest[..1])),
        };
        state = next;
        i += taken;
    }

    // Only whole UTF-8 sequences are kept and blanked bytes become ASCII.
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Index just past the end of the line starting at `start`.
fn line_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |pos| start + pos + 1)
}

fn keep(out: &mut Vec<u8>, text: &[u8]) -> usize {
    out.extend_from_slice(text);
    text.len()
}

/// Replace `text` by spaces, keeping newlines.
fn blank(out: &mut Vec<u8>, text: &[u8]) -> usize {
    out.extend(text.iter().map(|&b| if b == b'\n' { b'\n' } else { b' ' }));
    text.len()
}

// ============================================================================
// Layout detection
// ============================================================================

/// Whether `source` defines a layout: a top-level `#let layout(x) =` binding
/// outside raw blocks and comments.
pub fn is_layout(source: &str) -> bool {
    LAYOUT_DEF.is_match(&mask(source))
}

/// Inner text of the layout's body block (`{ ... }` or `[ ... ]`).
///
/// Returns `None` when there is no layout definition or its body is not a
/// block (e.g. `= it => page(it)`). The returned text is masked.
pub fn layout_body(source: &str) -> Option<String> {
    let masked = mask(source);
    let def = LAYOUT_DEF.find(&masked)?;
    let after = &masked[def.end()..];
    let open = after.len() - after.trim_start().len();
    let opener = after[open..].chars().next()?;
    if opener != '{' && opener != '[' {
        return None;
    }
    let start = def.end() + open;
    let end = matching_close(&masked, start)?;
    Some(masked[start + 1..end].to_string())
}

// ============================================================================
// Style directives
// ============================================================================

/// A `set` rule found at the top level of a layout body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRule {
    /// Element name (`text`, `page`, `par`, ...)
    pub kind: String,
    /// Full rule without leading `#`, e.g. `set text(size: 11pt)`
    pub text: String,
}

/// Extract top-level `set` rules from a layout's body block.
///
/// Rules nested deeper than the body block (inside `if`, `show`, nested
/// content blocks, ...) are ignored. Argument lists may span lines.
pub fn set_rules(source: &str) -> Vec<SetRule> {
    let Some(body) = layout_body(source) else {
        return Vec::new();
    };

    let bytes = body.as_bytes();
    let mut rules = Vec::new();
    let mut depth = 0usize;
    let mut line_start = true;
    let mut i = 0;

    while i < bytes.len() {
        if line_start && depth == 0 {
            let indent = body[i..].len() - body[i..].trim_start_matches([' ', '\t']).len();
            i += indent;
            if let Some(caps) = SET_RULE.captures(&body[i..]) {
                let open = i + caps.get(0).map_or(0, |m| m.end()) - 1;
                if let Some(close) = matching_close(&body, open) {
                    let text = body[i..=close].trim_start_matches('#').to_string();
                    rules.push(SetRule {
                        kind: caps[1].to_string(),
                        text,
                    });
                    i = close + 1;
                    line_start = false;
                    continue;
                }
            }
            line_start = false;
            continue;
        }

        match bytes[i] {
            b'"' => i = skip_string(bytes, i),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'\n' => line_start = true,
            _ => {}
        }
        i += 1;
    }

    rules
}

// ============================================================================
// References
// ============================================================================

/// A path string inside a reference directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The referenced path as written
    pub path: String,
    /// Byte range of the path (without quotes) in the source
    pub span: Range<usize>,
}

impl Reference {
    /// Relative references start with `./` or `../`.
    #[inline]
    pub fn is_relative(&self) -> bool {
        is_relative(&self.path)
    }
}

/// Whether a reference path is relative to the referencing file.
#[inline]
pub fn is_relative(path: &str) -> bool {
    path.starts_with("./") || path.starts_with("../")
}

/// Every reference directive outside raw blocks and comments, in order.
pub fn references(source: &str) -> Vec<Reference> {
    let masked = mask(source);
    REFERENCE
        .captures_iter(&masked)
        .filter_map(|caps| caps.get(1))
        .map(|m| Reference {
            path: source[m.range()].to_string(),
            span: m.range(),
        })
        .collect()
}

// ============================================================================
// Headings
// ============================================================================

/// Text of the first level-1 heading (`= Title`), if any.
pub fn first_heading(source: &str) -> Option<String> {
    let masked = mask(source);
    HEADING
        .captures(&masked)
        .and_then(|caps| caps.get(1))
        .map(|m| source[m.range()].trim().to_string())
        .filter(|s| !s.is_empty())
}

// ============================================================================
// Helpers
// ============================================================================

/// Index of the bracket closing the one at `open`, skipping string literals.
fn matching_close(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut stack = vec![closer(*bytes.get(open)?)?];
    let mut i = open + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = skip_string(bytes, i),
            b @ (b'(' | b'[' | b'{') => stack.push(closer(b)?),
            b @ (b')' | b']' | b'}') => {
                if stack.last() == Some(&b) {
                    stack.pop();
                    if stack.is_empty() {
                        return Some(i);
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn closer(open: u8) -> Option<u8> {
    match open {
        b'(' => Some(b')'),
        b'[' => Some(b']'),
        b'{' => Some(b'}'),
        _ => None,
    }
}

/// Index of the closing quote of the string starting at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'"' | b'\n' => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: &str = r#"#import "../lib.typ": nav
#let layout(body) = {
  set page(paper: "a5")
  set text(
    font: "Inria Serif",
    size: 11pt,
  )
  if true {
    set par(justify: true)
  }
  nav()
  body
}
"#;

    #[test]
    fn test_mask_keeps_offsets() {
        let source = "a\n```\n#let layout(x) = x\n```\nb // tail\n// full\n/* c */d";
        let masked = mask(source);
        assert_eq!(masked.len(), source.len());
        assert_eq!(
            masked.matches('\n').count(),
            source.matches('\n').count()
        );
        assert!(!masked.contains("layout"));
        assert!(!masked.contains("full"));
        assert!(masked.contains(&format!("\nb{}\n", " ".repeat(8))));
        assert!(masked.ends_with("       d"));
    }

    #[test]
    fn test_mask_multibyte() {
        let source = "// héllo\n#let layout(b) = b";
        let masked = mask(source);
        assert_eq!(masked.len(), source.len());
        assert!(is_layout(source));
    }

    #[test]
    fn test_is_layout_detects_definition() {
        assert!(is_layout(LAYOUT));
        assert!(is_layout("#let layout(it) = page(it)"));
        assert!(is_layout("#let layout( doc ) = [#doc]"));
    }

    #[test]
    fn test_is_layout_rejects_other_shapes() {
        assert!(!is_layout("#let layout(body, title) = body"));
        assert!(!is_layout("#let layout = none"));
        assert!(!is_layout("#let layouts(body) = body"));
        assert!(!is_layout("  #let layout(body) = body"));
        assert!(!is_layout("= Just a page"));
    }

    #[test]
    fn test_is_layout_ignores_code_fences() {
        let doc = "= Docs\n\n```typ\n#let layout(body) = body\n```\n";
        assert!(!is_layout(doc));

        let tilde = "~~~\n#let layout(body) = body\n~~~\n";
        assert!(!is_layout(tilde));

        let after_fence = "```\nshown\n```\n#let layout(body) = body\n";
        assert!(is_layout(after_fence));
    }

    #[test]
    fn test_is_layout_ignores_comments() {
        assert!(!is_layout("// #let layout(body) = body"));
        assert!(!is_layout("/*\n#let layout(body) = body\n*/"));
    }

    #[test]
    fn test_comment_openers_inside_strings_are_text() {
        let src = "#let pattern = \"posts/*.typ\"\n#let layout(body) = body\n";
        assert!(is_layout(src));
        assert_eq!(mask(src), src);

        let url = "#let home = \"https://example.org\"\n= Home\n";
        assert_eq!(first_heading(url), Some("Home".to_string()));
    }

    #[test]
    fn test_trailing_line_comment_hides_block_opener() {
        let src = "#set text(size: 10pt) // globs look like /*\n#import \"./nav.typ\": nav\n";
        let paths: Vec<_> = references(src).into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["./nav.typ"]);

        let trailing = "#let x = 1 // #import \"./old.typ\"\n#import \"./new.typ\"";
        let paths: Vec<_> = references(trailing).into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["./new.typ"]);
    }

    #[test]
    fn test_block_comments_nest() {
        let src = "/* outer /* inner */ still */#let layout(body) = body";
        assert!(is_layout(src));
        assert!(!mask(src).contains("still"));
        assert!(!is_layout("/* /* */ #let layout(body) = body */"));
    }

    #[test]
    fn test_escaped_quote_keeps_string_open() {
        let src = "#let s = \"say \\\" /* no\"\n#let layout(body) = body";
        assert!(is_layout(src));
    }

    #[test]
    fn test_link_in_markup_is_not_comment() {
        let src = "See https://typst.app for docs.\n#import \"./a.typ\"";
        assert_eq!(mask(src), src);
        assert_eq!(references(src).len(), 1);
    }

    #[test]
    fn test_inline_raw_does_not_open_fence() {
        let doc = "Use ```typ #show: layout``` here.\n#let layout(body) = body\n";
        assert!(is_layout(doc));
    }

    #[test]
    fn test_layout_body_block() {
        let body = layout_body(LAYOUT).unwrap();
        assert!(body.contains("set page"));
        assert!(body.trim_end().ends_with("body"));
        assert!(layout_body("#let layout(b) = page(b)").is_none());
        assert!(layout_body("= page").is_none());
    }

    #[test]
    fn test_set_rules_top_level_only() {
        let rules = set_rules(LAYOUT);
        let kinds: Vec<_> = rules.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["page", "text"]);
        assert_eq!(rules[0].text, r#"set page(paper: "a5")"#);
        assert!(rules[1].text.starts_with("set text("));
        assert!(rules[1].text.contains("size: 11pt"));
        assert!(rules[1].text.ends_with(')'));
    }

    #[test]
    fn test_set_rules_content_block_with_hash() {
        let src = "#let layout(body) = [\n  #set text(fill: red)\n  #body\n]\n";
        let rules = set_rules(src);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].kind, "text");
        assert_eq!(rules[0].text, "set text(fill: red)");
    }

    #[test]
    fn test_set_rules_ignore_strings_with_parens() {
        let src = "#let layout(body) = {\n  set text(font: \"A (b\")\n  set page(margin: 1cm)\n  body\n}";
        let kinds: Vec<_> = set_rules(src).into_iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec!["text", "page"]);
    }

    #[test]
    fn test_set_rules_outside_layout_ignored() {
        let src = "#set text(size: 9pt)\n#let layout(body) = { body }";
        assert!(set_rules(src).is_empty());
        assert!(set_rules("#set text(size: 9pt)").is_empty());
    }

    #[test]
    fn test_references() {
        let src = r#"#import "../lib.typ": nav
#import "@preview/cetz:0.3.0"
#include "./part.typ"
#image("/assets/logo.png")
#let data = json("./data.json")
// #import "./commented.typ"
"#;
        let refs = references(src);
        let paths: Vec<_> = refs.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "../lib.typ",
                "@preview/cetz:0.3.0",
                "./part.typ",
                "/assets/logo.png",
                "./data.json"
            ]
        );
        let relative: Vec<_> = refs.iter().filter(|r| r.is_relative()).collect();
        assert_eq!(relative.len(), 3);
        assert_eq!(&src[refs[0].span.clone()], "../lib.typ");
    }

    #[test]
    fn test_references_in_fence_ignored() {
        let src = "```\n#import \"./a.typ\"\n```\n#import \"./b.typ\"";
        let paths: Vec<_> = references(src).into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["./b.typ"]);
    }

    #[test]
    fn test_first_heading() {
        assert_eq!(
            first_heading("#set text(size: 9pt)\n= Hello World \n== Sub"),
            Some("Hello World".to_string())
        );
        assert_eq!(first_heading("== Only sub"), None);
        assert_eq!(first_heading("```\n= Fake\n```"), None);
    }
}
