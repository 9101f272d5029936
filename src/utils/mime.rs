//! Content types for files in the output directory.
//!
//! The preview server only ever serves what a build writes: page PDFs and
//! their HTML wrappers, plus whatever sits in the assets area.

use std::path::Path;

/// Used for error bodies.
pub const PLAIN: &str = "text/plain; charset=utf-8";

const FALLBACK: &str = "application/octet-stream";

/// Extension (lowercase) to content type.
const TABLE: &[(&[&str], &str)] = &[
    (&["pdf"], "application/pdf"),
    (&["html", "htm"], "text/html; charset=utf-8"),
    (&["css"], "text/css; charset=utf-8"),
    (&["js", "mjs"], "text/javascript; charset=utf-8"),
    (&["txt"], PLAIN),
    (&["png"], "image/png"),
    (&["jpg", "jpeg"], "image/jpeg"),
    (&["gif"], "image/gif"),
    (&["webp"], "image/webp"),
    (&["svg"], "image/svg+xml"),
    (&["ico"], "image/x-icon"),
    (&["woff2"], "font/woff2"),
];

/// Content type of an output file, `application/octet-stream` if unknown.
pub fn content_type(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return FALLBACK;
    };
    let ext = ext.to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(exts, _)| exts.contains(&ext.as_str()))
        .map_or(FALLBACK, |(_, mime)| mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_outputs() {
        assert_eq!(content_type(Path::new("blog/post/index.pdf")), "application/pdf");
        assert!(content_type(Path::new("blog/post/index.html")).starts_with("text/html"));
    }

    #[test]
    fn test_assets_case_insensitive() {
        assert_eq!(content_type(Path::new("assets/LOGO.PNG")), "image/png");
        assert_eq!(content_type(Path::new("assets/photo.Jpeg")), "image/jpeg");
    }

    #[test]
    fn test_unknown_is_octet_stream() {
        assert_eq!(content_type(Path::new(".nojekyll")), FALLBACK);
        assert_eq!(content_type(Path::new("assets/data.bin")), FALLBACK);
    }
}
