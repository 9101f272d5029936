//! Route mapping between source paths, public URLs and output files.
//!
//! ```text
//! content/blog/post.typ   -> /blog/post/ -> public/blog/post/index.{pdf,html}
//! content/blog/index.typ  -> /blog/      -> public/blog/index.{pdf,html}
//! content/index.typ       -> /           -> public/index.{pdf,html}
//! ```
//!
//! Path segments are relative to the content directory.

/// Extension of the compiled page artifact.
pub const ARTIFACT_EXT: &str = "pdf";

/// File stem shared by the artifact and its HTML wrapper.
const ENTRY_STEM: &str = "index";

/// Output locations for one route, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    /// Route directory (`""` for the root route)
    pub dir: String,
    /// Compiled artifact (e.g. `blog/post/index.pdf`)
    pub artifact_rel_path: String,
    /// HTML entry file (e.g. `blog/post/index.html`)
    pub html_rel_path: String,
}

/// Map a source path to its public route.
///
/// A file named `index_name` stands for its parent directory; any other file
/// maps to its directory plus its name without extension. Routes always
/// start and end with `/`.
pub fn path_to_route<S: AsRef<str>>(segments: &[S], index_name: &str) -> String {
    let Some((file, dirs)) = segments.split_last() else {
        return "/".to_string();
    };
    let file = file.as_ref();

    let mut parts: Vec<&str> = dirs.iter().map(AsRef::as_ref).collect();
    if file != index_name {
        parts.push(strip_extension(file));
    }

    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", parts.join("/"))
    }
}

/// Map a route to its output locations. Inverse of [`path_to_route`].
pub fn route_to_build_path(route: &str) -> BuildTarget {
    let dir = route.trim_matches('/').to_string();
    let in_dir = |file: String| {
        if dir.is_empty() {
            file
        } else {
            format!("{dir}/{file}")
        }
    };

    BuildTarget {
        artifact_rel_path: in_dir(format!("{ENTRY_STEM}.{ARTIFACT_EXT}")),
        html_rel_path: in_dir(format!("{ENTRY_STEM}.html")),
        dir,
    }
}

/// Artifact file name as referenced from the HTML wrapper.
pub fn artifact_file_name() -> String {
    format!("{ENTRY_STEM}.{ARTIFACT_EXT}")
}

/// Name without its last extension (`post.typ` -> `post`).
#[inline]
pub fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}
