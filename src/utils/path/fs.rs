//! Path normalization utilities.
//!
//! - `normalize_path` - file system paths (canonicalize + fallback)
//! - `path_to_key` / `key_to_path` - convert between absolute paths and
//!   `/`-separated keys relative to a root

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Root-relative key of `path` (`content/blog/post.typ`).
///
/// Returns `None` when `path` is outside `root` or not valid UTF-8.
/// `root` itself maps to the empty key.
pub fn path_to_key(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Absolute path of a root-relative key.
pub fn key_to_path(key: &str, root: &Path) -> PathBuf {
    key.split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_relative_path_is_absolute() {
        assert!(normalize_path(Path::new("definitely/missing/dir")).is_absolute());
    }

    #[test]
    fn test_path_to_key() {
        let root = Path::new("/site");
        assert_eq!(
            path_to_key(Path::new("/site/content/blog/post.typ"), root).as_deref(),
            Some("content/blog/post.typ")
        );
        assert_eq!(path_to_key(Path::new("/site"), root).as_deref(), Some(""));
        assert_eq!(path_to_key(Path::new("/elsewhere/a.typ"), root), None);
    }

    #[test]
    fn test_key_round_trip() {
        let root = Path::new("/site");
        let path = key_to_path("content/blog/post.typ", root);
        assert_eq!(path, Path::new("/site/content/blog/post.typ"));
        assert_eq!(path_to_key(&path, root).as_deref(), Some("content/blog/post.typ"));
        assert_eq!(key_to_path("", root), root);
    }
}
