//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Find config file by searching upward from current directory
///
/// Starts from cwd and walks up parent directories until finding `config_name`
/// Returns the absolute path to the config file if found
///
/// # Example
/// ```text
/// /home/user/site/content/posts/  ← cwd
/// /home/user/site/typage.toml     ← found!
/// ```
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_from(&cwd, config_name)
}

fn find_config_from(start: &Path, config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    start
        .ancestors()
        .map(|dir| dir.join(config_name))
        .find(|candidate| candidate.exists())
}

/// Expand `~` in a configured path and make it absolute against `root`.
pub fn expand_path(path: &Path, root: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let path = PathBuf::from(expanded);
    let full_path = if path.is_relative() {
        root.join(&path)
    } else {
        path
    };
    crate::utils::path::normalize_path(&full_path)
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_walks_up() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("content/blog");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join("typage.toml"), "").unwrap();

        let found = find_config_from(&nested, Path::new("typage.toml")).unwrap();
        assert_eq!(found, tmp.path().join("typage.toml"));
    }

    #[test]
    fn test_find_config_missing() {
        let tmp = TempDir::new().unwrap();
        assert!(find_config_from(tmp.path(), Path::new("no-such-config-xyz.toml")).is_none());
    }

    #[test]
    fn test_expand_path() {
        let root = Path::new("/site");
        assert_eq!(expand_path(Path::new("fonts"), root), PathBuf::from("/site/fonts"));
        assert!(!expand_path(Path::new("~/fonts"), root).starts_with("~"));
    }
}
