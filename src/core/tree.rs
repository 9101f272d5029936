//! In-memory file tree.
//!
//! A project directory is read into a nested [`FileTree`] once per build and
//! shared read-only by every phase that needs it (layout resolution, graph
//! construction, page filtering). Paths are addressed as segment slices and
//! keyed as `/`-joined strings relative to the tree root.
//!
//! ```text
//! Dir {
//!     "content": Dir {
//!         "index.typ": Leaf(Text),
//!         "blog":      Dir { "post.typ": Leaf(Text) },
//!     },
//!     "assets": Dir { "logo.png": Leaf(Binary) },
//! }
//! ```

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Files never read into a tree.
const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

/// Leaf payload. UTF-8 files are text, everything else is binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Binary(Vec<u8>),
}

impl Content {
    fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(e) => Self::Binary(e.into_bytes()),
        }
    }

    /// Text payload, if any.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

/// A directory subtree or a single file.
///
/// Child names are unique within a directory. Children are kept sorted so
/// every traversal visits files in the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileTree {
    Leaf(Content),
    Dir(BTreeMap<String, FileTree>),
}

impl Default for FileTree {
    fn default() -> Self {
        Self::Dir(BTreeMap::new())
    }
}

impl FileTree {
    /// Read a directory into memory.
    ///
    /// Hidden entries (leading `.`) are skipped, as is every root-relative
    /// key listed in `exclude` (e.g. the output directory).
    pub fn read(root: &Path, exclude: &[String]) -> Result<Self> {
        read_dir(root, "", exclude)
    }

    /// Write this tree below `dest`, creating directories as needed.
    ///
    /// A leaf at the top level is written to `dest` itself.
    pub fn write(&self, dest: &Path) -> Result<()> {
        match self {
            Self::Leaf(content) => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(dest, content.as_bytes())
                    .with_context(|| format!("Failed to write {}", dest.display()))
            }
            Self::Dir(children) => {
                fs::create_dir_all(dest)
                    .with_context(|| format!("Failed to create {}", dest.display()))?;
                for (name, child) in children {
                    child.write(&dest.join(name))?;
                }
                Ok(())
            }
        }
    }

    /// Look up a node by path segments. An empty path yields `self`.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&FileTree> {
        path.iter().try_fold(self, |node, name| match node {
            Self::Dir(children) => children.get(name.as_ref()),
            Self::Leaf(_) => None,
        })
    }

    /// Look up a node by `/`-separated key.
    pub fn get_key(&self, key: &str) -> Option<&FileTree> {
        let segments: Vec<&str> = split_key(key).collect();
        self.get(&segments)
    }

    /// Leaf content at `path`, if the node exists and is a file.
    pub fn content<S: AsRef<str>>(&self, path: &[S]) -> Option<&Content> {
        match self.get(path)? {
            Self::Leaf(content) => Some(content),
            Self::Dir(_) => None,
        }
    }

    /// Children of a directory node.
    pub fn children(&self) -> Option<&BTreeMap<String, FileTree>> {
        match self {
            Self::Dir(children) => Some(children),
            Self::Leaf(_) => None,
        }
    }

    /// Every file below this node as `(segments, content)`, in sorted order.
    pub fn files(&self) -> Vec<(Vec<&str>, &Content)> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        collect_files(self, &mut stack, &mut out);
        out
    }

    /// Number of files below this node.
    pub fn file_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Dir(children) => children.values().map(Self::file_count).sum(),
        }
    }
}

/// Split a `/`-separated key into non-empty segments.
#[inline]
pub fn split_key(key: &str) -> impl Iterator<Item = &str> {
    key.split('/').filter(|s| !s.is_empty() && *s != ".")
}

/// Join segments into a key, optionally below a prefix key.
pub fn join_key<S: AsRef<str>>(prefix: &str, segments: &[S]) -> String {
    let mut key = prefix.trim_matches('/').to_string();
    for segment in segments {
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(segment.as_ref());
    }
    key
}

fn collect_files<'a>(
    node: &'a FileTree,
    stack: &mut Vec<&'a str>,
    out: &mut Vec<(Vec<&'a str>, &'a Content)>,
) {
    match node {
        FileTree::Leaf(content) => out.push((stack.clone(), content)),
        FileTree::Dir(children) => {
            for (name, child) in children {
                stack.push(name);
                collect_files(child, stack, out);
                stack.pop();
            }
        }
    }
}

fn read_dir(dir: &Path, key: &str, exclude: &[String]) -> Result<FileTree> {
    let mut children = BTreeMap::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;

    for entry in entries {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            crate::debug!("tree"; "skipping non-utf8 name in {}", dir.display());
            continue;
        };
        if name.starts_with('.') || IGNORED_FILES.contains(&name.as_str()) {
            continue;
        }

        let child_key = join_key(key, &[name.as_str()]);
        if exclude.iter().any(|ex| ex == &child_key) {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type()?;
        let node = if file_type.is_dir() {
            read_dir(&path, &child_key, exclude)?
        } else if path.is_file() {
            let bytes =
                fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            FileTree::Leaf(Content::from_bytes(bytes))
        } else {
            continue;
        };
        children.insert(name, node);
    }

    Ok(FileTree::Dir(children))
}

// ============================================================================
// Tests
// ============================================================================
