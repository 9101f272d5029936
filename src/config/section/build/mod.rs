//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! content = "content"         # Page sources (relative to site root)
//! assets = "assets"           # Copied verbatim to <output>/assets
//! output = "public"           # Build output directory
//! index = "index.typ"         # Index/layout file name
//! batch_size = 4              # Pages compiled concurrently
//! fonts = ["fonts"]           # Extra font directories
//!
//! [build.layout]
//! mode = "fallback"           # none | fallback | merge
//! max_depth = 8               # Ancestor levels inspected in merge mode
//!
//! [build.typst]
//! command = ["typst"]         # Compiler command prefix
//! timeout = 60                # Seconds before a page compile is killed
//! ```
//!
//! See submodules for details: [`layout`], [`typst`].

mod layout;
mod typst;

pub use layout::LayoutConfig;
pub use typst::TypstConfig;

use crate::config::{ConfigDiagnostics, FieldPath};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Page source directory.
    pub content: PathBuf,

    /// Static assets directory.
    pub assets: PathBuf,

    /// Build output directory.
    pub output: PathBuf,

    /// Index / layout file name.
    pub index: String,

    /// Pages compiled concurrently.
    pub batch_size: usize,

    /// Extra font directories passed to the compiler.
    pub fonts: Vec<PathBuf>,

    /// Clean output directory before building (CLI only).
    #[serde(skip)]
    pub clean: bool,

    /// Layout inheritance settings.
    pub layout: LayoutConfig,

    /// External compiler settings.
    pub typst: TypstConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content: "content".into(),
            assets: "assets".into(),
            output: "public".into(),
            index: "index.typ".into(),
            batch_size: 4,
            fonts: Vec::new(),
            clean: false,
            layout: LayoutConfig::default(),
            typst: TypstConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Validate build configuration.
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.batch_size == 0 {
            diag.error(FieldPath::new("build.batch_size"), "must be at least 1");
        }

        if !crate::layout::is_markup(&self.index) || self.index.contains(['/', '\\']) {
            diag.error_with_hint(
                FieldPath::new("build.index"),
                format!("`{}` is not a markup file name", self.index),
                "use a plain file name such as `index.typ`",
            );
        }

        if self.output == self.content || self.content.starts_with(&self.output) {
            diag.error(
                FieldPath::new("build.output"),
                "output directory must not contain the content directory",
            );
        }

        self.typst.validate(diag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;
    use crate::layout::InheritanceMode;

    #[test]
    fn test_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.build.content, PathBuf::from("content"));
        assert_eq!(config.build.assets, PathBuf::from("assets"));
        assert_eq!(config.build.output, PathBuf::from("public"));
        assert_eq!(config.build.index, "index.typ");
        assert_eq!(config.build.batch_size, 4);
        assert_eq!(config.build.layout.mode, InheritanceMode::Fallback);
        assert_eq!(config.build.typst.command, vec!["typst".to_string()]);
        assert!(!config.build.clean);
    }

    #[test]
    fn test_custom_build() {
        let config = test_parse_config(
            r#"
[build]
content = "pages"
index = "main.typ"
batch_size = 2
fonts = ["fonts"]
"#,
        );
        assert_eq!(config.build.content, PathBuf::from("pages"));
        assert_eq!(config.build.index, "main.typ");
        assert_eq!(config.build.batch_size, 2);
        assert_eq!(config.build.fonts, vec![PathBuf::from("fonts")]);
    }

    #[test]
    fn test_validate_collects_errors() {
        let config = test_parse_config("[build]\nbatch_size = 0\nindex = \"index.md\"\noutput = \"content\"");
        let mut diag = ConfigDiagnostics::new();
        config.build.validate(&mut diag);
        assert_eq!(diag.fields(), vec!["build.batch_size", "build.index", "build.output"]);
    }

    #[test]
    fn test_validate_default_is_clean() {
        let mut diag = ConfigDiagnostics::new();
        BuildConfig::default().validate(&mut diag);
        assert!(diag.fields().is_empty());
    }
}
