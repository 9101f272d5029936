//! Site configuration management for `typage.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── build/     # [build], [build.layout], [build.typst]
//! │   └── serve      # [serve]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   └── field      # FieldPath
//! └── mod.rs         # SiteConfig (this file)
//! ```
//!
//! All paths are relative to the project root (the directory holding the
//! config file) and are made absolute while loading.

pub mod section;
pub mod types;
mod util;

use util::{expand_path, find_config_file};

pub use section::{BuildConfig, ServeConfig};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::cli::{BuildArgs, Cli, Commands};
use crate::compiler::sandbox::SANDBOX_DIR;
use crate::log;
use crate::utils::path::{normalize_path, path_to_key};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Build directory of tooling living next to the site.
const CARGO_TARGET_DIR: &str = "target";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing typage.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Load configuration from CLI arguments.
    ///
    /// For non-Init commands, searches upward from cwd to find config file.
    /// The project root is determined by the config file's parent directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let (config_path, exists) = Self::resolve_config_path(cli)?;

        if !cli.is_init() && !exists {
            bail!(ConfigError::NotFound(cli.config.clone()));
        }

        let mut config = if exists && !cli.is_init() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };

        let root = match &cli.command {
            Commands::Init { .. } => config_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            _ => config_path
                .parent()
                .map(Path::to_path_buf)
                .context("Config file has no parent directory")?,
        };

        config.config_path = config_path;
        config.apply_command_options(cli);
        config.set_root(&root);

        if !cli.is_init() {
            config.validate()?;
        }

        Ok(config)
    }

    /// Resolve config file path based on command.
    fn resolve_config_path(cli: &Cli) -> Result<(PathBuf, bool)> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        match &cli.command {
            Commands::Init { name } => {
                let dir = name.as_ref().map_or_else(|| cwd.clone(), |name| cwd.join(name));
                let path = dir.join(&cli.config);
                let exists = path.exists();
                Ok((path, exists))
            }
            _ => match find_config_file(&cli.config) {
                Some(path) => Ok((path, true)),
                None => Ok((cwd.join(&cli.config), false)),
            },
        }
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
            if !Self::prompt_continue()? {
                bail!("Aborted due to unknown config fields");
            }
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        eprintln!();
        log!("warning"; "unknown fields in {}:", display_path);
        log!("warning"; "ignoring:");
        for field in fields {
            eprintln!("- {}", field);
        }
        eprintln!();
    }

    /// Prompt user to continue. Returns true only if user explicitly confirms.
    fn prompt_continue() -> Result<bool> {
        use std::io::{self, IsTerminal, Write};

        if !io::stdin().is_terminal() {
            return Ok(false);
        }

        eprint!("Continue? [y/N] ");
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        let input = input.trim().to_lowercase();
        Ok(input == "y" || input == "yes")
    }

    /// Set the project root and make every configured path absolute.
    pub fn set_root(&mut self, root: &Path) {
        let root = normalize_path(root);
        self.build.content = normalize_path(&root.join(&self.build.content));
        self.build.assets = normalize_path(&root.join(&self.build.assets));
        self.build.output = normalize_path(&root.join(&self.build.output));
        self.build.fonts = self
            .build
            .fonts
            .iter()
            .map(|p| expand_path(p, &root))
            .collect();
        self.root = root;
    }

    /// Builder-style [`set_root`](Self::set_root).
    #[cfg(test)]
    pub fn with_root(mut self, root: &Path) -> Self {
        self.set_root(root);
        self
    }

    /// Get path relative to the site root
    pub fn root_relative(&self, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref()
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.as_ref().to_path_buf())
    }

    // ========================================================================
    // root-relative keys
    // ========================================================================

    /// Root-relative key of an absolute path inside the project.
    pub fn key_of(&self, path: &Path) -> Option<String> {
        path_to_key(path, &self.root)
    }

    /// Key of the content directory (`content`).
    pub fn content_key(&self) -> String {
        self.key_of(&self.build.content).unwrap_or_default()
    }

    /// Keys never read into the project tree and never watched.
    pub fn excluded_keys(&self) -> Vec<String> {
        let mut keys = vec![SANDBOX_DIR.to_string(), CARGO_TARGET_DIR.to_string()];
        if let Some(output) = self.key_of(&self.build.output).filter(|key| !key.is_empty()) {
            keys.push(output);
        }
        keys
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli) {
        Self::update_option(&mut self.build.content, cli.content.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());

        match &cli.command {
            Commands::Build { build_args } => self.apply_build_args(build_args),
            Commands::Serve {
                build_args,
                interface,
                port,
                watch,
            } => {
                self.apply_build_args(build_args);
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
                Self::update_option(&mut self.serve.watch, watch.as_ref());
            }
            Commands::Init { .. } => {}
        }
    }

    fn apply_build_args(&mut self, args: &BuildArgs) {
        self.build.clean = args.clean;
        Self::update_option(&mut self.build.layout.mode, args.mode.as_ref());
        Self::update_option(&mut self.build.batch_size, args.batch_size.as_ref());
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate configuration.
    ///
    /// Collects all field errors and returns them at once. A missing content
    /// directory is reported on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        self.build.validate(&mut diag);
        self.serve.validate(&mut diag);
        diag.into_result()?;

        self.check_content_dir()
    }

    /// The content directory must exist before anything is built.
    pub fn check_content_dir(&self) -> Result<(), ConfigError> {
        if self.build.content.is_dir() {
            Ok(())
        } else {
            Err(ConfigError::MissingContent(self.root_relative(&self.build.content)))
        }
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> SiteConfig {
    let (parsed, ignored) = SiteConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_invalid_toml_rejected() {
        let err = SiteConfig::parse_with_ignored("[build\ncontent = \"x\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_site_config_default() {
        let config = SiteConfig::default();
        assert_eq!(config.config_path, PathBuf::new());
        assert_eq!(config.build.batch_size, 4);
        assert_eq!(config.serve.port, 5277);
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[build]\ncontent = \"pages\"\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = SiteConfig::parse_with_ignored(content).unwrap();

        assert_eq!(config.build.content, PathBuf::from("pages"));
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_set_root_makes_paths_absolute() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("content")).unwrap();
        let config = test_parse_config("").with_root(tmp.path());

        assert!(config.build.content.is_absolute());
        assert_eq!(config.content_key(), "content");
        assert_eq!(config.excluded_keys(), vec![".typage", "target", "public"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_content_dir_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let config = test_parse_config("").with_root(tmp.path());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingContent(ref p) if p == Path::new("content")));
    }

    #[test]
    fn test_nested_keys() {
        let tmp = TempDir::new().unwrap();
        let config = test_parse_config("[build]\ncontent = \"site/pages\"\noutput = \"dist/www\"")
            .with_root(tmp.path());
        assert_eq!(config.content_key(), "site/pages");
        assert!(config.excluded_keys().contains(&"dist/www".to_string()));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from(["typage", "-o", "dist", "serve", "--mode", "merge", "-p", "9000", "--clean"])
            .unwrap();
        let mut config = test_parse_config("[build.layout]\nmode = \"none\"");
        config.apply_command_options(&cli);

        assert_eq!(config.build.output, PathBuf::from("dist"));
        assert_eq!(config.build.layout.mode, crate::layout::InheritanceMode::Merge);
        assert_eq!(config.serve.port, 9000);
        assert!(config.build.clean);
    }
}
