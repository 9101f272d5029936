//! Site initialization.
//!
//! Creates a new site with a config file, a root layout and one page:
//!
//! ```text
//! typage.toml
//! content/index.typ   # layout inherited by every page
//! content/home.typ
//! assets/
//! ```

use std::{fs, path::Path};

use anyhow::{Context, Result, bail};

use crate::{
    compiler::sandbox::SANDBOX_DIR,
    config::SiteConfig,
    embed::init::{CONFIG_TOML, HOME_TYP, HomeVars, LAYOUT_TYP},
    log,
};

/// Initialization mode determines validation rules.
#[derive(Debug, Clone, Copy)]
pub enum InitMode {
    /// `typage init` - initialize in current directory (must be empty)
    CurrentDir,
    /// `typage init <name>` - create new subdirectory (must not exist)
    NewDir,
}

/// Create a new site at `config.root`.
pub fn new_site(config: &SiteConfig, has_name: bool) -> Result<()> {
    let root = &config.root;
    let mode = if has_name {
        InitMode::NewDir
    } else {
        InitMode::CurrentDir
    };
    validate_target(root, mode)?;

    let content = &config.build.content;
    let title = root
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("My Site")
        .to_string();

    create_dirs(&[root, content, &config.build.assets])?;
    write_file(&config.config_path, CONFIG_TOML)?;
    write_file(&content.join(&config.build.index), LAYOUT_TYP)?;
    write_file(&content.join("home.typ"), &HOME_TYP.render(&HomeVars { title }))?;

    let output = config.root_relative(&config.build.output);
    write_file(
        &root.join(".gitignore"),
        &format!("/{}/\n/{}/\n", output.display(), SANDBOX_DIR),
    )?;

    log!("init"; "site initialized at {}", root.display());
    Ok(())
}

/// Validate target directory for initialization.
///
/// - `CurrentDir`: directory must be empty (or not exist)
/// - `NewDir`: directory must not exist
pub fn validate_target(root: &Path, mode: InitMode) -> Result<()> {
    match mode {
        InitMode::CurrentDir => {
            if !is_empty(root)? {
                bail!(
                    "Current directory is not empty.\n\
                     Use `typage init <name>` to create in a new subdirectory."
                );
            }
        }
        InitMode::NewDir => {
            if root.exists() {
                bail!(
                    "Directory '{}' already exists.\n\
                     Choose a different name or remove the existing directory.",
                    root.display()
                );
            }
        }
    }
    Ok(())
}

fn is_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    let is_empty = fs::read_dir(path)
        .with_context(|| format!("Failed to read directory '{}'", path.display()))?
        .next()
        .is_none();
    Ok(is_empty)
}

fn create_dirs(dirs: &[&Path]) -> Result<()> {
    for dir in dirs {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory '{}'", dir.display()))?;
    }
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write '{}'", path.display()))
}
