//! Typage - a static site generator for Typst pages.

mod cli;
mod compiler;
mod config;
mod core;
mod embed;
mod layout;
mod logger;
mod page;
mod scan;
mod utils;

use std::sync::Arc;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::SiteConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = SiteConfig::load(&cli)?;
    debug!("config"; "root: {}", config.root.display());

    match &cli.command {
        Commands::Init { name } => cli::init::new_site(&config, name.is_some()),
        Commands::Build { .. } => cli::build::build_site(&config),
        Commands::Serve { .. } => cli::serve::serve_site(Arc::new(config)),
    }
}
