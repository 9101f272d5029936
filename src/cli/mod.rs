//! Command-line interface module.

mod args;
pub mod build;
pub mod init;
pub mod serve;
mod watch;

pub use args::{BuildArgs, Cli, Commands};
