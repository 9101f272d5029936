//! Configuration section definitions.
//!
//! Each module corresponds to a section in `typage.toml`:
//!
//! | Module   | TOML Section | Purpose                              |
//! |----------|--------------|--------------------------------------|
//! | `build`  | `[build]`    | Paths, batching, layouts, compiler   |
//! | `serve`  | `[serve]`    | Development server                   |

pub mod build;
mod serve;

pub use build::BuildConfig;
pub use serve::ServeConfig;
