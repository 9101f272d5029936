//! `[build.layout]` section configuration.
//!
//! ```toml
//! [build.layout]
//! mode = "merge"
//! max_depth = 8
//! ```

use serde::{Deserialize, Serialize};

use crate::layout::InheritanceMode;

/// Layout inheritance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// How pages inherit layouts from ancestor directories.
    pub mode: InheritanceMode,

    /// Deepest ancestor level inspected in merge mode.
    pub max_depth: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            mode: InheritanceMode::Fallback,
            max_depth: 8,
        }
    }
}
