//! `[build.typst]` section configuration.
//!
//! ```toml
//! [build.typst]
//! command = ["typst"]    # or e.g. ["mise", "exec", "--", "typst"]
//! timeout = 60           # seconds
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

/// External compiler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypstConfig {
    /// Command prefix; `compile <args>` is appended.
    pub command: Vec<String>,

    /// Per-page compile timeout in seconds.
    pub timeout: u64,
}

impl Default for TypstConfig {
    fn default() -> Self {
        Self {
            command: vec!["typst".into()],
            timeout: 60,
        }
    }
}

impl TypstConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.command.first().is_none_or(|program| program.trim().is_empty()) {
            diag.error(FieldPath::new("build.typst.command"), "must name a program");
        }
        if self.timeout == 0 {
            diag.error(FieldPath::new("build.typst.timeout"), "must be at least 1 second");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_custom_command() {
        let config =
            test_parse_config("[build.typst]\ncommand = [\"mise\", \"exec\", \"--\", \"typst\"]\ntimeout = 5");
        assert_eq!(config.build.typst.command.len(), 4);
        assert_eq!(config.build.typst.timeout, 5);
    }

    #[test]
    fn test_validate() {
        let mut diag = ConfigDiagnostics::new();
        TypstConfig {
            command: vec![],
            timeout: 0,
        }
        .validate(&mut diag);
        assert_eq!(diag.fields(), vec!["build.typst.command", "build.typst.timeout"]);
    }
}
