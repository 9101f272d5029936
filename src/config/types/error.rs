//! Configuration errors and validation diagnostics.

use super::FieldPath;
use owo_colors::OwoColorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop `typage` before any page is compiled.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid typage.toml")]
    Toml(#[from] toml::de::Error),

    #[error("`{0}` not found, run `typage init` to create a new site")]
    NotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("content directory `{0}` does not exist")]
    MissingContent(PathBuf),

    #[error("compiler `{0}` not found in PATH, install typst or set `build.typst.command`")]
    CompilerNotFound(String),

    #[error("{0}")]
    Diagnostics(ConfigDiagnostics),
}

/// One rejected field.
#[derive(Debug, Clone)]
struct Issue {
    field: FieldPath,
    message: String,
    hint: Option<String>,
}

/// Field errors gathered from every section, reported in one go.
#[derive(Debug, Default)]
pub struct ConfigDiagnostics {
    issues: Vec<Issue>,
}

impl ConfigDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: FieldPath, message: impl Into<String>) {
        self.push(field, message.into(), None);
    }

    pub fn error_with_hint(
        &mut self,
        field: FieldPath,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.push(field, message.into(), Some(hint.into()));
    }

    fn push(&mut self, field: FieldPath, message: String, hint: Option<String>) {
        self.issues.push(Issue {
            field,
            message,
            hint,
        });
    }

    /// `Err` carrying every issue, `Ok` when the config is clean.
    pub fn into_result(self) -> Result<(), ConfigError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Diagnostics(self))
        }
    }

    /// Rejected fields, in the order they were reported.
    #[cfg(test)]
    pub fn fields(&self) -> Vec<&str> {
        self.issues.iter().map(|issue| issue.field.as_str()).collect()
    }
}

impl fmt::Display for ConfigDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} field(s))",
            "typage.toml rejected".red().bold(),
            self.issues.len()
        )?;
        for issue in &self.issues {
            write!(f, "\n  {}: {}", issue.field.as_str().cyan(), issue.message)?;
            if let Some(hint) = &issue.hint {
                write!(f, "\n    {} {}", "hint:".yellow(), hint)?;
            }
        }
        Ok(())
    }
}
