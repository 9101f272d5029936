//! The external compiler seam.
//!
//! The core never links a typesetter. It writes a composed document into a
//! sandbox and asks a [`PageCompiler`] to turn it into an artifact next to
//! it. [`TypstCompiler`] does that by running the `typst` CLI.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{ConfigError, SiteConfig};
use crate::debug;
use crate::utils::exec::{Cmd, FilterRule};

/// One compilation job.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    /// Composed document (`<sandbox>/main.typ`)
    pub document: PathBuf,
    /// Where the artifact must be written (`<sandbox>/main.pdf`)
    pub artifact: PathBuf,
    /// Sandbox directory, used as working directory
    pub sandbox: PathBuf,
    /// Project root, the boundary for absolute references
    pub root: PathBuf,
}

/// Result of one compilation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl CompileOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Anything that can compile a sandboxed document.
///
/// Implementations report failures through [`CompileOutcome`] and never
/// panic; one page failing must not affect the others.
pub trait PageCompiler: Send + Sync + 'static {
    fn compile(&self, request: CompileRequest) -> impl Future<Output = CompileOutcome> + Send;
}

/// Noise the typst CLI prints on success.
static TYPST_FILTER: FilterRule = FilterRule::new(&["compiling", "compiled"]);

/// Runs `typst compile` as a child process.
#[derive(Debug, Clone)]
pub struct TypstCompiler {
    command: Vec<String>,
    fonts: Vec<PathBuf>,
    timeout: Duration,
}

impl TypstCompiler {
    /// Build from configuration, failing early if the binary is missing.
    pub fn from_config(config: &SiteConfig) -> Result<Self, ConfigError> {
        let typst = &config.build.typst;
        let program = typst
            .command
            .first()
            .ok_or_else(|| ConfigError::Validation("`build.typst.command` is empty".into()))?;

        let resolved = which::which(program)
            .map_err(|_| ConfigError::CompilerNotFound(program.clone()))?;
        debug!("typst"; "using {}", resolved.display());

        Ok(Self {
            command: typst.command.clone(),
            fonts: config.build.fonts.clone(),
            timeout: Duration::from_secs(typst.timeout),
        })
    }

    fn command(&self, request: &CompileRequest) -> Cmd {
        let mut cmd = Cmd::from_slice(&self.command)
            .arg("compile")
            .arg("--root")
            .arg(&request.root);
        for font in &self.fonts {
            cmd = cmd.arg("--font-path").arg(font);
        }
        cmd.args([&request.document, &request.artifact])
            .cwd(&request.sandbox)
            .timeout(self.timeout)
            .filter(&TYPST_FILTER)
    }
}

impl PageCompiler for TypstCompiler {
    async fn compile(&self, request: CompileRequest) -> CompileOutcome {
        match self.command(&request).run_with_timeout().await {
            Ok(_) if request.artifact.is_file() => CompileOutcome::ok(),
            Ok(_) => CompileOutcome::failed(format!(
                "compiler exited successfully but wrote no {}",
                request.artifact.display()
            )),
            Err(e) => CompileOutcome::failed(format!("{e:#}")),
        }
    }
}
