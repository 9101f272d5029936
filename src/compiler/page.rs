//! Single page compilation.
//!
//! ```text
//! resolve layouts -> sandbox -> compose -> compile -> write artifact + html
//! ```
//!
//! Every failure is returned as a [`PageError`]; the caller decides how to
//! report it. The sandbox is removed on every path out of [`build_page`].

use std::fs;

use anyhow::Context;
use thiserror::Error;

use super::compose::{ComposeError, Placement, compose};
use super::sandbox::Sandbox;
use super::typst::{CompileRequest, PageCompiler};
use super::CompileContext;
use crate::core::{BuildTarget, artifact_file_name, route_to_build_path};
use crate::embed::build::{PAGE_HTML, PageVars};
use crate::layout::resolve_layouts;
use crate::page::Page;
use crate::debug;

#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error("sandbox: {0:#}")]
    Sandbox(anyhow::Error),

    #[error("{0}")]
    Compile(String),

    #[error("compiler produced no artifact")]
    MissingArtifact,

    #[error("output: {0:#}")]
    Output(anyhow::Error),
}

/// Build one page and write it to the output directory.
pub async fn build_page<C: PageCompiler>(
    page: &Page,
    ctx: &CompileContext,
    compiler: &C,
) -> Result<BuildTarget, PageError> {
    let key = page.key(&ctx.content_dir);
    let resolved = resolve_layouts(&page.path, &ctx.content_tree, &ctx.policy());
    debug!("page"; "{} uses {} layout(s)", key, resolved.candidates().len());

    let sandbox = Sandbox::create(&ctx.root).map_err(PageError::Sandbox)?;
    let document_key = sandbox.document_key();
    let document = compose(
        &resolved,
        &page.content,
        &Placement {
            content_dir: &ctx.content_dir,
            page: &key,
            document: &document_key,
        },
    )?;
    let document_path = sandbox.write_document(&document).map_err(PageError::Sandbox)?;

    let outcome = compiler
        .compile(CompileRequest {
            document: document_path,
            artifact: sandbox.artifact_path(),
            sandbox: sandbox.path().to_path_buf(),
            root: ctx.root.clone(),
        })
        .await;
    if !outcome.success {
        return Err(PageError::Compile(
            outcome.error.unwrap_or_else(|| "compilation failed".into()),
        ));
    }

    let artifact = sandbox.read_artifact().ok_or(PageError::MissingArtifact)?;
    let target = route_to_build_path(&page.route(&ctx.index));
    write_output(page, ctx, &target, &artifact).map_err(PageError::Output)?;

    Ok(target)
}

fn write_output(
    page: &Page,
    ctx: &CompileContext,
    target: &BuildTarget,
    artifact: &[u8],
) -> anyhow::Result<()> {
    let dir = ctx.output.join(&target.dir);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let artifact_path = ctx.output.join(&target.artifact_rel_path);
    fs::write(&artifact_path, artifact)
        .with_context(|| format!("Failed to write {}", artifact_path.display()))?;

    let html = PAGE_HTML.render(&PageVars {
        title: page.title(),
        artifact: artifact_file_name(),
    });
    let html_path = ctx.output.join(&target.html_rel_path);
    fs::write(&html_path, html).with_context(|| format!("Failed to write {}", html_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::typst::CompileOutcome;
    use crate::core::{Content, FileTree};
    use crate::layout::InheritanceMode;
    use std::path::Path;
    use tempfile::TempDir;

    /// Writes the composed document back as the artifact.
    struct EchoCompiler;

    impl PageCompiler for EchoCompiler {
        async fn compile(&self, request: CompileRequest) -> CompileOutcome {
            match fs::copy(&request.document, &request.artifact) {
                Ok(_) => CompileOutcome::ok(),
                Err(e) => CompileOutcome::failed(e.to_string()),
            }
        }
    }

    struct FailingCompiler;

    impl PageCompiler for FailingCompiler {
        async fn compile(&self, _: CompileRequest) -> CompileOutcome {
            CompileOutcome::failed("error: unknown variable: oops")
        }
    }

    /// Reports success without producing anything.
    struct LazyCompiler;

    impl PageCompiler for LazyCompiler {
        async fn compile(&self, _: CompileRequest) -> CompileOutcome {
            CompileOutcome::ok()
        }
    }

    fn context(root: &Path, content_tree: FileTree) -> CompileContext {
        CompileContext {
            root: root.to_path_buf(),
            output: root.join("public"),
            content_dir: "content".into(),
            index: "index.typ".into(),
            mode: InheritanceMode::Fallback,
            max_depth: 8,
            content_tree,
        }
    }

    fn leaf(s: &str) -> FileTree {
        FileTree::Leaf(Content::Text(s.to_string()))
    }

    fn sandbox_is_empty(root: &Path) -> bool {
        fs::read_dir(root.join(crate::compiler::sandbox::SANDBOX_DIR))
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn test_build_page_writes_artifact_and_html() {
        let tmp = TempDir::new().unwrap();
        let tree = FileTree::Dir(
            [
                ("index.typ".to_string(), leaf("#let layout(body) = { body }")),
                ("post.typ".to_string(), leaf("= Hello")),
            ]
            .into_iter()
            .collect(),
        );
        let ctx = context(tmp.path(), tree);
        let page = Page::new(&["post.typ"], Content::Text("= Hello".into()));

        let target = build_page(&page, &ctx, &EchoCompiler).await.unwrap();

        assert_eq!(target.artifact_rel_path, "post/index.pdf");
        let artifact = fs::read_to_string(tmp.path().join("public/post/index.pdf")).unwrap();
        assert!(artifact.contains("#show: layout"));
        assert!(artifact.ends_with("= Hello"));
        let html = fs::read_to_string(tmp.path().join("public/post/index.html")).unwrap();
        assert!(html.contains("<title>Hello</title>"));
        assert!(sandbox_is_empty(tmp.path()));
    }

    #[tokio::test]
    async fn test_compile_failure_is_reported_and_cleaned_up() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path(), FileTree::default());
        let page = Page::new(&["post.typ"], Content::Text("x".into()));

        let err = build_page(&page, &ctx, &FailingCompiler).await.unwrap_err();

        assert!(matches!(err, PageError::Compile(ref msg) if msg.contains("oops")));
        assert!(!tmp.path().join("public/post").exists());
        assert!(sandbox_is_empty(tmp.path()));
    }

    #[tokio::test]
    async fn test_missing_artifact() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path(), FileTree::default());
        let page = Page::new(&["post.typ"], Content::Text("x".into()));

        let err = build_page(&page, &ctx, &LazyCompiler).await.unwrap_err();
        assert!(matches!(err, PageError::MissingArtifact));
    }

    #[tokio::test]
    async fn test_binary_page_is_compose_error() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path(), FileTree::default());
        let page = Page::new(&["bad.typ"], Content::Binary(vec![0xff, 0x00]));

        let err = build_page(&page, &ctx, &EchoCompiler).await.unwrap_err();
        assert!(matches!(err, PageError::Compose(ComposeError::NotText(_))));
        assert!(sandbox_is_empty(tmp.path()));
    }
}
