//! Site building orchestration.
//!
//! - **Full** - read the project, copy assets, compile every page in
//!   batches of `build.batch_size`
//! - **Incremental** - re-read the project after one change and compile only
//!   the pages depending on it, one at a time
//!
//! Page failures never abort a build; they are collected in a
//! [`BuildReport`]. Only configuration and I/O errors on the output
//! directory itself are returned as `Err`.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use jwalk::WalkDir;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tokio::task::JoinSet;

use crate::{
    compiler::{
        Change, ChangeScope, CompileContext, DependencyGraph, PageCompiler, PageError,
        TypstCompiler, affected_pages, build_graph, build_page, classify_change,
        scheduler::pages_for,
    },
    config::SiteConfig,
    core::{BuildTarget, FileTree, is_shutdown, route_to_build_path},
    debug, log,
    logger::ProgressLine,
    page::{Page, PageSet, RouteConflict, collect_pages},
    utils::path::key_to_path,
};

/// Output subdirectory receiving the project assets.
pub const ASSETS_OUTPUT_DIR: &str = "assets";

/// Marker disabling Jekyll processing on GitHub Pages.
const NOJEKYLL: &str = ".nojekyll";

// ============================================================================
// Snapshot
// ============================================================================

/// Project state read from disk for one build.
pub struct Snapshot {
    pub tree: FileTree,
    pub graph: DependencyGraph,
    pub ctx: Arc<CompileContext>,
}

impl Snapshot {
    /// Read the project tree and derive its dependency graph.
    pub fn read(config: &SiteConfig) -> Result<Self> {
        let tree = FileTree::read(&config.root, &config.excluded_keys())
            .with_context(|| format!("Failed to read project at {}", config.root.display()))?;
        let ctx = CompileContext::new(config, &tree);
        let graph = build_graph(&tree, &ctx.content_dir, &ctx.policy());
        debug!(
            "graph";
            "{} files, {} edges, {} with dependents",
            tree.file_count(),
            graph.edge_count(),
            graph.reverse_count()
        );

        Ok(Self {
            tree,
            graph,
            ctx: Arc::new(ctx),
        })
    }
}

// ============================================================================
// Report
// ============================================================================

/// A page that failed to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    /// Root-relative key of the page source
    pub page: String,
    pub message: String,
}

/// Outcome of a build: how many pages succeeded and which failed.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub built: usize,
    pub failures: Vec<PageFailure>,
}

impl BuildReport {
    fn record(&mut self, page: String, result: Result<BuildTarget, String>) {
        match result {
            Ok(target) => {
                debug!("build"; "{} -> {}", page, target.artifact_rel_path);
                self.built += 1;
            }
            Err(message) => self.failures.push(PageFailure { page, message }),
        }
    }

    /// Record pages skipped because another page owns their route.
    fn record_conflicts(&mut self, conflicts: &[RouteConflict], content_dir: &str) {
        for conflict in conflicts {
            self.failures.push(PageFailure {
                page: conflict.page.key(content_dir),
                message: conflict.message(content_dir),
            });
        }
        self.failures.sort_by(|a, b| a.page.cmp(&b.page));
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: Self) {
        self.built += other.built;
        self.failures.extend(other.failures);
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Print every failure followed by the summary line.
    pub fn log(&self) {
        for failure in &self.failures {
            log!("failed"; "{}\n{}", failure.page, failure.message);
        }
        if self.is_success() {
            log!("build"; "{} page(s) built", self.built);
        } else {
            log!(
                "error";
                "{} page(s) built, {} failed",
                self.built,
                self.failures.len()
            );
        }
    }

    /// `Err` when any page failed.
    pub fn into_result(self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            bail!("{} page(s) failed to build", self.failures.len())
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Multi-threaded runtime driving page compilation.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}

/// `typage build`: full build with the typst CLI, failing when any page fails.
pub fn build_site(config: &SiteConfig) -> Result<()> {
    let compiler = Arc::new(TypstCompiler::from_config(config)?);
    let (_, report) = runtime()?.block_on(full_build(config, compiler, false))?;
    report.log();
    report.into_result()
}

/// Build every page of the project.
///
/// Pages run as tasks in batches of `build.batch_size`; a batch is awaited
/// as a whole before the next one starts.
pub async fn full_build<C: PageCompiler>(
    config: &SiteConfig,
    compiler: Arc<C>,
    quiet: bool,
) -> Result<(Snapshot, BuildReport)> {
    prepare_output(config)?;

    let snapshot = Snapshot::read(config)?;
    let PageSet { pages, conflicts } =
        collect_pages(&snapshot.ctx.content_tree, &snapshot.ctx.index);
    let assets = collect_assets(&config.build.assets);
    debug!("build"; "{} pages, {} assets", pages.len(), assets.len());

    let progress = (!quiet)
        .then(|| ProgressLine::new(&[("pages", pages.len()), ("assets", assets.len())]));

    copy_assets(config, &assets, progress.as_ref())?;
    let mut report = compile_batches(
        pages,
        &snapshot.ctx,
        &compiler,
        config.build.batch_size,
        progress.as_ref(),
    )
    .await;
    report.record_conflicts(&conflicts, &snapshot.ctx.content_dir);

    if let Some(progress) = progress {
        progress.finish();
    }

    Ok((snapshot, report))
}

/// Rebuild what a single changed file affects.
///
/// `key` is root-relative. Pages depending on the file in either the
/// previous or the re-read graph are rebuilt, so dependents of a deleted
/// file are rebuilt too. `snapshot` is replaced by the re-read state.
pub async fn incremental_build<C: PageCompiler>(
    config: &SiteConfig,
    compiler: &C,
    snapshot: &mut Snapshot,
    key: &str,
) -> Result<BuildReport> {
    let ignored = config.excluded_keys();
    let scope = ChangeScope {
        content_dir: &snapshot.ctx.content_dir,
        ignored: &ignored,
    };

    match classify_change(key, &scope) {
        Change::Ignored => Ok(BuildReport::default()),
        Change::Asset(key) => {
            sync_asset(config, &key)?;
            Ok(BuildReport::default())
        }
        Change::Graph(key) => rebuild_dependents(config, compiler, snapshot, &key).await,
    }
}

async fn rebuild_dependents<C: PageCompiler>(
    config: &SiteConfig,
    compiler: &C,
    snapshot: &mut Snapshot,
    key: &str,
) -> Result<BuildReport> {
    let next = Snapshot::read(config)?;

    let (content_dir, index) = (&next.ctx.content_dir, &next.ctx.index);
    let mut pages = affected_pages(key, &next.graph, &next.tree, content_dir, index);
    for page in affected_pages(key, &snapshot.graph, &next.tree, content_dir, index) {
        if !pages.contains(&page) {
            pages.push(page);
        }
    }
    pages.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("rebuild"; "{} affects {} page(s)", key, pages.len());

    remove_stale_page(config, snapshot, &next, key)?;

    let conflicts: Vec<_> = collect_pages(&next.ctx.content_tree, index)
        .conflicts
        .into_iter()
        .filter(|c| pages.iter().any(|page| page.path == c.page.path))
        .collect();
    pages.retain(|page| !conflicts.iter().any(|c| c.page.path == page.path));

    let mut report = BuildReport::default();
    report.record_conflicts(&conflicts, content_dir);
    for page in &pages {
        if is_shutdown() {
            break;
        }
        let result = build_page(page, &next.ctx, compiler).await;
        report.record(page.key(&next.ctx.content_dir), result.map_err(|e| e.to_string()));
    }

    *snapshot = next;
    Ok(report)
}

// ============================================================================
// Page compilation
// ============================================================================

async fn compile_batches<C: PageCompiler>(
    pages: Vec<Page>,
    ctx: &Arc<CompileContext>,
    compiler: &Arc<C>,
    batch_size: usize,
    progress: Option<&ProgressLine>,
) -> BuildReport {
    let mut report = BuildReport::default();

    for batch in pages.chunks(batch_size.max(1)) {
        if is_shutdown() {
            break;
        }

        let mut tasks = JoinSet::new();
        let mut keys = FxHashMap::default();
        for page in batch {
            let key = page.key(&ctx.content_dir);
            let page = page.clone();
            let ctx = Arc::clone(ctx);
            let compiler = Arc::clone(compiler);
            let handle = tasks.spawn(async move {
                build_page(&page, &ctx, compiler.as_ref())
                    .await
                    .map_err(|e: PageError| e.to_string())
            });
            keys.insert(handle.id(), key);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(e) if e.is_panic() => (e.id(), Err("page build panicked".to_string())),
                Err(e) => (e.id(), Err(e.to_string())),
            };
            report.record(keys.remove(&id).unwrap_or_default(), result);
            if let Some(progress) = progress {
                progress.inc("pages");
            }
        }
    }

    report.failures.sort_by(|a, b| a.page.cmp(&b.page));
    report
}

/// Remove the output of a page that no longer exists (or became a layout).
fn remove_stale_page(
    config: &SiteConfig,
    previous: &Snapshot,
    next: &Snapshot,
    key: &str,
) -> Result<()> {
    let content_dir = &previous.ctx.content_dir;
    let index = &previous.ctx.index;
    let Some(page) = pages_for([key], &previous.tree, content_dir, index).pop() else {
        return Ok(());
    };
    if !pages_for([key], &next.tree, content_dir, index).is_empty() {
        return Ok(());
    }

    let target = route_to_build_path(&page.route(index));
    for rel in [&target.artifact_rel_path, &target.html_rel_path] {
        let path = config.build.output.join(rel);
        if path.is_file() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }
    if !target.dir.is_empty() {
        // Fails while other outputs live below this route.
        let _ = fs::remove_dir(config.build.output.join(&target.dir));
    }

    log!("build"; "removed {}", page.route(index));
    Ok(())
}

// ============================================================================
// Output directory and assets
// ============================================================================

/// Create the output directory (emptied first with `clean`) and its marker.
fn prepare_output(config: &SiteConfig) -> Result<()> {
    let output = &config.build.output;
    if config.build.clean && output.exists() {
        fs::remove_dir_all(output)
            .with_context(|| format!("Failed to clear output directory: {}", output.display()))?;
    }
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;
    fs::write(output.join(NOJEKYLL), "")
        .with_context(|| format!("Failed to write {NOJEKYLL}"))?;
    Ok(())
}

/// Every non-hidden file below the assets directory.
fn collect_assets(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<_> = WalkDir::new(dir)
        .skip_hidden(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .collect();
    files.sort();
    files
}

fn asset_destination(config: &SiteConfig, source: &Path) -> Option<PathBuf> {
    let rel = source.strip_prefix(&config.build.assets).ok()?;
    Some(config.build.output.join(ASSETS_OUTPUT_DIR).join(rel))
}

fn copy_asset(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::copy(source, dest).with_context(|| {
        format!(
            "Failed to copy asset {} to {}",
            source.display(),
            dest.display()
        )
    })?;
    Ok(())
}

fn copy_assets(
    config: &SiteConfig,
    assets: &[PathBuf],
    progress: Option<&ProgressLine>,
) -> Result<()> {
    assets.par_iter().try_for_each(|source| {
        if let Some(dest) = asset_destination(config, source) {
            copy_asset(source, &dest)?;
        }
        if let Some(progress) = progress {
            progress.inc("assets");
        }
        Ok(())
    })
}

/// Mirror one changed asset into the output, deleting it when it is gone.
fn sync_asset(config: &SiteConfig, key: &str) -> Result<()> {
    let source = key_to_path(key, &config.root);
    let Some(dest) = asset_destination(config, &source) else {
        debug!("watch"; "ignoring {}", key);
        return Ok(());
    };

    if source.is_file() {
        copy_asset(&source, &dest)?;
        debug!("asset"; "copied {}", key);
    } else if dest.is_file() {
        fs::remove_file(&dest).with_context(|| format!("Failed to remove {}", dest.display()))?;
        debug!("asset"; "removed {}", key);
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
