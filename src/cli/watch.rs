//! File watching for `serve`.
//!
//! ```text
//! notify -> Debouncer (300ms quiet period) -> incremental_build per path
//! ```
//!
//! Runs on its own thread; compilation is driven on the caller's tokio
//! runtime through a [`Handle`].

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use notify::{EventKind, RecursiveMode, Watcher, event::ModifyKind};
use rustc_hash::FxHashSet;
use tokio::runtime::Handle;

use super::build::{BuildReport, Snapshot, incremental_build};
use crate::{
    compiler::PageCompiler,
    config::SiteConfig,
    core::{begin_rebuild, is_shutdown},
    debug, log,
    logger::{status_error, status_success, status_unchanged, status_warning},
    utils::path::normalize_path,
};

const DEBOUNCE_MS: u64 = 300;

/// Collects changed paths until events stop arriving for [`DEBOUNCE_MS`].
struct Debouncer {
    changes: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            changes: FxHashSet::default(),
            last_event: None,
        }
    }

    fn add_event(&mut self, event: &notify::Event) {
        match event.kind {
            EventKind::Create(_) | EventKind::Remove(_) => {}
            // mtime/chmod noise would rebuild endlessly
            EventKind::Modify(ModifyKind::Metadata(_)) => return,
            EventKind::Modify(_) => {}
            _ => return,
        }

        debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);
        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            self.changes.insert(normalize_path(path));
            self.last_event = Some(Instant::now());
        }
    }

    fn is_ready(&self) -> bool {
        self.last_event
            .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
            && !self.changes.is_empty()
    }

    /// Changed paths in sorted order, once the quiet period has passed.
    fn take_if_ready(&mut self) -> Option<Vec<PathBuf>> {
        if !self.is_ready() {
            return None;
        }
        self.last_event = None;
        let mut paths: Vec<_> = std::mem::take(&mut self.changes).into_iter().collect();
        paths.sort();
        Some(paths)
    }

    fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(3600);
        };
        Duration::from_millis(DEBOUNCE_MS)
            .saturating_sub(last_event.elapsed())
            .max(Duration::from_millis(1))
    }
}

/// Editor swap and backup files.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Start watching the project root.
///
/// The watcher is attached before this returns, so no change made after
/// the initial build is missed. The thread exits on `shutdown_rx`.
pub fn spawn_watcher<C: PageCompiler>(
    config: Arc<SiteConfig>,
    compiler: Arc<C>,
    snapshot: Snapshot,
    runtime: Handle,
    shutdown_rx: Receiver<()>,
) -> Result<JoinHandle<()>> {
    let (event_tx, event_rx) = channel::unbounded();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = event_tx.send(res);
    })
    .context("Failed to create file watcher")?;
    watcher
        .watch(&config.root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", config.root.display()))?;
    log!("watch"; "watching {}", config.root.display());

    Ok(thread::spawn(move || {
        // Dropping the watcher stops event delivery.
        let _watcher = watcher;
        let mut state = WatchLoop {
            config,
            compiler,
            snapshot,
            runtime,
        };
        state.run(&event_rx, &shutdown_rx);
    }))
}

struct WatchLoop<C> {
    config: Arc<SiteConfig>,
    compiler: Arc<C>,
    snapshot: Snapshot,
    runtime: Handle,
}

impl<C: PageCompiler> WatchLoop<C> {
    fn run(
        &mut self,
        event_rx: &Receiver<notify::Result<notify::Event>>,
        shutdown_rx: &Receiver<()>,
    ) {
        let mut debouncer = Debouncer::new();

        loop {
            if is_shutdown() || shutdown_rx.try_recv().is_ok() {
                break;
            }

            match event_rx.recv_timeout(debouncer.sleep_duration()) {
                Ok(Ok(event)) => debouncer.add_event(&event),
                Ok(Err(e)) => status_warning(&format!("watch error: {e}")),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if let Some(paths) = debouncer.take_if_ready() {
                self.rebuild(&paths);
            }
        }
    }

    fn rebuild(&mut self, paths: &[PathBuf]) {
        let _guard = begin_rebuild();
        let mut report = BuildReport::default();
        let mut changed = Vec::new();

        for path in paths {
            let Some(key) = self.config.key_of(path) else {
                continue;
            };
            let result = self.runtime.block_on(incremental_build(
                &self.config,
                self.compiler.as_ref(),
                &mut self.snapshot,
                &key,
            ));
            match result {
                Ok(partial) => report.merge(partial),
                Err(e) => {
                    status_error(&format!("rebuild failed: {key}"), &format!("{e:#}"));
                    return;
                }
            }
            changed.push(key);
        }

        report_status(&changed, &report);
    }
}

fn report_status(changed: &[String], report: &BuildReport) {
    if changed.is_empty() {
        return;
    }
    let summary = changed.join(", ");

    if !report.is_success() {
        let detail = report
            .failures
            .iter()
            .map(|f| format!("{}\n{}", f.page, f.message))
            .collect::<Vec<_>>()
            .join("\n");
        status_error(
            &format!("{summary}: {} failed", report.failures.len()),
            &detail,
        );
    } else if report.built == 0 {
        status_unchanged(&summary);
    } else {
        status_success(&format!("{summary}: rebuilt {} page(s)", report.built));
    }
}
