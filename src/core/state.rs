//! Process state for serve mode.
//!
//! - `SHUTDOWN`: Ctrl+C received
//! - `REBUILDING`: a watch rebuild is running

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tiny_http::Server;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// A rebuild triggered by the watcher is in progress
static REBUILDING: AtomicBool = AtomicBool::new(false);

/// HTTP server reference for graceful shutdown
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Shutdown signal sender for the watcher loop
static SHUTDOWN_TX: OnceLock<crossbeam::channel::Sender<()>> = OnceLock::new();

/// Setup the global Ctrl+C handler. Call once at program start
///
/// - Before `register_server()`: exit immediately
/// - After `register_server()`: unblock the server and stop the watcher
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);

        if let Some(tx) = SHUTDOWN_TX.get() {
            let _ = tx.send(());
        }

        if let Some(server) = SERVER.get() {
            crate::log!("serve"; "shutting down...");
            server.unblock();
        } else {
            std::process::exit(0);
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the HTTP server for graceful shutdown
pub fn register_server(server: Arc<Server>, shutdown_tx: crossbeam::channel::Sender<()>) {
    let _ = SERVER.set(server);
    let _ = SHUTDOWN_TX.set(shutdown_tx);
}

pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

pub fn is_rebuilding() -> bool {
    REBUILDING.load(Ordering::Acquire)
}

/// Mark a rebuild as running until the returned guard is dropped.
pub fn begin_rebuild() -> RebuildGuard {
    REBUILDING.store(true, Ordering::Release);
    RebuildGuard
}

pub struct RebuildGuard;

impl Drop for RebuildGuard {
    fn drop(&mut self) {
        REBUILDING.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_guard() {
        {
            let _guard = begin_rebuild();
            assert!(is_rebuilding());
        }
        assert!(!is_rebuilding());
    }

    #[test]
    fn test_not_shutdown_by_default() {
        assert!(!is_shutdown());
    }
}
