//! Development server.
//!
//! Serves the output directory over HTTP after a full build. With
//! `serve.watch`, a watcher thread rebuilds affected pages on change.

use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use crossbeam::channel;
use percent_encoding::percent_decode_str;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use super::{
    build::{full_build, runtime},
    watch::spawn_watcher,
};
use crate::{
    compiler::TypstCompiler,
    config::{ServeConfig, SiteConfig},
    core::{is_rebuilding, is_shutdown, register_server},
    log,
    utils::mime::{self, PLAIN},
};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Requests handled concurrently.
const REQUEST_THREADS: usize = 4;

/// Longest a request waits for a running rebuild.
const REBUILD_WAIT: Duration = Duration::from_secs(10);

/// `typage serve`: build, then serve until Ctrl+C.
pub fn serve_site(config: Arc<SiteConfig>) -> Result<()> {
    let compiler = Arc::new(TypstCompiler::from_config(&config)?);
    let runtime = runtime()?;

    let (snapshot, report) = runtime.block_on(full_build(&config, Arc::clone(&compiler), false))?;
    report.log();

    let (server, addr) = bind_with_retry(&config.serve)?;
    let server = Arc::new(server);
    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_server(Arc::clone(&server), shutdown_tx);
    log!("serve"; "http://{}", addr);

    let watcher = if config.serve.watch {
        Some(spawn_watcher(
            Arc::clone(&config),
            compiler,
            snapshot,
            runtime.handle().clone(),
            shutdown_rx,
        )?)
    } else {
        None
    };

    run_request_loop(&server, &config.build.output)?;
    wait_for_shutdown(watcher);
    Ok(())
}

/// Bind the first free port among the configured one and those above it.
fn bind_with_retry(serve: &ServeConfig) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for addr in serve.candidate_addrs(MAX_PORT_RETRIES) {
        match Server::http(addr) {
            Ok(server) => {
                if addr.port() != serve.port {
                    log!("serve"; "port {} in use, using {} instead", serve.port, addr.port());
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind {} from port {}: {}",
        serve.interface,
        serve.port,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

fn run_request_loop(server: &Server, output: &Path) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .build()
        .context("Failed to create request thread pool")?;

    for request in server.incoming_requests() {
        let output = output.to_path_buf();
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &output) {
                log!("serve"; "request error: {e:#}");
            }
        });
    }
    Ok(())
}

/// Wait for the watcher thread to stop (max 2 seconds).
fn wait_for_shutdown(handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else { return };

    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

fn handle_request(request: Request, output: &Path) -> Result<()> {
    if is_shutdown() {
        return send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec());
    }
    wait_for_rebuild();

    match resolve_path(request.url(), output) {
        Some(path) => respond_file(request, &path),
        None => send_body(request, 404, PLAIN, b"404 Not Found".to_vec()),
    }
}

/// Hold a request while the watcher rewrites pages, so it never sees a
/// half-written output.
fn wait_for_rebuild() {
    let start = std::time::Instant::now();
    while is_rebuilding() && start.elapsed() < REBUILD_WAIT {
        thread::sleep(Duration::from_millis(20));
    }
}

/// Resolve URL to filesystem path, handling index.html for directories
fn resolve_path(url: &str, serve_root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url);
    if clean.split('/').any(|segment| segment == "..") {
        return None;
    }

    // Canonicalize so symlinks cannot escape the served directory
    let canonical = serve_root.join(&clean).canonicalize().ok()?;
    let root = serve_root.canonicalize().ok()?;
    if !canonical.starts_with(&root) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }
    let index = canonical.join("index.html");
    index.is_file().then_some(index)
}

/// Decode, strip the query string and trim slashes.
fn normalize_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    decoded.trim_matches('/').to_string()
}

fn respond_file(request: Request, path: &Path) -> Result<()> {
    let content_type = mime::content_type(path);
    if request.method() == &Method::Head {
        let response = Response::empty(StatusCode(200))
            .with_header(header("Content-Type", content_type)?)
            .with_header(header("Cache-Control", "no-cache")?);
        request.respond(response)?;
        return Ok(());
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    send_body(request, 200, content_type, body)
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(header("Content-Type", content_type)?)
        .with_header(header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

fn header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key.as_bytes(), value.as_bytes())
        .map_err(|()| anyhow!("invalid header {key}: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("/blog/post/"), "blog/post");
        assert_eq!(normalize_url("/blog/my%20post/?v=2"), "blog/my post");
        assert_eq!(normalize_url("/"), "");
    }

    #[test]
    fn test_resolve_path() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("public");
        fs::create_dir_all(out.join("blog/post")).unwrap();
        fs::write(out.join("index.html"), "home").unwrap();
        fs::write(out.join("blog/post/index.html"), "post").unwrap();
        fs::write(out.join("blog/post/index.pdf"), "pdf").unwrap();
        fs::write(tmp.path().join("secret.txt"), "no").unwrap();

        let root = out.canonicalize().unwrap();
        assert_eq!(resolve_path("/", &out), Some(root.join("index.html")));
        assert_eq!(
            resolve_path("/blog/post/", &out),
            Some(root.join("blog/post/index.html"))
        );
        assert_eq!(
            resolve_path("/blog/post/index.pdf", &out),
            Some(root.join("blog/post/index.pdf"))
        );
        assert_eq!(resolve_path("/blog/", &out), None);
        assert_eq!(resolve_path("/../secret.txt", &out), None);
        assert_eq!(resolve_path("/%2E%2E/secret.txt", &out), None);
    }
}
