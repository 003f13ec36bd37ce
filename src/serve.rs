//! Development server with live reload support.
//!
//! `sprig dev` ties the pieces together:
//!
//! - Static file serving from the build output directory (`tiny_http`)
//! - WebSocket live reload (see [`crate::reload`])
//! - File watching with single-flight rebuilds (see [`crate::watch`])
//! - Graceful shutdown on Ctrl+C
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   ┌──────────────────┐   ┌─────────────────┐
//! │   Main Thread   │   │  Watcher Thread  │   │ Reload Listener │
//! │  (HTTP Server)  │   │  (File Monitor)  │   │  (WebSocket)    │
//! └────────┬────────┘   └────────┬─────────┘   └────────┬────────┘
//!          │                     │                      │
//!          ▼                     ▼                      ▼
//!    Serve output tree     BuildGuard::run         ReloadChannel
//!                          build_site(dev) ──ok──► broadcast("reload")
//! ```

use crate::{
    build::build_site,
    compiler::Mode,
    config::ConfigHandle,
    log,
    logger::WatchStatus,
    reload::{RELOAD_MESSAGE, ReloadChannel, ReloadListener},
    watch::{BuildGuard, WatchTargets, watch},
};
use anyhow::{Context, Result, anyhow};
use parking_lot::Mutex;
use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

/// Page served with a 404 status when nothing matches.
const NOT_FOUND_PAGE: &str = "404.html";

// ============================================================================
// Server Entry Point
// ============================================================================

/// State shared between the HTTP loop and watcher-triggered rebuilds.
struct DevSite {
    config: Arc<ConfigHandle>,
    channel: Arc<ReloadChannel>,
    reload_port: u16,
    guard: BuildGuard,
    status: Mutex<WatchStatus>,
}

impl DevSite {
    const fn mode(&self) -> Mode {
        Mode::Development {
            reload_port: self.reload_port,
        }
    }

    /// One watcher-triggered pass: pick up config edits, rebuild, reload
    /// browsers. Failures are reported and the server keeps running.
    fn rebuild(&self) {
        match self.config.reload() {
            Ok(true) => log!("watch"; "config reloaded"),
            Ok(false) => {}
            Err(e) => log!("error"; "config reload failed, keeping previous config: {e:#}"),
        }

        let config = self.config.get();
        let result = build_site(&config, self.mode());

        let mut status = self.status.lock();
        match result {
            Ok(report) => {
                let sessions = self.channel.broadcast(RELOAD_MESSAGE);
                status.success(&format!(
                    "rebuilt in {}ms, reloaded {} {}",
                    report.elapsed.as_millis(),
                    sessions,
                    if sessions == 1 { "page" } else { "pages" }
                ));
            }
            Err(e) => status.error("build failed", &format!("{e:#}")),
        }
    }
}

/// Build in development mode, then serve and rebuild on change until Ctrl+C.
///
/// This function:
/// 1. Binds the reload listener, so pages know the port it actually got
/// 2. Runs the initial build
/// 3. Binds the HTTP server (with auto-retry on port conflict)
/// 4. Starts the watcher and enters the request loop
pub fn serve_site(config: Arc<ConfigHandle>) -> Result<()> {
    let initial = config.get();
    let interface: IpAddr = initial
        .serve
        .interface
        .parse()
        .with_context(|| format!("invalid interface `{}`", initial.serve.interface))?;

    let channel = ReloadChannel::new();
    let mut listener = ReloadListener::start(
        interface,
        initial.serve.reload_port,
        MAX_PORT_RETRIES,
        Arc::clone(&channel),
    )?;

    let dev = Arc::new(DevSite {
        config: Arc::clone(&config),
        channel: Arc::clone(&channel),
        reload_port: listener.port(),
        guard: BuildGuard::new(),
        status: Mutex::new(WatchStatus::new()),
    });

    // A broken initial build still serves, so the next save can fix it.
    if let Err(e) = build_site(&initial, dev.mode()) {
        log!("error"; "{e:#}");
    }

    let (server, addr) = try_bind_port(interface, initial.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    let rebuilds = Arc::clone(&dev);
    let root = initial.root.clone();
    let mut watcher = watch(
        WatchTargets::for_site(&initial),
        Duration::from_millis(initial.serve.debounce_ms),
        move |paths| {
            log!("watch"; "{}", describe_changes(&paths, &root));
            if rebuilds.guard.is_running() {
                log!("watch"; "build in progress, queued");
            }
            let dev = Arc::clone(&rebuilds);
            thread::spawn(move || dev.guard.run(|| dev.rebuild()));
        },
    )?;

    log!("serve"; "http://{}", addr);
    log!("reload"; "ws://{}:{}", addr.ip(), dev.reload_port);

    // Handle requests in main thread (blocks until Ctrl+C)
    for request in server.incoming_requests() {
        // Output dir may change with a config reload
        let output = config.get().build.output.clone();
        if let Err(e) = handle_request(request, &output) {
            log!("serve"; "request error: {e}");
        }
    }

    watcher.stop();
    listener.stop();
    if !channel.is_empty() {
        log!("reload"; "closing {} sessions", channel.len());
    }
    channel.close_all();
    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let max_retries = max_retries.max(1);
    let mut last_error = String::new();

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match Server::http(SocketAddr::new(interface, port)) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                let addr = server
                    .server_addr()
                    .to_ip()
                    .unwrap_or_else(|| SocketAddr::new(interface, port));
                return Ok((server, addr));
            }
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries - 1),
        last_error
    ))
}

/// One-line summary of a batch of changed paths.
fn describe_changes(paths: &[PathBuf], root: &Path) -> String {
    match paths {
        [] => "no changes".into(),
        [path] => {
            let shown = path.strip_prefix(root).unwrap_or(path);
            format!("{} changed", shown.display())
        }
        _ => format!("{} files changed", paths.len()),
    }
}

// ============================================================================
// Request Handling
// ============================================================================

/// What a request URL maps to in the output tree.
#[derive(Debug, PartialEq, Eq)]
enum Target {
    Found(PathBuf),
    /// Nothing matched; carries the site's own 404 page if it has one.
    NotFound(Option<PathBuf>),
}

/// Map a request URL onto the output tree.
///
/// Resolution order:
/// 1. Exact file match
/// 2. Directory with `index.html`
/// 3. Clean URL: `/contact` → `contact.html`
/// 4. `404.html`, served with a 404 status
fn resolve(root: &Path, url: &str) -> Target {
    let not_found = || {
        let page = root.join(NOT_FOUND_PAGE);
        Target::NotFound(page.is_file().then_some(page))
    };

    // Strip query string and fragment (e.g., ?t=123456) before decoding
    let raw = url.split(['?', '#']).next().unwrap_or_default();
    let Ok(decoded) = urlencoding::decode(raw) else {
        return not_found();
    };
    let request_path = decoded.trim_matches('/');

    let relative = Path::new(request_path);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return not_found();
    }

    let local_path = root.join(relative);
    if local_path.is_file() {
        return Target::Found(local_path);
    }

    let index = local_path.join("index.html");
    if local_path.is_dir() && index.is_file() {
        return Target::Found(index);
    }

    if !request_path.is_empty() {
        let clean = root.join(format!("{request_path}.html"));
        if clean.is_file() {
            return Target::Found(clean);
        }
    }

    not_found()
}

/// Handle a single HTTP request against the output tree at `root`.
fn handle_request(request: Request, root: &Path) -> Result<()> {
    match resolve(root, request.url()) {
        Target::Found(path) => serve_file(request, &path, StatusCode(200)),
        Target::NotFound(Some(page)) => serve_file(request, &page, StatusCode(404)),
        Target::NotFound(None) => serve_not_found(request),
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name, value).map_err(|()| anyhow!("invalid header `{name}: {value}`"))
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path, status: StatusCode) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let response = Response::from_data(content)
        .with_status_code(status)
        .with_header(header("Content-Type", guess_content_type(path))?)
        .with_header(header("Cache-Control", "no-store")?);

    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::from_string("404 Not Found")
        .with_status_code(StatusCode(404))
        .with_header(header("Content-Type", "text/plain; charset=utf-8")?);
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json" | "webmanifest") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",

        // Default binary
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::{Read, Write},
        net::TcpStream,
        time::Instant,
    };
    use tempfile::{TempDir, tempdir};
    use tungstenite::stream::MaybeTlsStream;

    fn site() -> TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("posts")).unwrap();
        fs::write(dir.path().join("index.html"), "<p>home</p>").unwrap();
        fs::write(dir.path().join("contact.html"), "<p>contact</p>").unwrap();
        fs::write(dir.path().join("posts/hello world.html"), "<p>post</p>").unwrap();
        fs::write(dir.path().join("index.css"), "body{}").unwrap();
        dir
    }

    #[test]
    fn test_resolve_order() {
        let dir = site();
        let root = dir.path();

        assert_eq!(resolve(root, "/"), Target::Found(root.join("index.html")));
        assert_eq!(resolve(root, ""), Target::Found(root.join("index.html")));
        assert_eq!(resolve(root, "/index.css"), Target::Found(root.join("index.css")));
        assert_eq!(resolve(root, "/contact"), Target::Found(root.join("contact.html")));
        assert_eq!(resolve(root, "/contact/"), Target::Found(root.join("contact.html")));
        assert_eq!(
            resolve(root, "/contact.html"),
            Target::Found(root.join("contact.html"))
        );
    }

    #[test]
    fn test_resolve_decodes_and_strips_query() {
        let dir = site();
        let root = dir.path();

        assert_eq!(
            resolve(root, "/posts/hello%20world?t=123"),
            Target::Found(root.join("posts/hello world.html"))
        );
        assert_eq!(
            resolve(root, "/index.css?v=2#top"),
            Target::Found(root.join("index.css"))
        );
    }

    #[test]
    fn test_resolve_not_found() {
        let dir = site();
        let root = dir.path();

        assert_eq!(resolve(root, "/missing"), Target::NotFound(None));
        // directory without an index
        assert_eq!(resolve(root, "/posts"), Target::NotFound(None));

        fs::write(root.join("404.html"), "<p>lost</p>").unwrap();
        assert_eq!(
            resolve(root, "/missing"),
            Target::NotFound(Some(root.join("404.html")))
        );
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = site();
        let root = dir.path().join("posts");

        assert_eq!(resolve(&root, "/../index.html"), Target::NotFound(None));
        assert_eq!(resolve(&root, "/%2e%2e/contact.html"), Target::NotFound(None));
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a.html")), "text/html; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a.css")), "text/css; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a.woff2")), "font/woff2");
        assert_eq!(guess_content_type(Path::new("robots")), "application/octet-stream");
    }

    #[test]
    fn test_describe_changes() {
        let root = Path::new("/site");
        assert_eq!(
            describe_changes(&[PathBuf::from("/site/src/index.tsx")], root),
            "src/index.tsx changed"
        );
        assert_eq!(
            describe_changes(&[PathBuf::from("/a"), PathBuf::from("/b")], root),
            "2 files changed"
        );
    }

    fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(
            stream,
            "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
        )
        .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_http_responses() {
        let dir = site();
        fs::write(dir.path().join("404.html"), "<p>lost</p>").unwrap();
        let root = dir.path().to_path_buf();

        let (server, addr) = try_bind_port([127, 0, 0, 1].into(), 0, 1).unwrap();
        assert_ne!(addr.port(), 0);
        let worker = thread::spawn(move || {
            for _ in 0..2 {
                let request = server.recv().unwrap();
                handle_request(request, &root).unwrap();
            }
        });

        let ok = get(addr, "/contact");
        assert!(ok.starts_with("HTTP/1.1 200"));
        assert!(ok.contains("text/html; charset=utf-8"));
        assert!(ok.ends_with("<p>contact</p>"));

        let missing = get(addr, "/nope");
        assert!(missing.starts_with("HTTP/1.1 404"));
        assert!(missing.ends_with("<p>lost</p>"));

        worker.join().unwrap();
    }

    const LAYOUT: &str = r#"export default function Layout({ body }) {
  return <html><body>{body}</body></html>
}
"#;

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_rebuild_reloads_only_after_success() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("+layout.tsx"), LAYOUT).unwrap();
        fs::write(src.join("index.tsx"), "export default () => <p>first</p>").unwrap();

        let config = Arc::new(ConfigHandle::load(dir.path(), Path::new("sprig.toml")).unwrap());
        let channel = ReloadChannel::new();
        let listener =
            ReloadListener::start([127, 0, 0, 1].into(), 0, 1, Arc::clone(&channel)).unwrap();
        let dev = DevSite {
            config: Arc::clone(&config),
            channel: Arc::clone(&channel),
            reload_port: listener.port(),
            guard: BuildGuard::new(),
            status: Mutex::new(WatchStatus::new()),
        };

        let url = format!("ws://127.0.0.1:{}", listener.port());
        let (mut client, _) = tungstenite::connect(url.as_str()).unwrap();
        if let MaybeTlsStream::Plain(stream) = client.get_mut() {
            stream.set_read_timeout(Some(Duration::from_millis(300))).unwrap();
        }
        assert!(wait_until(|| channel.len() == 1));

        let index = config.get().build.output.join("index.html");
        dev.rebuild();
        assert_eq!(client.read().unwrap().into_text().unwrap().as_str(), RELOAD_MESSAGE);
        assert!(fs::read_to_string(&index).unwrap().contains("<p>first</p>"));

        // a broken page keeps the previous output and reloads nobody
        fs::write(src.join("index.tsx"), "export default () => <p>broken").unwrap();
        dev.rebuild();
        assert!(client.read().is_err());
        assert!(fs::read_to_string(&index).unwrap().contains("<p>first</p>"));

        fs::write(src.join("index.tsx"), "export default () => <p>second</p>").unwrap();
        assert!(dev.guard.run(|| dev.rebuild()));
        assert_eq!(client.read().unwrap().into_text().unwrap().as_str(), RELOAD_MESSAGE);
        assert!(fs::read_to_string(&index).unwrap().contains("<p>second</p>"));
    }
}
