//! Live-reload broadcaster.
//!
//! Browsers open a WebSocket to the reload port (see `embed/livereload.js`).
//! After every successful rebuild the dev server broadcasts `reload` to all
//! of them.
//!
//! ```text
//! browser ──ws──► ReloadListener ──register──► ReloadChannel
//!                                                  │
//! rebuild ok ──────────────── broadcast("reload") ─┘ (dead sessions pruned)
//! ```

use crate::log;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{
    net::{IpAddr, SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};
use tungstenite::{Message, WebSocket};

/// Message that tells a page to reload itself.
pub const RELOAD_MESSAGE: &str = "reload";

/// How long a new connection may take to finish the WebSocket handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connected live-reload sessions.
#[derive(Default)]
pub struct ReloadChannel {
    sessions: Mutex<Vec<WebSocket<TcpStream>>>,
}

impl ReloadChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, session: WebSocket<TcpStream>) {
        self.sessions.lock().push(session);
    }

    /// Number of sessions still registered.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send `message` to every session, dropping the ones that fail.
    /// Returns how many sessions received it.
    pub fn broadcast(&self, message: &str) -> usize {
        let mut sessions = self.sessions.lock();
        sessions.retain_mut(|session| session.send(Message::text(message.to_owned())).is_ok());
        sessions.len()
    }

    /// Close every session.
    pub fn close_all(&self) {
        for mut session in self.sessions.lock().drain(..) {
            _ = session.close(None);
            _ = session.flush();
        }
    }
}

/// Accept loop for reload connections, running on its own thread.
pub struct ReloadListener {
    addr: SocketAddr,
    stopped: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ReloadListener {
    /// Bind `interface:port` (retrying on higher ports when taken) and start
    /// registering sessions into `channel`.
    pub fn start(
        interface: IpAddr,
        port: u16,
        retries: u16,
        channel: Arc<ReloadChannel>,
    ) -> Result<Self> {
        let listener = try_bind(interface, port, retries)?;
        let addr = listener.local_addr()?;
        let stopped = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&stopped);
        let thread = thread::Builder::new()
            .name("reload".into())
            .spawn(move || accept_loop(&listener, &flag, &channel))
            .context("Failed to spawn reload listener")?;

        Ok(Self {
            addr,
            stopped,
            thread: Some(thread),
        })
    }

    /// Port actually bound.
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop accepting and wait for the listener thread.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stopped.store(true, Ordering::SeqCst);
        // wake the blocking accept
        let wake = match self.addr.ip() {
            ip if ip.is_unspecified() => SocketAddr::new([127, 0, 0, 1].into(), self.addr.port()),
            _ => self.addr,
        };
        _ = TcpStream::connect_timeout(&wake, Duration::from_secs(1));
        _ = thread.join();
    }
}

impl Drop for ReloadListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn try_bind(interface: IpAddr, base_port: u16, retries: u16) -> Result<TcpListener> {
    let mut last_error = None;
    for offset in 0..retries.max(1) {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                if offset > 0 {
                    log!("reload"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok(listener);
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow::anyhow!(
        "Failed to bind reload port after {} attempts (from {}): {}",
        retries.max(1),
        base_port,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

fn accept_loop(listener: &TcpListener, stopped: &AtomicBool, channel: &ReloadChannel) {
    for stream in listener.incoming() {
        if stopped.load(Ordering::SeqCst) {
            break;
        }
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log!("reload"; "accept failed: {e}");
                continue;
            }
        };
        if let Err(e) = handshake(stream).map(|session| channel.register(session)) {
            log!("reload"; "{e:#}");
        }
    }
}

fn handshake(stream: TcpStream) -> Result<WebSocket<TcpStream>> {
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    let session = tungstenite::accept(stream).map_err(|e| anyhow::anyhow!("handshake failed: {e}"))?;
    session.get_ref().set_read_timeout(None)?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

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

    fn start() -> (Arc<ReloadChannel>, ReloadListener) {
        let channel = ReloadChannel::new();
        let listener =
            ReloadListener::start([127, 0, 0, 1].into(), 0, 1, Arc::clone(&channel)).unwrap();
        (channel, listener)
    }

    #[test]
    fn test_broadcast_reaches_sessions() {
        let (channel, listener) = start();
        let url = format!("ws://127.0.0.1:{}", listener.port());
        let (mut a, _) = tungstenite::connect(url.as_str()).unwrap();
        let (mut b, _) = tungstenite::connect(url.as_str()).unwrap();

        assert!(wait_until(|| channel.len() == 2));
        assert_eq!(channel.broadcast(RELOAD_MESSAGE), 2);

        for client in [&mut a, &mut b] {
            let message = client.read().unwrap();
            assert_eq!(message.into_text().unwrap().as_str(), "reload");
        }
    }

    #[test]
    fn test_closed_sessions_are_pruned() {
        let (channel, listener) = start();
        let url = format!("ws://127.0.0.1:{}", listener.port());
        let (client, _) = tungstenite::connect(url.as_str()).unwrap();
        assert!(wait_until(|| channel.len() == 1));

        drop(client);
        // the first write after a peer disconnect may still succeed
        assert!(wait_until(|| channel.broadcast(RELOAD_MESSAGE) == 0));
        assert!(channel.is_empty());
    }

    #[test]
    fn test_stop_unblocks_listener() {
        let (channel, mut listener) = start();
        let port = listener.port();
        listener.stop();
        listener.stop();
        assert!(tungstenite::connect(format!("ws://127.0.0.1:{port}")).is_err());
        assert!(channel.is_empty());
    }

    #[test]
    fn test_port_retry() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let channel = ReloadChannel::new();
        match ReloadListener::start([127, 0, 0, 1].into(), port, 10, channel) {
            Ok(listener) => assert!(listener.port() > port),
            // every following port happened to be taken as well
            Err(e) => assert!(e.to_string().contains("Failed to bind")),
        }
    }

    #[test]
    fn test_broadcast_without_sessions() {
        let channel = ReloadChannel::new();
        assert_eq!(channel.broadcast(RELOAD_MESSAGE), 0);
        channel.close_all();
    }
}
