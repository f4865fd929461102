//! TCP listener and accept loop.
//!
//! A [`Listener`] binds one endpoint and accepts Console connections on a
//! dedicated thread.  For each accepted socket it:
//!
//! 1. registers a [`ConnectionHandle`] so teardown can reach the socket;
//! 2. starts a [`Connection`] on its own thread, sharing the listener's
//!    [`ButtonRegistry`] and callbacks.  The connection thread emits
//!    `connect` before its first read.
//!
//! Host callbacks therefore never run on the accept thread, and a callback
//! may stop the listener that invoked it.
//!
//! # Lifecycle
//!
//! ```text
//! Starting ──► Listening ──► Stopping ──► Stopped
//! ```
//!
//! [`Listener::stop`] clears the running flag and joins the accept thread.
//! Connections already in flight are not touched: each one exits when its
//! peer closes.  [`Listener::disconnect_all`] is the separate, forceful
//! teardown used when the whole host goes away.
//!
//! # Accept polling
//!
//! The listening socket is non-blocking and the accept thread sleeps for
//! [`ACCEPT_POLL_INTERVAL`] between empty polls, checking the running flag
//! each time.  This bounds how long `stop` waits for the thread to notice.
//!
//! # What is non-blocking accept? (for beginners)
//!
//! A plain `accept()` call parks the thread until a client arrives, and
//! nothing short of closing the socket from another thread wakes it up.
//! Switching the socket to non-blocking mode makes `accept()` return
//! immediately with `WouldBlock` when nobody is waiting.  The loop then
//! sleeps briefly and checks its `running` flag, so a `stop` request is
//! noticed within one poll interval.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tourbox_core::{ButtonRegistry, InputDecoder};
use tracing::{debug, error, info, warn};

use super::connection::{Connection, ConnectionHandle};
use super::NetworkError;
use crate::application::{HostCallbacks, PeerInfo};

/// Port the Console connects to by default.
pub const DEFAULT_PORT: u16 = 50500;

/// Loopback bind address used when the host does not pass one.
pub const DEFAULT_BIND_IP: &str = "127.0.0.1";

/// How long the accept thread sleeps when no connection is pending.
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Where a listener is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Starting,
    Listening,
    Stopping,
    Stopped,
}

/// Live connections of one listener, keyed by an internal sequence number.
type LiveConnections = Arc<Mutex<HashMap<u64, ConnectionHandle>>>;

/// Owner of one bound TCP endpoint and its accept thread.
pub struct Listener {
    local_addr: SocketAddr,
    state: ListenerState,
    running: Arc<AtomicBool>,
    registry: Arc<ButtonRegistry>,
    connections: LiveConnections,
    accept_thread: Option<JoinHandle<()>>,
}

impl Listener {
    /// Binds `addr`, starts listening and spawns the accept thread.
    ///
    /// Port 0 asks the OS for a free port; read it back with
    /// [`Listener::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindFailed`] if the endpoint cannot be
    /// acquired, [`NetworkError::Configure`] if it cannot be made
    /// non-blocking and [`NetworkError::Spawn`] if the thread cannot start.
    pub fn bind(addr: SocketAddr, callbacks: HostCallbacks) -> Result<Self, NetworkError> {
        debug!("starting TourBox server on {addr}");

        let socket =
            TcpListener::bind(addr).map_err(|source| NetworkError::BindFailed { addr, source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| NetworkError::BindFailed { addr, source })?;
        socket
            .set_nonblocking(true)
            .map_err(|source| NetworkError::Configure { addr, source })?;

        let mut listener = Self {
            local_addr,
            state: ListenerState::Starting,
            running: Arc::new(AtomicBool::new(true)),
            registry: Arc::new(ButtonRegistry::new()),
            connections: Arc::new(Mutex::new(HashMap::new())),
            accept_thread: None,
        };

        let ctx = AcceptContext {
            local_addr,
            running: Arc::clone(&listener.running),
            registry: Arc::clone(&listener.registry),
            connections: Arc::clone(&listener.connections),
            callbacks,
            next_connection: AtomicU64::new(0),
        };

        let thread = std::thread::Builder::new()
            .name(format!("tourbox-accept-{}", local_addr.port()))
            .spawn(move || accept_loop(socket, ctx))
            .map_err(NetworkError::Spawn)?;

        listener.accept_thread = Some(thread);
        listener.state = ListenerState::Listening;
        info!("server listening on {local_addr}");
        Ok(listener)
    }

    /// The bound address, with the OS-assigned port if port 0 was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The held-button registry shared by this listener's connections.
    pub fn registry(&self) -> &Arc<ButtonRegistry> {
        &self.registry
    }

    /// Number of connections whose receive loop is still running.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Stops accepting and joins the accept thread, which drops this
    /// listener's callback references.  In-flight connections keep running.
    ///
    /// Calling `stop` on a stopped listener does nothing.  When called from
    /// the accept thread itself the join is skipped; the thread exits on its
    /// next poll.
    pub fn stop(&mut self) {
        if self.state == ListenerState::Stopped {
            return;
        }
        info!("stopping TourBox server on {}", self.local_addr);
        self.state = ListenerState::Stopping;
        self.running.store(false, Ordering::Release);

        if let Some(thread) = self.accept_thread.take() {
            if thread.thread().id() == std::thread::current().id() {
                debug!("stop called on accept thread for {}", self.local_addr);
            } else if thread.join().is_err() {
                error!("accept thread for {} panicked", self.local_addr);
            }
        }

        self.state = ListenerState::Stopped;
    }

    /// Forcefully ends every in-flight connection.  Each one still emits its
    /// `disconnect`.  Returns how many connections were signalled.
    pub fn disconnect_all(&self) -> usize {
        let connections = self.connections.lock();
        for handle in connections.values() {
            debug!("force-closing connection from {}", handle.peer());
            handle.stop();
        }
        connections.len()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("local_addr", &self.local_addr)
            .field("state", &self.state)
            .field("connections", &self.connection_count())
            .finish()
    }
}

// ── Accept thread ─────────────────────────────────────────────────────────────

/// Everything the accept thread needs, moved onto it at spawn.
struct AcceptContext {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    registry: Arc<ButtonRegistry>,
    connections: LiveConnections,
    callbacks: HostCallbacks,
    next_connection: AtomicU64,
}

fn accept_loop(socket: TcpListener, ctx: AcceptContext) {
    while ctx.running.load(Ordering::Acquire) {
        match socket.accept() {
            Ok((stream, addr)) => ctx.start_connection(stream, addr),
            Err(e) if is_would_block(&e) => std::thread::sleep(ACCEPT_POLL_INTERVAL),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if ctx.running.load(Ordering::Acquire) {
                    warn!("accept failed on {}: {e}", ctx.local_addr);
                    std::thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }
    }
    info!("accept loop on {} stopped", ctx.local_addr);
}

impl AcceptContext {
    fn start_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let peer = PeerInfo::from(addr);

        // Accepted sockets may inherit non-blocking mode from the listener.
        if let Err(e) = stream.set_nonblocking(false) {
            warn!("dropping connection from {peer}: {e}");
            return;
        }

        let connection = Connection::new(
            stream,
            peer,
            InputDecoder::new(Arc::clone(&self.registry)),
            self.callbacks.clone(),
        );

        // Registered before the thread starts, so teardown reaches every
        // connection that has emitted `connect`.
        let id = self.next_connection.fetch_add(1, Ordering::Relaxed);
        match connection.handle() {
            Ok(handle) => {
                self.connections.lock().insert(id, handle);
            }
            Err(e) => warn!("connection {peer} cannot be stopped on teardown: {e}"),
        }

        let connections = Arc::clone(&self.connections);
        let spawned = std::thread::Builder::new()
            .name(format!("tourbox-conn-{peer}"))
            .spawn(move || {
                let exit = connection.run();
                connections.lock().remove(&id);
                debug!("connection {peer} exited: {exit:?}");
            });

        if let Err(e) = spawned {
            // The connection was dropped with the closure before emitting
            // `connect`, so no `disconnect` is owed.
            error!("failed to spawn connection thread for {peer}: {e}");
            self.connections.lock().remove(&id);
        }
    }
}

/// Returns `true` for the "no pending connection" result of a non-blocking
/// accept.
fn is_would_block(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use crate::application::{EventSink, HostEvent};
    use crate::infrastructure::host_bridge::mock::RecordingSink;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    fn recording_listener() -> (Listener, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let events: Arc<dyn EventSink> = sink.clone();
        let listener = Listener::bind(loopback(), HostCallbacks::new(events)).unwrap();
        (listener, sink)
    }

    #[test]
    fn test_is_would_block_recognises_would_block() {
        let e = io::Error::new(io::ErrorKind::WouldBlock, "would block");
        assert!(is_would_block(&e));
    }

    #[test]
    fn test_is_would_block_returns_false_for_other_errors() {
        let e = io::Error::new(io::ErrorKind::ConnectionAborted, "aborted");
        assert!(!is_would_block(&e));
    }

    #[test]
    fn test_bind_assigns_port_and_listens() {
        let (listener, _sink) = recording_listener();
        assert_ne!(listener.local_addr().port(), 0);
        assert_eq!(listener.state(), ListenerState::Listening);
        assert!(listener.is_running());
    }

    #[test]
    fn test_bind_fails_on_port_in_use() {
        let (first, _sink) = recording_listener();
        let result = Listener::bind(
            first.local_addr(),
            HostCallbacks::new(Arc::new(|_: HostEvent| {})),
        );
        assert!(matches!(result, Err(NetworkError::BindFailed { .. })));
    }

    #[test]
    fn test_stop_is_prompt_and_idempotent() {
        let (mut listener, _sink) = recording_listener();
        let started = Instant::now();
        listener.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(listener.state(), ListenerState::Stopped);
        assert!(!listener.is_running());
        listener.stop();
        assert_eq!(listener.state(), ListenerState::Stopped);
    }

    #[test]
    fn test_stopped_listener_refuses_connections() {
        let (mut listener, _sink) = recording_listener();
        let addr = listener.local_addr();
        listener.stop();
        drop(listener);
        assert!(TcpStream::connect_timeout(&addr, Duration::from_millis(500)).is_err());
    }

    #[test]
    fn test_disconnect_all_ends_in_flight_connections() {
        let (listener, sink) = recording_listener();
        let _client = TcpStream::connect(listener.local_addr()).unwrap();
        sink.wait_for_events(1, Duration::from_secs(5));

        // `connect` is emitted after the handle is registered.
        assert_eq!(listener.connection_count(), 1);
        assert_eq!(listener.disconnect_all(), 1);

        let events = sink.wait_for_events(2, Duration::from_secs(5));
        assert_eq!(events[0].name(), "connect");
        assert_eq!(events[1].name(), "disconnect");
        assert_eq!(events[0].peer(), events[1].peer());
    }
}
