//! One accepted Console connection.
//!
//! A [`Connection`] owns its socket and runs a blocking receive loop on its
//! own thread.  It emits `connect` once before its first read, then for
//! every chunk read it:
//!
//! 1. forwards the bytes verbatim to the raw callback (if any);
//! 2. hands them to the [`InputDecoder`], which updates the shared registry
//!    and yields one control event per run;
//! 3. posts those events to the host in arrival order.
//!
//! The loop ends when the peer closes (read returns 0), when a read fails,
//! or when teardown shuts the socket down through a [`ConnectionHandle`].
//! Whatever the reason, the connection emits exactly one `disconnect` event
//! on its way out.  Errors never leave the connection: the host only sees
//! the disconnect.

use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tourbox_core::InputDecoder;
use tracing::{debug, info, trace, warn, Level};

use crate::application::{HostCallbacks, HostEvent, PeerInfo};

/// Size of the receive buffer.  One read never yields more than this.
pub const RECV_BUFFER_SIZE: usize = 1024;

/// Why a receive loop ended.
#[derive(Debug)]
pub enum ConnectionExit {
    /// The Console closed its end of the socket.
    PeerClosed,
    /// The connection was stopped through its handle.
    Stopped,
    /// A read failed.
    Failed(io::Error),
}

/// A Console connection ready to run its receive loop.
pub struct Connection {
    stream: TcpStream,
    peer: PeerInfo,
    running: Arc<AtomicBool>,
    decoder: InputDecoder,
    callbacks: HostCallbacks,
}

impl Connection {
    /// Wraps an accepted socket.  Nothing is read or emitted until
    /// [`Connection::run`].
    pub fn new(
        stream: TcpStream,
        peer: PeerInfo,
        decoder: InputDecoder,
        callbacks: HostCallbacks,
    ) -> Self {
        Self {
            stream,
            peer,
            running: Arc::new(AtomicBool::new(true)),
            decoder,
            callbacks,
        }
    }

    /// Returns a handle that can stop this connection from another thread.
    ///
    /// # Errors
    ///
    /// Fails if the socket cannot be duplicated.
    pub fn handle(&self) -> io::Result<ConnectionHandle> {
        Ok(ConnectionHandle {
            peer: self.peer,
            running: Arc::clone(&self.running),
            stream: self.stream.try_clone()?,
        })
    }

    /// Emits `connect`, runs the receive loop to completion, then emits
    /// `disconnect`.
    pub fn run(mut self) -> ConnectionExit {
        info!("TourBox Console connected from {}", self.peer);
        self.callbacks.emit(HostEvent::Connect(self.peer));

        let mut buf = [0u8; RECV_BUFFER_SIZE];

        let exit = loop {
            if !self.running.load(Ordering::Acquire) {
                break ConnectionExit::Stopped;
            }
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    break if self.running.load(Ordering::Acquire) {
                        ConnectionExit::PeerClosed
                    } else {
                        ConnectionExit::Stopped
                    };
                }
                Ok(n) => self.process(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    break if self.running.load(Ordering::Acquire) {
                        ConnectionExit::Failed(e)
                    } else {
                        ConnectionExit::Stopped
                    };
                }
            }
        };

        self.running.store(false, Ordering::Release);
        match &exit {
            ConnectionExit::PeerClosed => info!("TourBox Console {} disconnected", self.peer),
            ConnectionExit::Stopped => info!("connection {} stopped", self.peer),
            ConnectionExit::Failed(e) => warn!("recv failed on {}: {e}", self.peer),
        }
        self.callbacks.emit(HostEvent::Disconnect(self.peer));
        exit
    }

    fn process(&self, chunk: &[u8]) {
        self.callbacks.emit_raw(chunk);

        if tracing::enabled!(Level::TRACE) {
            trace!(
                peer = %self.peer,
                "raw hex data: {} (length: {} bytes), byte values: {:?}",
                hex_string(chunk),
                chunk.len(),
                chunk
            );
        }

        let emitted = self
            .decoder
            .decode(chunk, |event| self.callbacks.emit(event.into()));
        debug!(peer = %self.peer, bytes = chunk.len(), emitted, "chunk decoded");
    }
}

/// Stops a running [`Connection`] from outside its thread.
#[derive(Debug)]
pub struct ConnectionHandle {
    peer: PeerInfo,
    running: Arc<AtomicBool>,
    stream: TcpStream,
}

impl ConnectionHandle {
    pub fn peer(&self) -> PeerInfo {
        self.peer
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears the running flag and shuts the socket down, which wakes the
    /// blocked read.  The connection then exits and emits `disconnect`.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            // Already closed by the peer.
            trace!("shutdown of {} failed: {e}", self.peer);
        }
    }
}

fn hex_string(chunk: &[u8]) -> String {
    chunk.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::time::Duration;

    use tourbox_core::ButtonRegistry;

    use crate::application::{EventSink, RawSink};
    use crate::infrastructure::host_bridge::mock::RecordingSink;

    /// Returns a connected (client, server-side) socket pair.
    fn socket_pair() -> (TcpStream, TcpStream, PeerInfo) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, addr) = listener.accept().unwrap();
        (client, server, addr.into())
    }

    fn spawn_connection(
        server: TcpStream,
        peer: PeerInfo,
        sink: &Arc<RecordingSink>,
    ) -> (ConnectionHandle, std::thread::JoinHandle<ConnectionExit>, Arc<ButtonRegistry>) {
        let registry = Arc::new(ButtonRegistry::new());
        let events: Arc<dyn EventSink> = sink.clone();
        let raw: Arc<dyn RawSink> = sink.clone();
        let callbacks = HostCallbacks::new(events).with_raw(raw);
        let decoder = InputDecoder::new(Arc::clone(&registry));
        let conn = Connection::new(server, peer, decoder, callbacks);
        let handle = conn.handle().unwrap();
        let thread = std::thread::spawn(move || conn.run());
        (handle, thread, registry)
    }

    #[test]
    fn test_hex_string_formats_lowercase_pairs() {
        assert_eq!(hex_string(&[0, 34, 196, 255]), "0022c4ff");
        assert_eq!(hex_string(&[]), "");
    }

    #[test]
    fn test_peer_close_ends_loop_with_disconnect() {
        let (mut client, server, peer) = socket_pair();
        let sink = Arc::new(RecordingSink::new());
        let (_handle, thread, registry) = spawn_connection(server, peer, &sink);

        client.write_all(&[34]).unwrap();
        sink.wait_for_events(2, Duration::from_secs(5));
        assert!(registry.is_held(34));
        drop(client);

        let exit = thread.join().unwrap();
        assert!(matches!(exit, ConnectionExit::PeerClosed), "got {exit:?}");
        let events = sink.events();
        assert_eq!(
            events,
            vec![
                HostEvent::Connect(peer),
                HostEvent::Control {
                    name: "C1 Press",
                    count: 1
                },
                HostEvent::Disconnect(peer),
            ]
        );
        assert_eq!(sink.raw_chunks(), vec![vec![34]]);
    }

    #[test]
    fn test_handle_stop_wakes_blocked_read() {
        let (_client, server, peer) = socket_pair();
        let sink = Arc::new(RecordingSink::new());
        let (handle, thread, _registry) = spawn_connection(server, peer, &sink);

        assert!(handle.is_running());
        handle.stop();

        let exit = thread.join().unwrap();
        assert!(matches!(exit, ConnectionExit::Stopped), "got {exit:?}");
        assert!(!handle.is_running());
        assert_eq!(
            sink.events(),
            vec![HostEvent::Connect(peer), HostEvent::Disconnect(peer)]
        );
    }

    #[test]
    fn test_connection_reset_ends_loop_as_failed() {
        let (client, server, peer) = socket_pair();
        let sink = Arc::new(RecordingSink::new());
        let (handle, thread, _registry) = spawn_connection(server, peer, &sink);
        sink.wait_for_events(1, Duration::from_secs(5));

        // Zero linger turns the close into a RST, so the blocked read fails.
        socket2::SockRef::from(&client)
            .set_linger(Some(Duration::ZERO))
            .unwrap();
        drop(client);

        let exit = thread.join().unwrap();
        assert!(matches!(exit, ConnectionExit::Failed(_)), "got {exit:?}");
        assert!(!handle.is_running());
        assert_eq!(
            sink.events(),
            vec![HostEvent::Connect(peer), HostEvent::Disconnect(peer)]
        );
        assert!(sink.raw_chunks().is_empty());
    }
}
