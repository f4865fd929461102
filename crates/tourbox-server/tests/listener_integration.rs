//! Integration tests for the listener over real loopback sockets.
//!
//! Each test binds a [`Listener`] on an OS-assigned port, connects with a
//! plain `TcpStream` acting as the Console, writes literal byte sequences and
//! asserts on what the host callbacks received.
//!
//! TCP does not preserve write boundaries, so tests that send several
//! writes wait for the events of one write before sending the next.  The
//! scenarios are chosen so that a coalesced read would still produce the
//! same events.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use tourbox_server::application::{EventSink, HostCallbacks, HostEvent, PeerInfo, RawSink};
use tourbox_server::infrastructure::host_bridge::mock::RecordingSink;
use tourbox_server::infrastructure::network::{Listener, ListenerState};

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    listener: Listener,
    sink: Arc<RecordingSink>,
}

impl Harness {
    fn start() -> Self {
        let sink = Arc::new(RecordingSink::new());
        let events: Arc<dyn EventSink> = sink.clone();
        let raw: Arc<dyn RawSink> = sink.clone();
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener =
            Listener::bind(addr, HostCallbacks::new(events).with_raw(raw)).expect("bind");
        Self { listener, sink }
    }

    /// Connects a client and waits for its `connect` event.
    fn connect(&self) -> TcpStream {
        let before = self.sink.events().len();
        let client = TcpStream::connect(self.listener.local_addr()).expect("connect");
        self.sink.wait_for_events(before + 1, WAIT);
        client
    }

    /// Sends `bytes` and waits until `expected_total` events are recorded.
    fn send(&self, client: &mut TcpStream, bytes: &[u8], expected_total: usize) {
        client.write_all(bytes).expect("write");
        let events = self.sink.wait_for_events(expected_total, WAIT);
        assert!(
            events.len() >= expected_total,
            "expected {expected_total} events after {bytes:?}, got {events:?}"
        );
    }

    fn is_held(&self, code: u8) -> bool {
        self.listener.registry().is_held(code)
    }
}

// ── Decoding scenarios over TCP ───────────────────────────────────────────────

#[test]
fn test_rotation_velocity_over_tcp() {
    let h = Harness::start();
    let mut client = h.connect();

    h.send(&mut client, &[132, 132, 132, 196], 3);

    assert_eq!(h.sink.control_events(), vec![("Knob CCW", 3), ("Knob CW", 1)]);
    assert!(h.listener.registry().held_codes().is_empty());
}

#[test]
fn test_press_hold_release_over_tcp() {
    let h = Harness::start();
    let mut client = h.connect();

    h.send(&mut client, &[34], 2);
    assert!(h.is_held(34));

    h.send(&mut client, &[162], 3);
    assert!(!h.is_held(34));
    assert_eq!(
        h.sink.control_events(),
        vec![("C1 Press", 1), ("C1 Release", 1)]
    );
}

#[test]
fn test_orphan_release_over_tcp() {
    let h = Harness::start();
    let mut client = h.connect();

    h.send(&mut client, &[162], 2);

    assert_eq!(h.sink.control_events(), vec![("C1 Release", 1)]);
    assert!(!h.is_held(34));
}

#[test]
fn test_repeated_press_over_tcp() {
    let h = Harness::start();
    let mut client = h.connect();

    h.send(&mut client, &[16, 16], 2);
    assert!(h.is_held(16));

    h.send(&mut client, &[144], 3);
    assert!(!h.is_held(16));
    assert_eq!(
        h.sink.control_events(),
        vec![("Up Press", 2), ("Up Release", 1)]
    );
}

#[test]
fn test_unknown_bytes_over_tcp() {
    let h = Harness::start();
    let mut client = h.connect();

    h.send(&mut client, &[34, 99, 162], 3);

    assert_eq!(
        h.sink.control_events(),
        vec![("C1 Press", 1), ("C1 Release", 1)]
    );
}

#[test]
fn test_multi_control_chunk_over_tcp() {
    let h = Harness::start();
    let mut client = h.connect();

    h.send(&mut client, &[0, 0, 34, 34, 34, 162, 128], 5);

    assert_eq!(
        h.sink.control_events(),
        vec![
            ("Tall Press", 2),
            ("C1 Press", 3),
            ("C1 Release", 1),
            ("Tall Release", 1),
        ]
    );
    assert!(!h.is_held(0));
    assert!(!h.is_held(34));
}

#[test]
fn test_raw_callback_receives_bytes_verbatim() {
    let h = Harness::start();
    let mut client = h.connect();

    h.send(&mut client, &[34, 99, 162], 3);

    let received: Vec<u8> = h.sink.raw_chunks().concat();
    assert_eq!(received, vec![34, 99, 162]);
}

#[test]
fn test_connections_share_listener_registry() {
    let h = Harness::start();
    let mut first = h.connect();
    let mut second = h.connect();

    h.send(&mut first, &[35], 3);
    assert!(h.is_held(35));

    h.send(&mut second, &[163], 4);
    assert!(!h.is_held(35));
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[test]
fn test_connect_then_close_yields_one_connect_and_one_disconnect() {
    let h = Harness::start();
    let client = TcpStream::connect(h.listener.local_addr()).expect("connect");
    let client_addr = client.local_addr().expect("local addr");
    drop(client);

    let events = h.sink.wait_for_events(2, WAIT);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(h.sink.events().len(), 2, "unexpected extra events");

    let peer = PeerInfo::from(client_addr);
    assert_eq!(
        events,
        vec![HostEvent::Connect(peer), HostEvent::Disconnect(peer)]
    );
}

#[test]
fn test_connection_reset_yields_one_connect_and_one_disconnect() {
    let h = Harness::start();
    let client = h.connect();
    let peer = PeerInfo::from(client.local_addr().expect("local addr"));

    // Zero linger makes the close a RST, so the server's read fails.
    socket2::SockRef::from(&client)
        .set_linger(Some(Duration::ZERO))
        .expect("set linger");
    drop(client);

    let events = h.sink.wait_for_events(2, WAIT);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(h.sink.events().len(), 2, "unexpected extra events");
    assert_eq!(
        events,
        vec![HostEvent::Connect(peer), HostEvent::Disconnect(peer)]
    );
    assert!(h.sink.raw_chunks().is_empty());
}

#[test]
fn test_stop_keeps_in_flight_connections_running() {
    let mut h = Harness::start();
    let mut client = h.connect();
    let addr = h.listener.local_addr();

    h.listener.stop();
    assert_eq!(h.listener.state(), ListenerState::Stopped);

    // The accepted connection keeps decoding after the listener stopped.
    h.send(&mut client, &[196], 2);
    assert_eq!(h.sink.control_events(), vec![("Knob CW", 1)]);

    // No new connections are accepted.
    assert!(
        TcpStream::connect_timeout(&addr, Duration::from_millis(500)).is_err(),
        "stopped listener accepted a connection"
    );

    drop(client);
    let events = h.sink.wait_for_events(3, WAIT);
    assert_eq!(events.last().map(HostEvent::name), Some("disconnect"));
}

#[test]
fn test_disconnect_all_closes_client_socket() {
    let h = Harness::start();
    let mut client = h.connect();

    assert_eq!(h.listener.disconnect_all(), 1);

    let events = h.sink.wait_for_events(2, WAIT);
    assert_eq!(events[1].name(), "disconnect");

    client.set_read_timeout(Some(WAIT)).expect("set read timeout");
    let mut buf = [0u8; 1];
    // Either EOF or a reset: the server side is gone.
    let read = client.read(&mut buf);
    assert!(matches!(read, Ok(0) | Err(_)), "got {read:?}");
}
