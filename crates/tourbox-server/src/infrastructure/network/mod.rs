//! Network infrastructure: the TCP side of the server.
//!
//! # Sub-modules
//!
//! - **`listener`** – Binds the listening socket and runs the accept loop on
//!   a dedicated thread.  Each accepted socket gets its own connection
//!   thread.
//!
//! - **`connection`** – The per-connection receive loop.  Reads chunks,
//!   forwards them to the raw callback, decodes them and emits control
//!   events.

pub mod connection;
pub mod listener;

use std::net::SocketAddr;

use thiserror::Error;

pub use connection::{Connection, ConnectionExit, ConnectionHandle, RECV_BUFFER_SIZE};
pub use listener::{Listener, ListenerState, DEFAULT_BIND_IP, DEFAULT_PORT};

/// Error type for listener setup.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The listening endpoint could not be acquired (bind or listen failed).
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The bound socket could not be switched to non-blocking accept.
    #[error("failed to configure listening socket on {addr}: {source}")]
    Configure {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The OS refused to start the accept thread.
    #[error("failed to spawn accept thread: {0}")]
    Spawn(#[source] std::io::Error),
}
