//! Host bridge: the three operations an embedding host calls.
//!
//! [`ServerHost`] is the single long-lived owner of every running
//! [`Listener`].  A host creates one `ServerHost`, then:
//!
//! - [`ServerHost::create_server`] binds a listener and returns its id;
//! - [`ServerHost::stop_server`] stops one listener by id;
//! - [`ServerHost::button_state`] / [`ServerHost::button_state_for`] ask
//!   whether a named button is currently held.
//!
//! Hosts with a dynamically typed calling convention go through
//! [`commands`], which validates positional arguments and wraps results in a
//! uniform [`commands::CommandResult`].
//!
//! # Callbacks
//!
//! Every listener owns its own callback pair.  Stopping one listener
//! releases only that listener's references, and a second `create_server`
//! never redirects events of the first.

pub mod channel;
pub mod commands;
pub mod mock;

use std::collections::BTreeMap;
use std::mem;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tourbox_core::{ButtonRegistry, ControlTable};
use tracing::{debug, info};

use crate::application::{EventSink, HostCallbacks, RawSink};
use crate::infrastructure::network::{Listener, NetworkError, DEFAULT_BIND_IP};

/// Identifier handed to the host for each created listener.  Ids start at 1
/// and are never reused within one [`ServerHost`].
pub type ListenerId = u32;

/// Invalid input at the host boundary.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Wrong number or types of arguments.  Carries the usage text.
    #[error("{0}")]
    InvalidArguments(String),

    /// The bind address is not an IP literal.
    #[error("invalid bind address: {0:?}")]
    InvalidAddress(String),
}

/// Error type for [`ServerHost`] operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to start TourBox server: {0}")]
    Network(#[from] NetworkError),
}

/// Owner of all listeners created by one host.
pub struct ServerHost {
    listeners: Mutex<BTreeMap<ListenerId, Listener>>,
    next_id: AtomicU32,
    table: &'static ControlTable,
}

impl ServerHost {
    /// Creates a host with no listeners.  The first id handed out is 1.
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(BTreeMap::new()),
            next_id: AtomicU32::new(1),
            table: ControlTable::standard(),
        }
    }

    /// Binds a listener on `ip:port` (default IP `127.0.0.1`) and starts
    /// accepting Console connections.
    ///
    /// `events` receives control and lifecycle events; `raw`, if given,
    /// receives every received chunk verbatim.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidAddress`] if `ip` does not parse, or
    /// [`ServerError::Network`] if the endpoint cannot be acquired.  No id is
    /// allocated on failure.
    pub fn create_server(
        &self,
        port: u16,
        events: Arc<dyn EventSink>,
        ip: Option<&str>,
        raw: Option<Arc<dyn RawSink>>,
    ) -> Result<ListenerId, ServerError> {
        let ip_text = ip.unwrap_or(DEFAULT_BIND_IP);
        let ip: IpAddr = ip_text
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(ip_text.to_string()))?;

        let mut callbacks = HostCallbacks::new(events);
        if let Some(raw) = raw {
            callbacks = callbacks.with_raw(raw);
        }

        let listener = Listener::bind(SocketAddr::new(ip, port), callbacks)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!("server {id} started on {}", listener.local_addr());
        self.listeners.lock().insert(id, listener);
        Ok(id)
    }

    /// Stops listener `id`.  Returns `true` if the id was live; a second call
    /// for the same id returns `false`.
    ///
    /// Connections already accepted by the listener keep running until their
    /// peers close.
    pub fn stop_server(&self, id: ListenerId) -> bool {
        // Joining the accept thread must not happen under the map lock.
        let removed = self.listeners.lock().remove(&id);
        match removed {
            Some(mut listener) => {
                listener.stop();
                info!("server {id} stopped");
                true
            }
            None => {
                debug!("stop requested for unknown server {id}");
                false
            }
        }
    }

    /// Returns `true` if the named control is held on any listener.
    ///
    /// `name` may be a full control name (`"C1 Press"`) or a button's short
    /// name (`"C1"`).  Unknown names and non-press controls report `false`.
    pub fn button_state(&self, name: &str) -> bool {
        let Some(code) = self.table.lookup_by_name(name) else {
            return false;
        };
        let listeners = self.listeners.lock();
        ButtonRegistry::any_held(listeners.values().map(|l| l.registry().as_ref()), code)
    }

    /// Like [`ServerHost::button_state`] but scoped to listener `id`.
    /// Unknown ids report `false`.
    pub fn button_state_for(&self, id: ListenerId, name: &str) -> bool {
        let Some(code) = self.table.lookup_by_name(name) else {
            return false;
        };
        self.listeners
            .lock()
            .get(&id)
            .is_some_and(|l| l.registry().is_held(code))
    }

    /// The bound address of listener `id`.
    pub fn local_addr(&self, id: ListenerId) -> Option<SocketAddr> {
        self.listeners.lock().get(&id).map(Listener::local_addr)
    }

    /// Ids of all live listeners in ascending order.
    pub fn listener_ids(&self) -> Vec<ListenerId> {
        self.listeners.lock().keys().copied().collect()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Stops every listener and forcefully ends their in-flight connections.
    /// Each ended connection still emits `disconnect`.
    pub fn shutdown(&self) {
        let listeners = mem::take(&mut *self.listeners.lock());
        if listeners.is_empty() {
            return;
        }
        info!("shutting down {} server(s)", listeners.len());
        for (id, mut listener) in listeners {
            listener.stop();
            let closed = listener.disconnect_all();
            debug!("server {id} shut down, {closed} connection(s) closed");
        }
    }
}

impl Default for ServerHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ServerHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::HostEvent;

    fn noop() -> Arc<dyn EventSink> {
        Arc::new(|_: HostEvent| {})
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let host = ServerHost::new();
        let a = host.create_server(0, noop(), None, None).unwrap();
        let b = host.create_server(0, noop(), None, None).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(host.listener_ids(), vec![1, 2]);
    }

    #[test]
    fn test_default_bind_ip_is_loopback() {
        let host = ServerHost::new();
        let id = host.create_server(0, noop(), None, None).unwrap();
        let addr = host.local_addr(id).unwrap();
        assert_eq!(addr.ip(), "127.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_invalid_ip_is_config_error_and_allocates_no_id() {
        let host = ServerHost::new();
        let err = host
            .create_server(0, noop(), Some("not-an-ip"), None)
            .unwrap_err();
        assert!(matches!(err, ServerError::Config(ConfigError::InvalidAddress(_))));
        assert_eq!(host.create_server(0, noop(), None, None).unwrap(), 1);
    }

    #[test]
    fn test_stop_server_true_exactly_once() {
        let host = ServerHost::new();
        let id = host.create_server(0, noop(), None, None).unwrap();
        assert!(host.stop_server(id));
        assert!(!host.stop_server(id));
        assert_eq!(host.listener_count(), 0);
    }

    #[test]
    fn test_stop_unknown_server_returns_false() {
        let host = ServerHost::new();
        assert!(!host.stop_server(42));
    }

    #[test]
    fn test_button_state_without_listeners_is_false() {
        let host = ServerHost::new();
        assert!(!host.button_state("C1"));
        assert!(!host.button_state("No Such Control"));
        assert!(!host.button_state_for(1, "C1 Press"));
    }

    #[test]
    fn test_shutdown_removes_all_listeners() {
        let host = ServerHost::new();
        host.create_server(0, noop(), None, None).unwrap();
        host.create_server(0, noop(), None, None).unwrap();
        host.shutdown();
        assert_eq!(host.listener_count(), 0);
        host.shutdown();
    }
}
