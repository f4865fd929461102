//! Infrastructure layer for the server.
//!
//! Contains OS-facing adapters: the TCP listener and connections, the
//! host bridge that owns them, and file-system storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `tourbox_core`, but MUST NOT be imported by the `application` layer.

pub mod host_bridge;
pub mod network;
pub mod storage;
