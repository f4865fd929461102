//! Positional-argument adapter for dynamically typed hosts.
//!
//! Script hosts call the server with a loosely typed argument list, the way
//! a JavaScript binding would:
//!
//! ```text
//! createServer(port, eventCallback, ip?, rawCallback?)  -> id
//! stopServer(id)                                         -> bool
//! buttonState(name) | buttonState(id, name)              -> bool
//! ```
//!
//! Each call is validated here and forwarded to [`ServerHost`].  Argument
//! mistakes become [`ConfigError::InvalidArguments`] carrying the usage text
//! the host shows to its user.
//!
//! # `CommandResult`
//!
//! [`invoke`] returns `CommandResult<serde_json::Value>` rather than a
//! `Result`, so every response has the same shape:
//! `{ success: bool, data: T | null, error: string | null }`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{ConfigError, ListenerId, ServerError, ServerHost};
use crate::application::{EventSink, RawSink};

pub const CREATE_SERVER_USAGE: &str =
    "Expected arguments: (port: number, eventCallback: function, ip?: string, rawCallback?: function)";
pub const STOP_SERVER_USAGE: &str = "Expected argument: (serverId: number)";
pub const BUTTON_STATE_USAGE: &str = "Expected arguments: (name) or (serverId, name)";

/// One positional argument passed by the host.
#[derive(Clone)]
pub enum HostArg {
    Number(f64),
    Str(String),
    EventCallback(Arc<dyn EventSink>),
    RawCallback(Arc<dyn RawSink>),
}

impl HostArg {
    /// Type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostArg::Number(_) => "number",
            HostArg::Str(_) => "string",
            HostArg::EventCallback(_) | HostArg::RawCallback(_) => "function",
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            HostArg::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            HostArg::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for HostArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostArg::Number(n) => write!(f, "Number({n})"),
            HostArg::Str(s) => write!(f, "Str({s:?})"),
            HostArg::EventCallback(_) => f.write_str("EventCallback(..)"),
            HostArg::RawCallback(_) => f.write_str("RawCallback(..)"),
        }
    }
}

impl From<f64> for HostArg {
    fn from(n: f64) -> Self {
        HostArg::Number(n)
    }
}

impl From<&str> for HostArg {
    fn from(s: &str) -> Self {
        HostArg::Str(s.to_string())
    }
}

/// Unified response wrapper returned by [`invoke`].
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// `createServer(port, eventCallback, ip?, rawCallback?)`.
///
/// The third argument is the bind IP only if it is a string; otherwise it is
/// taken as the raw callback slot.  A raw slot holding anything other than a
/// raw callback is ignored.
///
/// # Errors
///
/// [`ConfigError::InvalidArguments`] if the port is not a whole number in
/// `0..=65535` or the event callback is missing, plus everything
/// [`ServerHost::create_server`] returns.
pub fn create_server(host: &ServerHost, args: &[HostArg]) -> Result<ListenerId, ServerError> {
    let usage = || ConfigError::InvalidArguments(CREATE_SERVER_USAGE.to_string());

    let port = args
        .first()
        .and_then(HostArg::as_number)
        .and_then(port_from_number)
        .ok_or_else(usage)?;
    let events = match args.get(1) {
        Some(HostArg::EventCallback(cb)) => Arc::clone(cb),
        _ => return Err(usage().into()),
    };

    let (ip, raw_index) = match args.get(2).and_then(HostArg::as_str) {
        Some(ip) => (Some(ip), 3),
        None => (None, 2),
    };
    let raw = match args.get(raw_index) {
        Some(HostArg::RawCallback(cb)) => Some(Arc::clone(cb)),
        _ => None,
    };

    host.create_server(port, events, ip, raw)
}

/// `stopServer(serverId)`.
///
/// # Errors
///
/// [`ConfigError::InvalidArguments`] if the first argument is not a number.
pub fn stop_server(host: &ServerHost, args: &[HostArg]) -> Result<bool, ConfigError> {
    let id = args
        .first()
        .and_then(HostArg::as_number)
        .ok_or_else(|| ConfigError::InvalidArguments(STOP_SERVER_USAGE.to_string()))?;
    Ok(id_from_number(id).is_some_and(|id| host.stop_server(id)))
}

/// `buttonState(name)` or `buttonState(serverId, name)`.
///
/// # Errors
///
/// [`ConfigError::InvalidArguments`] for any other argument shape.
pub fn button_state(host: &ServerHost, args: &[HostArg]) -> Result<bool, ConfigError> {
    match args {
        [HostArg::Str(name)] => Ok(host.button_state(name)),
        [HostArg::Number(id), HostArg::Str(name)] => {
            Ok(id_from_number(*id).is_some_and(|id| host.button_state_for(id, name)))
        }
        _ => Err(ConfigError::InvalidArguments(BUTTON_STATE_USAGE.to_string())),
    }
}

/// Dispatches a command by its host-facing name.
///
/// # Example
///
/// ```no_run
/// # use tourbox_server::infrastructure::host_bridge::{ServerHost, commands::{invoke, HostArg}};
/// let host = ServerHost::new();
/// let result = invoke(&host, "buttonState", &[HostArg::from("C1")]);
/// assert_eq!(result.data, Some(serde_json::json!(false)));
/// ```
pub fn invoke(
    host: &ServerHost,
    command: &str,
    args: &[HostArg],
) -> CommandResult<serde_json::Value> {
    let outcome: Result<serde_json::Value, ServerError> = match command {
        "createServer" => create_server(host, args).map(Into::into),
        "stopServer" => stop_server(host, args)
            .map(Into::into)
            .map_err(Into::into),
        "buttonState" => button_state(host, args)
            .map(Into::into)
            .map_err(Into::into),
        other => {
            return CommandResult::err(format!("unknown command: {other}"));
        }
    };

    match outcome {
        Ok(data) => CommandResult::ok(data),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

fn port_from_number(n: f64) -> Option<u16> {
    (n.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(&n)).then_some(n as u16)
}

/// Ids outside the `u32` range can never be live.
fn id_from_number(n: f64) -> Option<ListenerId> {
    (n.fract() == 0.0 && (1.0..=f64::from(u32::MAX)).contains(&n)).then_some(n as ListenerId)
}
