//! Client for the MessagePack-RPC dialect spoken by Neovim.
//!
//! [`Client`] opens a duplex byte stream to a running (or freshly spawned)
//! Neovim process, lets callers issue [`Client::request`]s and
//! [`Client::notify`]ations, and caches the server's discovered API surface
//! ([`Client::api_info`]). The wire format is decoded by [`codec`] and
//! [`frame`]; the byte stream itself is supplied by one of the backings
//! under [`transport`].

pub mod codec;
pub mod config;
pub mod frame;
pub mod metadata;
pub mod transport;
pub mod value;

mod client;
mod support;

pub use client::Client;
pub use config::Config;
pub use metadata::Catalog;
pub use value::Value;

use std::sync::Arc;

/// Severity of an event funneled through the caller-supplied log sink. See
/// [`Config::log_sink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

/// A callback the client funnels loggable events through, in place of a
/// hardcoded logging facility. `Config::default()` installs a no-op sink.
pub type LogSink = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// A callback invoked for every notification the server sends. `Config::default()`
/// installs a no-op sink.
pub type NotificationSink = Arc<dyn Fn(&str, &[Value]) + Send + Sync>;

/// Errors surfaced to callers of this crate.
#[derive(Debug)]
pub enum Error {
    /// `Config` named no recognized transport, or more than one.
    UnsupportedTransport,
    /// `connect` called on a client that is already connected.
    AlreadyConnected,
    /// `request`/`notify`/`disconnect` called on a client with no live transport.
    NotConnected,
    /// The connection closed, or was closed, while this call was outstanding.
    TransportClosed,
    /// A configured connect deadline elapsed.
    Timeout,
    /// The response carried a non-nil error value.
    RemoteError(Value),
    /// The peer sent an inbound Request frame. This client is not a
    /// server: a Request arriving on the connection is a protocol
    /// violation, surfaced here to a pending caller if one is waiting,
    /// or to the next `request`/`notify` call otherwise.
    UnexpectedMessage,
    /// `nvim_get_api_info`'s response did not fit the expected shape.
    MalformedMetadata(metadata::Error),
    /// Any OS-level error not otherwise classified.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnsupportedTransport => {
                write!(f, "config names zero or more than one transport")
            }
            Error::AlreadyConnected => write!(f, "client is already connected"),
            Error::NotConnected => write!(f, "client is not connected"),
            Error::TransportClosed => write!(f, "transport closed"),
            Error::Timeout => write!(f, "connect timed out"),
            Error::RemoteError(value) => write!(f, "remote error: {:?}", value),
            Error::UnexpectedMessage => {
                write!(f, "peer sent an inbound request; this client is not a server")
            }
            Error::MalformedMetadata(err) => write!(f, "malformed api metadata: {}", err),
            Error::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<transport::Error> for Error {
    fn from(err: transport::Error) -> Error {
        match err {
            transport::Error::Closed | transport::Error::BrokenPipe => Error::TransportClosed,
            transport::Error::Timeout => Error::Timeout,
            transport::Error::Unexpected(io_err) => Error::Io(io_err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
