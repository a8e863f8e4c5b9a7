//! Polymorphic duplex byte channel used to carry RPC frames.
//!
//! Each backing exposes its own typed constructor (a Unix socket path, a
//! TCP host/port, etc.) because the address shapes differ; once built, all
//! backings are used uniformly through the [`Transport`] trait.

pub mod child;
pub mod stdio;
pub mod tcp;
pub mod unix;

#[cfg(windows)]
pub mod windows_pipe;

use std::fmt;

/// A connected duplex byte channel.
///
/// Implementations are used from two threads at once: the client's
/// dedicated reader thread calls `read`, while callers issuing requests or
/// notifications call `write`. Implementations must allow this without an
/// internal lock serializing reads against writes (the client already
/// serializes writes against each other); splitting a socket into owned
/// read/write halves, as the standard library allows for `UnixStream`,
/// `TcpStream` and `ChildStdin`/`ChildStdout`, is the usual way to get this.
pub trait Transport: Send + Sync {
    /// Block until at least one byte is available and return how many
    /// bytes were copied into `buf`. Zero means the peer closed its end.
    fn read(&self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Write the entire slice, retrying on partial writes.
    fn write(&self, bytes: &[u8]) -> Result<(), Error>;

    /// Close the channel. Idempotent.
    fn disconnect(&self) -> Result<(), Error>;

    fn is_connected(&self) -> bool;
}

#[derive(Debug)]
pub enum Error {
    /// The peer closed the connection, or we did.
    Closed,
    /// A configured deadline elapsed before the operation completed.
    Timeout,
    /// Writing to a channel whose read side is already gone.
    BrokenPipe,
    /// Any OS-level error that doesn't fit the above.
    Unexpected(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Closed => write!(f, "transport closed"),
            Error::Timeout => write!(f, "transport operation timed out"),
            Error::BrokenPipe => write!(f, "broken pipe"),
            Error::Unexpected(err) => write!(f, "transport error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

/// Classify a raw I/O error the way every backing in this module does:
/// peer-gone conditions collapse to `Closed`/`BrokenPipe`, a would-block
/// surfaced through a configured deadline becomes `Timeout`, anything else
/// is `Unexpected`.
pub(crate) fn classify_io_error(err: std::io::Error) -> Error {
    match err.kind() {
        std::io::ErrorKind::UnexpectedEof
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::NotConnected => Error::Closed,
        std::io::ErrorKind::BrokenPipe => Error::BrokenPipe,
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => Error::Timeout,
        _ => Error::Unexpected(err),
    }
}
