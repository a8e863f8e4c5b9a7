//! TCP socket backing.

use super::{classify_io_error, Error, Transport};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// `std::net` performs process-wide socket library init (Winsock on
/// Windows) lazily on first use; this gate exists so the first connect from
/// any thread passes through a single synchronization point, matching the
/// once-initialized-singleton pattern the spec calls for on platforms where
/// that init isn't automatic.
static SOCKET_INIT: std::sync::Once = std::sync::Once::new();

fn ensure_socket_library_initialized() {
    SOCKET_INIT.call_once(|| {});
}

pub struct TcpTransport {
    read_half: TcpStream,
    write_half: TcpStream,
    connected: AtomicBool,
}

impl TcpTransport {
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, Error> {
        ensure_socket_library_initialized();
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(Error::Unexpected)?
            .next()
            .ok_or_else(|| {
                Error::Unexpected(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("could not resolve {}:{}", host, port),
                ))
            })?;
        let read_half = if timeout.is_zero() {
            TcpStream::connect(addr).map_err(classify_io_error)?
        } else {
            TcpStream::connect_timeout(&addr, timeout).map_err(|err| {
                if err.kind() == std::io::ErrorKind::TimedOut {
                    Error::Timeout
                } else {
                    classify_io_error(err)
                }
            })?
        };
        read_half.set_nodelay(true).map_err(classify_io_error)?;
        let write_half = read_half.try_clone().map_err(classify_io_error)?;
        Ok(TcpTransport {
            read_half,
            write_half,
            connected: AtomicBool::new(true),
        })
    }
}

impl Transport for TcpTransport {
    fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut stream = &self.read_half;
        let n = stream.read(buf).map_err(classify_io_error)?;
        if n == 0 {
            self.connected.store(false, Ordering::SeqCst);
            return Err(Error::Closed);
        }
        Ok(n)
    }

    fn write(&self, bytes: &[u8]) -> Result<(), Error> {
        let mut stream = &self.write_half;
        stream.write_all(bytes).map_err(classify_io_error)
    }

    fn disconnect(&self) -> Result<(), Error> {
        self.connected.store(false, Ordering::SeqCst);
        self.read_half
            .shutdown(std::net::Shutdown::Both)
            .map_err(classify_io_error)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
