//! Inherited stdio backing, used when the host editor spawned this process
//! as a plugin. `connect`/`disconnect` are no-ops and `is_connected` is
//! always true: there is no separate channel lifecycle to track beyond the
//! process's own.

use super::{classify_io_error, Error, Transport};
use std::io::{Read, Stdin, Stdout, Write};
use std::sync::Mutex;

pub struct StdioTransport {
    stdin: Mutex<Stdin>,
    stdout: Mutex<Stdout>,
}

impl StdioTransport {
    pub fn new() -> Self {
        StdioTransport {
            stdin: Mutex::new(std::io::stdin()),
            stdout: Mutex::new(std::io::stdout()),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        StdioTransport::new()
    }
}

impl Transport for StdioTransport {
    fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut stdin = self.stdin.lock().unwrap();
        let n = stdin.read(buf).map_err(classify_io_error)?;
        if n == 0 {
            return Err(Error::Closed);
        }
        Ok(n)
    }

    fn write(&self, bytes: &[u8]) -> Result<(), Error> {
        let mut stdout = self.stdout.lock().unwrap();
        stdout.write_all(bytes).map_err(classify_io_error)
    }

    fn disconnect(&self) -> Result<(), Error> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}
