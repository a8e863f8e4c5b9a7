//! Windows named pipe backing (`\\.\pipe\…`).
//!
//! `CreateFileW` returns `ERROR_PIPE_BUSY` when every pipe instance is
//! already claimed; we wait on the pipe with `WaitNamedPipeW` and retry
//! until the configured deadline elapses. Once open, the handle is wrapped
//! in a `std::fs::File` so reads and writes go through the ordinary `Read`/
//! `Write` impls rather than hand-rolled `ReadFile`/`WriteFile` calls.

use super::{classify_io_error, Error, Transport};
use std::ffi::OsStr;
use std::fs::File;
use std::io::{Read, Write};
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::FromRawHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use windows_sys::Win32::Foundation::{ERROR_PIPE_BUSY, INVALID_HANDLE_VALUE};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_ATTRIBUTE_NORMAL, GENERIC_READ, GENERIC_WRITE, OPEN_EXISTING,
};
use windows_sys::Win32::System::Pipes::WaitNamedPipeW;

pub struct WindowsPipeTransport {
    read_half: File,
    write_half: File,
    connected: AtomicBool,
}

fn to_wide(path: &str) -> Vec<u16> {
    OsStr::new(path).encode_wide().chain(std::iter::once(0)).collect()
}

impl WindowsPipeTransport {
    pub fn connect(path: &str, timeout: Duration) -> Result<Self, Error> {
        let wide_path = to_wide(path);
        let never_times_out = timeout.is_zero();
        let deadline = Instant::now() + if never_times_out { Duration::from_secs(3600) } else { timeout };

        loop {
            let handle = unsafe {
                CreateFileW(
                    wide_path.as_ptr(),
                    GENERIC_READ | GENERIC_WRITE,
                    0,
                    std::ptr::null(),
                    OPEN_EXISTING,
                    FILE_ATTRIBUTE_NORMAL,
                    0,
                )
            };
            if handle != INVALID_HANDLE_VALUE {
                let file = unsafe { File::from_raw_handle(handle as *mut std::ffi::c_void) };
                let write_half = file.try_clone().map_err(classify_io_error)?;
                return Ok(WindowsPipeTransport {
                    read_half: file,
                    write_half,
                    connected: AtomicBool::new(true),
                });
            }

            let os_err = std::io::Error::last_os_error();
            if os_err.raw_os_error() != Some(ERROR_PIPE_BUSY as i32) {
                return Err(classify_io_error(os_err));
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
            let remaining_ms = deadline.saturating_duration_since(Instant::now()).as_millis();
            let wait_ms = remaining_ms.min(u32::MAX as u128) as u32;
            unsafe {
                WaitNamedPipeW(wide_path.as_ptr(), wait_ms);
            }
        }
    }
}

impl Transport for WindowsPipeTransport {
    fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut file = &self.read_half;
        let n = file.read(buf).map_err(classify_io_error)?;
        if n == 0 {
            self.connected.store(false, Ordering::SeqCst);
            return Err(Error::Closed);
        }
        Ok(n)
    }

    fn write(&self, bytes: &[u8]) -> Result<(), Error> {
        let mut file = &self.write_half;
        file.write_all(bytes).map_err(classify_io_error)
    }

    fn disconnect(&self) -> Result<(), Error> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
