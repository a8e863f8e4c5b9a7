//! Spawned-child backing: forks/execs `nvim --headless --embed` and wires
//! its stdin/stdout to in-process pipes.

use super::{classify_io_error, Error, Transport};
use std::io::{Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub struct ChildProcessTransport {
    child: Arc<Mutex<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    stdout: Mutex<ChildStdout>,
    connected: AtomicBool,
    timeout: Duration,
}

impl ChildProcessTransport {
    pub fn spawn(nvim_path: &str, timeout: Duration) -> Result<Self, Error> {
        let mut child = Command::new(nvim_path)
            .arg("--headless")
            .arg("--embed")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(Error::Unexpected)?;
        let stdin = child.stdin.take().expect("child spawned with piped stdin");
        let stdout = child.stdout.take().expect("child spawned with piped stdout");
        Ok(ChildProcessTransport {
            child: Arc::new(Mutex::new(child)),
            stdin: Mutex::new(Some(stdin)),
            stdout: Mutex::new(stdout),
            connected: AtomicBool::new(true),
            timeout,
        })
    }
}

impl Transport for ChildProcessTransport {
    fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut stdout = self.stdout.lock().unwrap();
        let n = stdout.read(buf).map_err(classify_io_error)?;
        if n == 0 {
            self.connected.store(false, Ordering::SeqCst);
            return Err(Error::Closed);
        }
        Ok(n)
    }

    fn write(&self, bytes: &[u8]) -> Result<(), Error> {
        let mut stdin = self.stdin.lock().unwrap();
        match stdin.as_mut() {
            Some(stdin) => stdin.write_all(bytes).map_err(classify_io_error),
            None => Err(Error::BrokenPipe),
        }
    }

    fn disconnect(&self) -> Result<(), Error> {
        self.connected.store(false, Ordering::SeqCst);
        // Close our end of stdin; the child will see EOF on its stdin.
        self.stdin.lock().unwrap().take();

        let child = Arc::clone(&self.child);
        let timeout = self.timeout;
        let done = Arc::new(AtomicBool::new(false));
        let done_in_thread = Arc::clone(&done);
        let waiter = thread::spawn(move || {
            let deadline = Instant::now()
                + if timeout.is_zero() {
                    Duration::from_secs(5)
                } else {
                    timeout
                };
            loop {
                {
                    let mut guard = child.lock().unwrap();
                    match guard.try_wait() {
                        Ok(Some(_status)) => break,
                        Ok(None) => {}
                        Err(_) => break,
                    }
                }
                if Instant::now() >= deadline {
                    let mut guard = child.lock().unwrap();
                    let _ = guard.kill();
                    let _ = guard.wait();
                    break;
                }
                thread::sleep(Duration::from_millis(20));
            }
            done_in_thread.store(true, Ordering::SeqCst);
        });
        let _ = waiter.join();
        debug_assert!(done.load(Ordering::SeqCst));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
