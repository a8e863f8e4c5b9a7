//! The request/response multiplexer built on top of the framing and
//! transport layers.
//!
//! A connected client owns a dedicated reader thread: it alone calls
//! `Transport::read`, decodes whole frames off an accumulator, and
//! completes pending calls by msgid through a registry guarded by a mutex.
//! `request`/`notify` take the write-side lock only for the duration of a
//! single `Transport::write` call, so frames never interleave on the wire
//! but a slow in-flight request never blocks another thread's write.

use crate::config::Config;
use crate::frame::{self, Frame};
use crate::metadata::{self, Catalog, FunctionInfo};
use crate::transport::{self, Transport};
use crate::value::Value;
use crate::{log_error, log_info, Error};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

/// What a pending `request` call is eventually resolved with.
enum PendingOutcome {
    Completed { error: Value, result: Value },
    Closed,
    UnexpectedMessage,
}

struct Connection {
    transport: Arc<dyn Transport>,
    reader: thread::JoinHandle<()>,
}

struct Inner {
    config: Config,
    connection: Mutex<Option<Connection>>,
    write_lock: Mutex<()>,
    registry: Mutex<HashMap<u32, mpsc::SyncSender<PendingOutcome>>>,
    next_id: AtomicU32,
    catalog: Mutex<Option<Arc<Catalog>>>,
    /// Set when the reader thread sees an inbound Request frame (a
    /// protocol violation: this client is not a server) and no pending
    /// call was there to hand the error to directly. Consumed — and
    /// cleared — by the next `request`/`notify` call.
    unexpected_message: Mutex<bool>,
}

/// A connection to a MessagePack-RPC peer, typically a running Neovim
/// instance.
///
/// Cloning a `Client` shares the same connection; any clone may call
/// `request`/`notify`/`disconnect`.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Select a transport backing from `config` without opening it.
    /// `config` must name exactly one transport option.
    pub fn new(config: Config) -> Result<Client, Error> {
        if config.transport_option_count() != 1 {
            return Err(Error::UnsupportedTransport);
        }
        Ok(Client {
            inner: Arc::new(Inner {
                config,
                connection: Mutex::new(None),
                write_lock: Mutex::new(()),
                registry: Mutex::new(HashMap::new()),
                next_id: AtomicU32::new(0),
                catalog: Mutex::new(None),
                unexpected_message: Mutex::new(false),
            }),
        })
    }

    /// Open the transport and, unless `Config::skip_api_info` is set, fetch
    /// the API catalog. Fails with `AlreadyConnected` if already open.
    pub fn connect(&self) -> Result<(), Error> {
        let transport = build_transport(&self.inner.config)?;
        self.begin_connect(transport)?;
        if !self.inner.config.skip_api_info {
            self.refresh_api_info()?;
        }
        Ok(())
    }

    /// Test-only entry point that skips `build_transport`, so the
    /// multiplexer can be exercised against a mock transport.
    #[cfg(test)]
    fn connect_with_transport(&self, transport: Arc<dyn Transport>) -> Result<(), Error> {
        self.begin_connect(transport)
    }

    fn begin_connect(&self, transport: Arc<dyn Transport>) -> Result<(), Error> {
        let mut guard = self.inner.connection.lock().unwrap();
        if guard.is_some() {
            return Err(Error::AlreadyConnected);
        }
        *self.inner.unexpected_message.lock().unwrap() = false;
        let reader_transport = Arc::clone(&transport);
        let reader_inner = Arc::clone(&self.inner);
        let reader = thread::spawn(move || read_loop(reader_inner, reader_transport));
        *guard = Some(Connection { transport, reader });
        log_info!(self.inner.config.log_sink, "connected");
        Ok(())
    }

    /// Close the transport, drop the catalog, and wake every pending
    /// `request` with `TransportClosed`. Fails with `NotConnected` if not
    /// open.
    pub fn disconnect(&self) -> Result<(), Error> {
        let connection = self.inner.connection.lock().unwrap().take();
        let connection = connection.ok_or(Error::NotConnected)?;
        let _ = connection.transport.disconnect();
        self.inner.catalog.lock().unwrap().take();
        wake_all_pending(&self.inner.registry);
        log_info!(self.inner.config.log_sink, "disconnected");
        let _ = connection.reader.join();
        Ok(())
    }

    /// Assign the next msgid, write the request frame, and block until the
    /// matching response arrives (or the connection closes).
    pub fn request(&self, method: &str, params: &[Value]) -> Result<Value, Error> {
        if self.take_unexpected_message() {
            return Err(Error::UnexpectedMessage);
        }
        let transport = self.current_transport()?;
        let msgid = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::sync_channel(1);
        self.inner.registry.lock().unwrap().insert(msgid, sender);

        let frame = Frame::Request {
            msgid,
            method: method.to_owned(),
            params: params.to_vec(),
        };
        if let Err(err) = self.write_frame(&transport, &frame) {
            self.inner.registry.lock().unwrap().remove(&msgid);
            return Err(err);
        }

        match receiver.recv() {
            Ok(PendingOutcome::Completed { error, result }) => {
                if error.is_nil() {
                    Ok(result)
                } else {
                    Err(Error::RemoteError(error))
                }
            }
            Ok(PendingOutcome::Closed) | Err(_) => Err(Error::TransportClosed),
            Ok(PendingOutcome::UnexpectedMessage) => Err(Error::UnexpectedMessage),
        }
    }

    /// Write a notification frame and return immediately; there is no
    /// response to wait for.
    pub fn notify(&self, method: &str, params: &[Value]) -> Result<(), Error> {
        if self.take_unexpected_message() {
            return Err(Error::UnexpectedMessage);
        }
        let transport = self.current_transport()?;
        let frame = Frame::Notification {
            method: method.to_owned(),
            params: params.to_vec(),
        };
        self.write_frame(&transport, &frame)
    }

    /// The cached API catalog, if `connect` (or `refresh_api_info`) has
    /// populated one.
    pub fn api_info(&self) -> Option<Arc<Catalog>> {
        self.inner.catalog.lock().unwrap().clone()
    }

    /// Look up a function descriptor in the cached catalog by name.
    pub fn find_function(&self, name: &str) -> Option<FunctionInfo> {
        self.api_info()?.find_function(name).cloned()
    }

    /// Re-issue `nvim_get_api_info` and replace the cached catalog. On a
    /// `MalformedMetadata` failure the prior catalog, if any, is retained.
    pub fn refresh_api_info(&self) -> Result<(), Error> {
        let value = self.request("nvim_get_api_info", &[])?;
        let catalog = metadata::parse(&value).map_err(Error::MalformedMetadata)?;
        *self.inner.catalog.lock().unwrap() = Some(Arc::new(catalog));
        Ok(())
    }

    /// Consume a pending protocol-violation notice left by the reader
    /// thread for a caller that wasn't waiting on anything when an
    /// inbound Request arrived. Returns `true` (and clears the flag) at
    /// most once per violation.
    fn take_unexpected_message(&self) -> bool {
        let mut flag = self.inner.unexpected_message.lock().unwrap();
        std::mem::take(&mut *flag)
    }

    fn current_transport(&self) -> Result<Arc<dyn Transport>, Error> {
        self.inner
            .connection
            .lock()
            .unwrap()
            .as_ref()
            .map(|connection| Arc::clone(&connection.transport))
            .ok_or(Error::NotConnected)
    }

    fn write_frame(&self, transport: &Arc<dyn Transport>, frame: &Frame) -> Result<(), Error> {
        let mut bytes = Vec::new();
        frame::encode(frame, &mut bytes)?;
        let _guard = self.inner.write_lock.lock().unwrap();
        transport.write(&bytes).map_err(Error::from)
    }
}

fn build_transport(config: &Config) -> Result<Arc<dyn Transport>, Error> {
    if let Some(path) = &config.socket_path {
        #[cfg(windows)]
        {
            let pipe = transport::windows_pipe::WindowsPipeTransport::connect(path, config.timeout())?;
            return Ok(Arc::new(pipe) as Arc<dyn Transport>);
        }
        #[cfg(not(windows))]
        {
            let socket = transport::unix::UnixSocketTransport::connect(path, config.timeout())?;
            return Ok(Arc::new(socket) as Arc<dyn Transport>);
        }
    }
    if let (Some(address), Some(port)) = (&config.tcp_address, config.tcp_port) {
        let tcp = transport::tcp::TcpTransport::connect(address, port, config.timeout())?;
        return Ok(Arc::new(tcp) as Arc<dyn Transport>);
    }
    if config.use_stdio {
        return Ok(Arc::new(transport::stdio::StdioTransport::new()) as Arc<dyn Transport>);
    }
    if config.spawn_process {
        let child = transport::child::ChildProcessTransport::spawn(&config.nvim_path, config.timeout())?;
        return Ok(Arc::new(child) as Arc<dyn Transport>);
    }
    Err(Error::UnsupportedTransport)
}

fn wake_all_pending(registry: &Mutex<HashMap<u32, mpsc::SyncSender<PendingOutcome>>>) {
    for (_, sender) in registry.lock().unwrap().drain() {
        let _ = sender.send(PendingOutcome::Closed);
    }
}

fn dispatch_frame(inner: &Inner, frame: Frame) {
    match frame {
        Frame::Response { msgid, error, result } => {
            let sender = inner.registry.lock().unwrap().remove(&msgid);
            match sender {
                Some(sender) => {
                    let _ = sender.send(PendingOutcome::Completed { error, result });
                }
                None => {
                    log_error!(
                        inner.config.log_sink,
                        "dropped response for unregistered msgid {}",
                        msgid
                    );
                }
            }
        }
        Frame::Notification { method, params } => {
            (inner.config.notification_sink)(&method, &params);
        }
        Frame::Request { method, .. } => {
            log_error!(
                inner.config.log_sink,
                "rejecting unexpected inbound request {:?}: this client is not a server",
                method
            );
            reject_pending_as_unexpected(inner);
        }
    }
}

/// An inbound Request is a protocol violation for this client (it is not a
/// server). Per §4.4, it surfaces as `Error::UnexpectedMessage` — to any
/// call currently blocked in `recv`, immediately, and to the next
/// `request`/`notify` otherwise, via the sticky flag `take_unexpected_message`
/// consumes. The connection itself stays open, per §7's "connection remains
/// open" policy for this error kind.
fn reject_pending_as_unexpected(inner: &Inner) {
    let pending: Vec<_> = inner.registry.lock().unwrap().drain().collect();
    if pending.is_empty() {
        *inner.unexpected_message.lock().unwrap() = true;
    } else {
        for (_, sender) in pending {
            let _ = sender.send(PendingOutcome::UnexpectedMessage);
        }
    }
}

/// Teardown shared by every exit path out of the reader thread: release the
/// transport, drop the connection record and catalog, and wake anyone still
/// waiting on a response. Idempotent, since an explicit `disconnect` call
/// may have already done all of this by the time the thread notices.
fn teardown(inner: &Inner, transport: &Arc<dyn Transport>) {
    let _ = transport.disconnect();
    inner.connection.lock().unwrap().take();
    inner.catalog.lock().unwrap().take();
    wake_all_pending(&inner.registry);
}

fn read_loop(inner: Arc<Inner>, transport: Arc<dyn Transport>) {
    let mut accumulator: Vec<u8> = Vec::new();
    let mut read_buf = [0u8; 4096];
    loop {
        match transport.read(&mut read_buf) {
            Ok(n) => accumulator.extend_from_slice(&read_buf[..n]),
            Err(transport::Error::Closed) | Err(transport::Error::BrokenPipe) => break,
            Err(err) => {
                log_error!(inner.config.log_sink, "transport read failed: {}", err);
                break;
            }
        }

        loop {
            match frame::decode(&accumulator) {
                Ok((frame, consumed)) => {
                    dispatch_frame(&inner, frame);
                    accumulator.drain(..consumed);
                }
                Err(frame::Error::Incomplete) => break,
                Err(frame::Error::Malformed(reason)) => {
                    log_error!(inner.config.log_sink, "malformed frame: {:?}", reason);
                    teardown(&inner, &transport);
                    return;
                }
            }
        }
    }
    teardown(&inner, &transport);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogLevel;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    struct MockTransport {
        inbound: Mutex<VecDeque<u8>>,
        outbound: Mutex<Vec<u8>>,
        closed: AtomicBool,
        chunk_size: usize,
        read_calls: AtomicUsize,
    }

    impl MockTransport {
        fn new(initial_inbound: Vec<u8>, chunk_size: usize) -> Arc<MockTransport> {
            Arc::new(MockTransport {
                inbound: Mutex::new(initial_inbound.into_iter().collect()),
                outbound: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                chunk_size,
                read_calls: AtomicUsize::new(0),
            })
        }

        fn push_inbound(&self, bytes: &[u8]) {
            self.inbound.lock().unwrap().extend(bytes.iter().copied());
        }

        fn written(&self) -> Vec<u8> {
            self.outbound.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        fn read(&self, buf: &mut [u8]) -> Result<usize, transport::Error> {
            self.read_calls.fetch_add(1, Ordering::SeqCst);
            loop {
                {
                    let mut inbound = self.inbound.lock().unwrap();
                    if !inbound.is_empty() {
                        let n = self.chunk_size.min(buf.len()).min(inbound.len());
                        for slot in buf.iter_mut().take(n) {
                            *slot = inbound.pop_front().unwrap();
                        }
                        return Ok(n);
                    }
                }
                if self.closed.load(Ordering::SeqCst) {
                    return Err(transport::Error::Closed);
                }
                thread::sleep(Duration::from_millis(1));
            }
        }

        fn write(&self, bytes: &[u8]) -> Result<(), transport::Error> {
            self.outbound.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }

        fn disconnect(&self) -> Result<(), transport::Error> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }
    }

    fn test_config() -> Config {
        Config::new().use_stdio(true).skip_api_info(true)
    }

    fn wait_until_written(mock: &MockTransport) {
        while mock.written().is_empty() {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn construction_without_a_transport_option_fails() {
        assert!(matches!(Client::new(Config::new()), Err(Error::UnsupportedTransport)));
    }

    #[test]
    fn construction_with_more_than_one_transport_option_fails() {
        let config = Config::new().use_stdio(true).spawn_process(true);
        assert!(matches!(Client::new(config), Err(Error::UnsupportedTransport)));
    }

    #[test]
    fn request_before_connect_fails_with_not_connected() {
        let client = Client::new(test_config()).unwrap();
        assert!(matches!(client.request("nvim_eval", &[]), Err(Error::NotConnected)));
    }

    #[test]
    fn disconnect_before_connect_fails_with_not_connected() {
        let client = Client::new(test_config()).unwrap();
        assert!(matches!(client.disconnect(), Err(Error::NotConnected)));
    }

    #[test]
    fn connect_twice_fails_with_already_connected() {
        let client = Client::new(test_config()).unwrap();
        client.connect_with_transport(MockTransport::new(Vec::new(), 4096)).unwrap();
        let result = client.connect_with_transport(MockTransport::new(Vec::new(), 4096));
        assert!(matches!(result, Err(Error::AlreadyConnected)));
        client.disconnect().unwrap();
    }

    #[test]
    fn request_returns_the_decoded_result() {
        let client = Client::new(test_config()).unwrap();
        let mock = MockTransport::new(Vec::new(), 4096);
        client.connect_with_transport(mock.clone()).unwrap();

        let mut bytes = Vec::new();
        frame::encode(
            &Frame::Response { msgid: 0, error: Value::Nil, result: Value::Int(14) },
            &mut bytes,
        )
        .unwrap();
        mock.push_inbound(&bytes);

        let result = client.request("nvim_eval", &[Value::from("2 + 3 * 4")]).unwrap();
        assert_eq!(result, Value::Int(14));

        client.disconnect().unwrap();
    }

    #[test]
    fn request_with_non_nil_error_surfaces_as_remote_error() {
        let client = Client::new(test_config()).unwrap();
        let mock = MockTransport::new(Vec::new(), 4096);
        client.connect_with_transport(mock.clone()).unwrap();

        let mut bytes = Vec::new();
        frame::encode(
            &Frame::Response { msgid: 0, error: Value::from("boom"), result: Value::Nil },
            &mut bytes,
        )
        .unwrap();
        mock.push_inbound(&bytes);

        match client.request("nvim_eval", &[Value::from("bad")]) {
            Err(Error::RemoteError(Value::Str(message))) => assert_eq!(message, "boom"),
            other => panic!("unexpected: {:?}", other),
        }

        client.disconnect().unwrap();
    }

    #[test]
    fn notify_does_not_block_waiting_for_a_response() {
        let client = Client::new(test_config()).unwrap();
        let mock = MockTransport::new(Vec::new(), 4096);
        client.connect_with_transport(mock).unwrap();

        let start = std::time::Instant::now();
        client.notify("nvim_command", &[Value::from("echom 'x'")]).unwrap();
        assert!(start.elapsed() < Duration::from_millis(50));

        client.disconnect().unwrap();
    }

    #[test]
    fn notification_sink_fires_before_the_in_flight_request_resolves() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_for_sink = Arc::clone(&events);
        let config = test_config().on_notification(move |method, params| {
            events_for_sink.lock().unwrap().push((method.to_owned(), params.to_vec()));
        });
        let client = Client::new(config).unwrap();
        let mock = MockTransport::new(Vec::new(), 4096);
        client.connect_with_transport(mock.clone()).unwrap();

        let requester = {
            let client = client.clone();
            thread::spawn(move || client.request("nvim_exec_lua", &[]))
        };
        wait_until_written(&mock);

        let mut bytes = Vec::new();
        frame::encode(
            &Frame::Notification {
                method: "test_event".to_owned(),
                params: vec![Value::from("hi")],
            },
            &mut bytes,
        )
        .unwrap();
        frame::encode(
            &Frame::Response { msgid: 0, error: Value::Nil, result: Value::Nil },
            &mut bytes,
        )
        .unwrap();
        mock.push_inbound(&bytes);

        requester.join().unwrap().unwrap();
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "test_event");

        client.disconnect().unwrap();
    }

    #[test]
    fn request_completes_when_the_response_arrives_one_byte_at_a_time() {
        let client = Client::new(test_config()).unwrap();
        let mock = MockTransport::new(Vec::new(), 1);
        client.connect_with_transport(mock.clone()).unwrap();

        let mut bytes = Vec::new();
        frame::encode(
            &Frame::Response { msgid: 0, error: Value::Nil, result: Value::Int(14) },
            &mut bytes,
        )
        .unwrap();
        mock.push_inbound(&bytes);

        let result = client.request("nvim_eval", &[Value::from("2 + 3 * 4")]).unwrap();
        assert_eq!(result, Value::Int(14));
        assert!(mock.read_calls.load(Ordering::SeqCst) as usize >= bytes.len());

        client.disconnect().unwrap();
    }

    #[test]
    fn a_deeply_nested_frame_disconnects_the_client() {
        let client = Client::new(test_config()).unwrap();
        let mock = MockTransport::new(Vec::new(), 4096);
        client.connect_with_transport(mock.clone()).unwrap();

        let requester = {
            let client = client.clone();
            thread::spawn(move || client.request("nvim_eval", &[]))
        };
        wait_until_written(&mock);

        let mut bytes = vec![0x91u8; 2000]; // 2000 nested one-element fixarrays
        bytes.push(0xc0); // nil, terminating the innermost array
        mock.push_inbound(&bytes);

        let result = requester.join().unwrap();
        assert!(matches!(result, Err(Error::TransportClosed)));
        assert!(matches!(client.request("nvim_eval", &[]), Err(Error::NotConnected)));
    }

    #[test]
    fn disconnect_wakes_a_pending_request_with_transport_closed() {
        let client = Client::new(test_config()).unwrap();
        let mock = MockTransport::new(Vec::new(), 4096);
        client.connect_with_transport(mock.clone()).unwrap();

        let requester = {
            let client = client.clone();
            thread::spawn(move || client.request("nvim_eval", &[]))
        };
        wait_until_written(&mock);

        client.disconnect().unwrap();

        assert!(matches!(requester.join().unwrap(), Err(Error::TransportClosed)));
    }

    #[test]
    fn unmatched_response_is_logged_and_does_not_disturb_other_pending_requests() {
        let logged = Arc::new(Mutex::new(Vec::new()));
        let logged_for_sink = Arc::clone(&logged);
        let config = test_config()
            .log_sink(move |level, msg| logged_for_sink.lock().unwrap().push((level, msg.to_owned())));
        let client = Client::new(config).unwrap();
        let mock = MockTransport::new(Vec::new(), 4096);
        client.connect_with_transport(mock.clone()).unwrap();

        let requester = {
            let client = client.clone();
            thread::spawn(move || client.request("nvim_eval", &[]))
        };
        wait_until_written(&mock);

        let mut bytes = Vec::new();
        frame::encode(
            &Frame::Response { msgid: 999, error: Value::Nil, result: Value::Nil },
            &mut bytes,
        )
        .unwrap();
        frame::encode(
            &Frame::Response { msgid: 0, error: Value::Nil, result: Value::Int(1) },
            &mut bytes,
        )
        .unwrap();
        mock.push_inbound(&bytes);

        assert_eq!(requester.join().unwrap().unwrap(), Value::Int(1));
        assert!(logged
            .lock()
            .unwrap()
            .iter()
            .any(|(level, msg)| *level == LogLevel::Error && msg.contains("999")));

        client.disconnect().unwrap();
    }

    #[test]
    fn refresh_api_info_populates_the_catalog() {
        let client = Client::new(test_config()).unwrap();
        let mock = MockTransport::new(Vec::new(), 4096);
        client.connect_with_transport(mock.clone()).unwrap();

        let requester = {
            let client = client.clone();
            thread::spawn(move || client.refresh_api_info())
        };
        wait_until_written(&mock);

        let metadata = Value::Array(vec![
            Value::Int(3),
            Value::Map(vec![
                (
                    Value::from("version"),
                    Value::Map(vec![
                        (Value::from("major"), Value::UInt(0)),
                        (Value::from("minor"), Value::UInt(10)),
                        (Value::from("patch"), Value::UInt(2)),
                        (Value::from("api_level"), Value::UInt(11)),
                        (Value::from("api_compatible"), Value::UInt(0)),
                        (Value::from("api_prerelease"), Value::Bool(true)),
                    ]),
                ),
                (
                    Value::from("functions"),
                    Value::Array(vec![Value::Map(vec![
                        (Value::from("name"), Value::from("nvim_get_mode")),
                        (Value::from("since"), Value::UInt(1)),
                        (Value::from("method"), Value::Bool(false)),
                        (Value::from("return_type"), Value::from("Dictionary")),
                        (Value::from("parameters"), Value::Array(vec![])),
                    ])]),
                ),
            ]),
        ]);
        let mut bytes = Vec::new();
        frame::encode(&Frame::Response { msgid: 0, error: Value::Nil, result: metadata }, &mut bytes)
            .unwrap();
        mock.push_inbound(&bytes);

        requester.join().unwrap().unwrap();
        assert_eq!(client.api_info().unwrap().channel_id, 3);
        assert_eq!(client.find_function("nvim_get_mode").unwrap().return_type, "Dictionary");
        assert!(client.find_function("does_not_exist").is_none());

        client.disconnect().unwrap();
    }

    #[test]
    fn inbound_request_wakes_a_pending_call_with_unexpected_message() {
        let client = Client::new(test_config()).unwrap();
        let mock = MockTransport::new(Vec::new(), 4096);
        client.connect_with_transport(mock.clone()).unwrap();

        let requester = {
            let client = client.clone();
            thread::spawn(move || client.request("nvim_eval", &[]))
        };
        wait_until_written(&mock);

        let mut bytes = Vec::new();
        frame::encode(
            &Frame::Request {
                msgid: 0,
                method: "some_server_initiated_call".to_owned(),
                params: vec![],
            },
            &mut bytes,
        )
        .unwrap();
        mock.push_inbound(&bytes);

        assert!(matches!(requester.join().unwrap(), Err(Error::UnexpectedMessage)));

        // The connection stays open: the server's protocol violation
        // doesn't disconnect the client.
        assert!(mock.is_connected());
        client.disconnect().unwrap();
    }

    #[test]
    fn inbound_request_with_no_pending_call_surfaces_on_the_next_call() {
        let client = Client::new(test_config()).unwrap();
        let mock = MockTransport::new(Vec::new(), 4096);
        client.connect_with_transport(mock.clone()).unwrap();

        let mut bytes = Vec::new();
        frame::encode(
            &Frame::Request {
                msgid: 0,
                method: "some_server_initiated_call".to_owned(),
                params: vec![],
            },
            &mut bytes,
        )
        .unwrap();
        mock.push_inbound(&bytes);

        // Give the reader thread time to decode the frame and set the
        // sticky flag before the next call checks it.
        while mock.read_calls.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(20));

        assert!(matches!(client.notify("nvim_command", &[]), Err(Error::UnexpectedMessage)));
        // Consumed: the violation is only surfaced once.
        assert!(mock.written().is_empty());

        client.disconnect().unwrap();
    }
}
