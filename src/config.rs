//! Construction-time configuration for a [`crate::Client`].
//!
//! This is an ordinary builder, not a CLI parser or file format: the caller
//! picks exactly one transport field and hands the result to
//! [`crate::Client::new`].

use crate::{LogLevel, LogSink, NotificationSink, Value};
use std::time::Duration;

/// Configuration accepted at client construction.
///
/// Exactly one of `socket_path`, `tcp_address`+`tcp_port`, `use_stdio`, or
/// `spawn_process` must be set, or [`crate::Client::new`] fails with
/// [`crate::Error::UnsupportedTransport`].
#[derive(Clone)]
pub struct Config {
    pub(crate) socket_path: Option<String>,
    pub(crate) tcp_address: Option<String>,
    pub(crate) tcp_port: Option<u16>,
    pub(crate) use_stdio: bool,
    pub(crate) spawn_process: bool,
    pub(crate) nvim_path: String,
    pub(crate) timeout_ms: u32,
    pub(crate) skip_api_info: bool,
    pub(crate) log_sink: LogSink,
    pub(crate) notification_sink: NotificationSink,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            socket_path: None,
            tcp_address: None,
            tcp_port: None,
            use_stdio: false,
            spawn_process: false,
            nvim_path: "nvim".to_owned(),
            timeout_ms: 5000,
            skip_api_info: false,
            log_sink: std::sync::Arc::new(|_level: LogLevel, _msg: &str| {}),
            notification_sink: std::sync::Arc::new(|_method: &str, _params: &[Value]| {}),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }

    /// Filesystem path for a Unix domain socket, or a `\\.\pipe\…` path for
    /// a Windows named pipe.
    pub fn socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    /// TCP host/port to connect to.
    pub fn tcp(mut self, address: impl Into<String>, port: u16) -> Self {
        self.tcp_address = Some(address.into());
        self.tcp_port = Some(port);
        self
    }

    /// Use this process's own stdin/stdout, for when the host editor spawned
    /// this process as a plugin.
    pub fn use_stdio(mut self, yes: bool) -> Self {
        self.use_stdio = yes;
        self
    }

    /// Spawn an embedded `nvim --headless --embed` and talk to it over
    /// piped stdin/stdout.
    pub fn spawn_process(mut self, yes: bool) -> Self {
        self.spawn_process = yes;
        self
    }

    /// Path to the `nvim` binary used by `spawn_process`. Defaults to `"nvim"`.
    pub fn nvim_path(mut self, path: impl Into<String>) -> Self {
        self.nvim_path = path.into();
        self
    }

    /// Connect/shutdown timeout in milliseconds. `0` means no timeout.
    /// Defaults to 5000.
    pub fn timeout_ms(mut self, ms: u32) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// If set, `connect` does not automatically fetch the API catalog.
    pub fn skip_api_info(mut self, yes: bool) -> Self {
        self.skip_api_info = yes;
        self
    }

    /// Install a sink for loggable events (connect/disconnect, dropped
    /// unmatched responses, decode failures). Defaults to a no-op sink.
    pub fn log_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(LogLevel, &str) + Send + Sync + 'static,
    {
        self.log_sink = std::sync::Arc::new(sink);
        self
    }

    /// Install a sink invoked for every notification the server sends.
    /// Defaults to a no-op sink.
    pub fn on_notification<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str, &[Value]) + Send + Sync + 'static,
    {
        self.notification_sink = std::sync::Arc::new(sink);
        self
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms as u64)
    }

    /// How many of the mutually exclusive transport options are set.
    pub(crate) fn transport_option_count(&self) -> usize {
        let tcp_set = self.tcp_address.is_some() && self.tcp_port.is_some();
        [self.socket_path.is_some(), tcp_set, self.use_stdio, self.spawn_process]
            .into_iter()
            .filter(|set| *set)
            .count()
    }
}
