// A log sink is just a callback the caller supplies through `Config`. These
// macros funnel every loggable event in this crate through that callback
// instead of a hardcoded `eprintln!`, so embedding applications can wire the
// events into whatever observability stack they already have.

#[macro_export]
macro_rules! log_info {
    ( $sink:expr, $str:literal ) => {{
        ($sink)($crate::LogLevel::Info, $str);
    }};
    ( $sink:expr, $str:literal, $($args:tt)* ) => {{
        ($sink)($crate::LogLevel::Info, &format!($str, $($args)*));
    }};
}
pub use log_info;

#[macro_export]
macro_rules! log_error {
    ( $sink:expr, $str:literal ) => {{
        ($sink)($crate::LogLevel::Error, $str);
    }};
    ( $sink:expr, $str:literal, $($args:tt)* ) => {{
        ($sink)($crate::LogLevel::Error, &format!($str, $($args)*));
    }};
}
pub use log_error;
