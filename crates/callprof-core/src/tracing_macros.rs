//! Feature-gated logging macros
//!
//! The pipeline logs through these wrappers so that builds without the
//! `tracing` feature carry no logging calls on the capture path. Values that
//! exist only to be logged are marked with
//! `cfg_attr(not(feature = "tracing"), allow(unused_variables))` at the
//! function that computes them.

/// Log at error level when the tracing feature is enabled
#[cfg(feature = "tracing")]
macro_rules! trace_error {
    ($($arg:tt)*) => {
        tracing::error!($($arg)*)
    };
}

/// Log at error level, no-op without the tracing feature
#[cfg(not(feature = "tracing"))]
macro_rules! trace_error {
    ($($arg:tt)*) => {};
}

/// Log at warn level when the tracing feature is enabled
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*)
    };
}

/// Log at warn level, no-op without the tracing feature
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

/// Log at info level when the tracing feature is enabled
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => {
        tracing::info!($($arg)*)
    };
}

/// Log at info level, no-op without the tracing feature
#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Log at debug level when the tracing feature is enabled
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

/// Log at debug level, no-op without the tracing feature
#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

pub(crate) use {trace_debug, trace_error, trace_info, trace_warn};
