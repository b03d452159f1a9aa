//! Fatal invariant violations
//!
//! A broken invariant in the admission path terminates the process.

/// Log at error level and abort the process.
macro_rules! crash {
    ($($arg:tt)+) => {{
        tracing::error!($($arg)+);
        std::process::abort()
    }};
}
