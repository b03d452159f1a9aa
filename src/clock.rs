//! Monotonic clock
//!
//! Nanosecond timestamps measured from the first use of the clock in this
//! process. Transaction start/end times and queue-wait samples share this base.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds elapsed on the process monotonic clock.
pub fn now_ns() -> u64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}

/// Convert a wire transaction TTL (milliseconds) to nanoseconds.
pub fn ttl_ms_to_ns(ttl_ms: u32) -> u64 {
    u64::from(ttl_ms) * 1_000_000
}
