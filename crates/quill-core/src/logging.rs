//! Tracing subscriber setup.
//!
//! One `fmt` subscriber with an `EnvFilter` honoring `QUILL_LOG`
//! (falling back to `RUST_LOG`, then `info`). Library code only emits
//! `tracing` events; installing the subscriber is the embedder's call.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_env("QUILL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
