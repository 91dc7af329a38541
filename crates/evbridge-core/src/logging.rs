#![forbid(unsafe_code)]

//! Logging shim.
//!
//! With the `tracing` feature on, this re-exports the `tracing` event macros.
//! With it off, the same names resolve to crate-root no-op macros, so every
//! call site can `use evbridge_core::logging::{debug, trace, warn}`
//! unconditionally.
//!
//! Field conventions: `subscription_id` (u64), `label` (static str naming the
//! stream), and a dotted `message` such as `"stream.subscribe"`.

#[cfg(feature = "tracing")]
pub use tracing::{debug, trace, warn};

#[cfg(not(feature = "tracing"))]
pub use crate::{debug, trace, warn};

/// Install a JSON `tracing` subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json() -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .is_ok()
}
