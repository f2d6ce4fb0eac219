//! Structured logging setup.
//!
//! The crate's own code logs via `tracing` call sites (`tracing::info!`,
//! `debug!`, `warn!`, `error!`) at operation boundaries — config load,
//! storage write, LLM call, flow step. [`init`] wires those call sites to a
//! process-wide subscriber; callers embedding this crate in their own
//! binary are free to install their own subscriber instead and skip this.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing-subscriber` with an `EnvFilter` derived from
/// `RUST_LOG`, falling back to `level` when the variable is unset.
///
/// # Errors
///
/// Returns [`crate::Error::Configuration`] if a global subscriber is
/// already installed.
pub fn init(level: &str) -> crate::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).try_init().map_err(|e| {
        crate::Error::Configuration(format!("failed to install tracing subscriber: {e}"))
    })
}
