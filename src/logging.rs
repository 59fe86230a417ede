//! Logging prelude module for convenient access to tracing macros.
//!
//! # Usage
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Initial sync complete");
//! warn!("Cannot compute digest of {}", path.display());
//! ```

pub use tracing::{debug, error, info, warn};

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with environment filter support.
///
/// `default_level` comes from the configuration (`logLevel`). The `RUST_LOG`
/// environment variable, when set, takes precedence:
///
/// ```bash
/// RUST_LOG=debug hashsync watch
/// RUST_LOG=hashsync::correlate=trace,hashsync::remote=debug hashsync watch
/// ```
pub fn init_tracing(default_level: &str) {
	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(default_level))
		.unwrap_or_else(|_| EnvFilter::new("info"));

	// Already initialized
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

// vim: ts=4
