// Originally derived from https://github.com/istio/ztunnel (Apache 2.0 licensed)

//! Structured logging bootstrap.
//!
//! The teacher's `core::telemetry` batches log writes through a custom
//! non-blocking worker thread for throughput; this filter runs a single
//! RPC per request and is not log-volume sensitive, so we keep the
//! simpler half of that module: an `EnvFilter`-driven subscriber that
//! emits either human-readable or JSON lines depending on `LOG_FORMAT`.

use std::env;
use std::time::Instant;

use once_cell::sync::Lazy;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub static APPLICATION_START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Dropping this guard has no special behavior today; it exists so call
/// sites can hold a handle (`let _log_flush = setup_logging();`) the way
/// the teacher's CLI does, without binding them to the non-blocking
/// writer's flush-on-drop contract.
pub struct LoggingGuard;

/// Initialize the global `tracing` subscriber. Safe to call once at
/// process startup; subsequent calls are ignored.
pub fn setup_logging() -> LoggingGuard {
	Lazy::force(&APPLICATION_START_TIME);
	let filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
	let json = env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

	let result = if json {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().json().with_target(true))
			.try_init()
	} else {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().with_target(true))
			.try_init()
	};
	if let Err(e) = result {
		eprintln!("failed to install logging subscriber: {e}");
	}
	LoggingGuard
}
