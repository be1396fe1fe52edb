//! Tracing initialization and configuration.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Env var holding per-target log levels.
pub const LOG_ENV_VAR: &str = "TURNSTILE_LOG";

const DEFAULT_FILTER: &str = "turnstile=info";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize the Turnstile tracing/logging system.
///
/// Reads `TURNSTILE_LOG` for per-target levels, e.g.
/// `TURNSTILE_LOG=turnstile_engine=debug,turnstile_dispatch=warn`.
/// Falls back to `turnstile=info` if unset or invalid.
///
/// Idempotent; only the first call (of this or `init_tracing_json`) installs
/// a subscriber.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter())
            .init();
    });
}

/// Same as [`init_tracing`] but emits one JSON object per event.
pub fn init_tracing_json() {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_current_span(true).with_thread_ids(true))
            .with(filter())
            .init();
    });
}
