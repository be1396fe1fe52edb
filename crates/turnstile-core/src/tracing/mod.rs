//! Tracing and observability setup for Turnstile.

pub mod setup;

pub use setup::{init_tracing, init_tracing_json, LOG_ENV_VAR};
