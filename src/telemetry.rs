//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives like
//!   "info,exercise=debug,draggle_backend=debug").
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Targets are included in the output so `exercise` lifecycle logs stand out
//! from request plumbing; the tower-http TraceLayer adds per-request spans on
//! top of this.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str =
    "info,exercise=debug,draggle_backend=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // JSON vs pretty selects a different subscriber type, so init inside the
    // match rather than storing the builder.
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
