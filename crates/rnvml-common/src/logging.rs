use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable controlling log verbosity.
pub const LOG_ENV: &str = "RNVML_LOG";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize structured logging with environment filter.
/// Set RNVML_LOG=debug (or trace, info, warn, error) for verbosity control.
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_logging() {
    fmt()
        .with_env_filter(env_filter("info"))
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Like [`init_logging`], but quiet by default and a no-op when a global
/// subscriber is already installed. Returns whether this call installed it.
pub fn try_init_logging() -> bool {
    fmt()
        .with_env_filter(env_filter("warn"))
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
