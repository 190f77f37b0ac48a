use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `KRM_SETTERS_LOG=debug`.
pub const LOG_ENV: &str = "KRM_SETTERS_LOG";

/// Initializes `tracing` logging to stderr with the filter read from
/// [`LOG_ENV`], falling back to `warn`.
///
/// Calling it more than once is harmless; later calls are ignored.
pub fn initialize_logging() {
    let filter = EnvFilter::builder()
        .with_env_var(LOG_ENV)
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
