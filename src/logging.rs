//! Purpose: Install the stderr diagnostic subscriber shared by the CLI and the C ABI.
//! Exports: `init_tracing`, `LOG_FILTER_ENV`.
//! Invariants: Safe to call repeatedly; only the first call installs a subscriber.
//! Invariants: Diagnostics go to stderr with source file and line.
use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_ENV: &str = "MESHLIB_LOG";

pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}
