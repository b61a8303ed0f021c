//! Tracing subscriber setup.
//!
//! Logs go to stderr so command output on stdout stays pipeable. `RUST_LOG`
//! overrides the default level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let _ = Registry::default().with(filter).with(fmt_layer).try_init();
}

/// `warn` normally, `info` with `--verbose`, `debug` with `-vv`.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}
