//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! Logs go to stderr so command output on stdout stays clean. The filter is
//! taken, in order, from `TICKETDESK_LOG`, the `-v` count, the config file's
//! `log_level`, and finally `warn`.

use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding an `EnvFilter` directive
pub const LOG_ENV: &str = "TICKETDESK_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Level implied by a `-v` count, if any was given
pub fn verbosity_level(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Pick the filter directive to use
pub fn filter_directive(env: Option<&str>, verbosity: u8, config_level: Option<&str>) -> String {
    env.map(str::trim)
        .filter(|d| !d.is_empty())
        .or_else(|| verbosity_level(verbosity))
        .or(config_level)
        .unwrap_or(DEFAULT_DIRECTIVE)
        .to_string()
}

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init_logging(verbosity: u8, config_level: Option<&str>) {
    let env = std::env::var(LOG_ENV).ok();
    let directive = filter_directive(env.as_deref(), verbosity, config_level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let layer = fmt::layer()
        .compact()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time();

    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}
