//! Logger setup, grounded on `youki`'s `logger::init` (env var driven level, text or JSON
//! formatter) but built on `tracing-subscriber` rather than `log`+`env_logger`, matching
//! the rest of this workspace's tracing-based instrumentation.

use pakrt_container::config::LogFormat;
use pakrt_container::Config;
use tracing_subscriber::EnvFilter;

/// Maps the 1-4 `LOG_LEVEL` scale onto tracing's level names and installs a global
/// subscriber. Safe to call once per process; a second call is a no-op warning.
pub fn init(config: &Config) {
    let level = match config.log_level {
        1 => "error",
        2 => "warn",
        3 => "info",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match config.log_format {
        LogFormat::Json => subscriber.json().try_init(),
        LogFormat::Text => subscriber.try_init(),
    };
    if let Err(err) = result {
        eprintln!("log init failed: {err}");
    }
}
