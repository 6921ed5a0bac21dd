//! Startup configuration, read once from the environment and CLI flags rather than
//! scattered `env::var` calls, mirroring `youki`'s root-path resolution in `main.rs`.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: u8,
    pub log_format: LogFormat,
    pub verbose: bool,
    pub debug: bool,
    pub monitoring_enabled: bool,
    pub rootless: bool,
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: 2,
            log_format: LogFormat::Text,
            verbose: false,
            debug: false,
            monitoring_enabled: false,
            rootless: false,
            base_dir: default_base_dir(false),
        }
    }
}

impl Config {
    /// Reads recognized environment variables into a `Config`, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let rootless = env_bool("ROOTLESS_MODE").unwrap_or(false);
        let mut config = Self {
            log_level: env::var("LOG_LEVEL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| (1..=4).contains(v))
                .unwrap_or(2),
            log_format: env::var("PAKRT_LOG_FORMAT")
                .ok()
                .map(|v| if v.eq_ignore_ascii_case("json") {
                    LogFormat::Json
                } else {
                    LogFormat::Text
                })
                .unwrap_or(LogFormat::Text),
            verbose: env_bool("VERBOSE_MODE").unwrap_or(false),
            debug: env_bool("DEBUG_MODE").unwrap_or(false),
            monitoring_enabled: env_bool("MONITORING_ENABLED").unwrap_or(false),
            rootless,
            base_dir: default_base_dir(rootless),
        };

        if let Some(base) = env::var_os("PAKRT_BASE_DIR") {
            config.base_dir = PathBuf::from(base);
        }

        config
    }

    /// CLI flags take precedence over whatever `from_env` resolved.
    pub fn apply_cli_overrides(&mut self, verbose: bool, debug: bool, monitor: bool, rootless: bool) {
        if verbose {
            self.verbose = true;
        }
        if debug {
            self.debug = true;
            self.log_level = 4;
        }
        if monitor {
            self.monitoring_enabled = true;
        }
        if rootless {
            self.rootless = true;
            self.base_dir = default_base_dir(true);
        }
    }
}

fn default_base_dir(rootless: bool) -> PathBuf {
    if rootless {
        env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share/pakrt"))
            .unwrap_or_else(|| PathBuf::from("/tmp/containers"))
    } else {
        PathBuf::from("/tmp/containers")
    }
}

fn env_bool(name: &str) -> Option<bool> {
    env::var(name).ok().map(|v| {
        matches!(
            v.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_when_unset() {
        for var in [
            "LOG_LEVEL",
            "PAKRT_LOG_FORMAT",
            "VERBOSE_MODE",
            "DEBUG_MODE",
            "MONITORING_ENABLED",
            "ROOTLESS_MODE",
            "PAKRT_BASE_DIR",
        ] {
            env::remove_var(var);
        }
        let config = Config::from_env();
        assert_eq!(config.log_level, 2);
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(!config.verbose);
        assert_eq!(config.base_dir, PathBuf::from("/tmp/containers"));
    }

    #[test]
    #[serial]
    fn reads_overrides_from_environment() {
        env::set_var("LOG_LEVEL", "4");
        env::set_var("PAKRT_LOG_FORMAT", "json");
        env::set_var("VERBOSE_MODE", "true");
        env::set_var("PAKRT_BASE_DIR", "/srv/pakrt");

        let config = Config::from_env();
        assert_eq!(config.log_level, 4);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.verbose);
        assert_eq!(config.base_dir, PathBuf::from("/srv/pakrt"));

        for var in ["LOG_LEVEL", "PAKRT_LOG_FORMAT", "VERBOSE_MODE", "PAKRT_BASE_DIR"] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn debug_flag_forces_trace_level() {
        let mut config = Config::default();
        config.apply_cli_overrides(false, true, false, false);
        assert!(config.debug);
        assert_eq!(config.log_level, 4);
    }
}
