// src/config.rs
//
// Binding configuration.

use std::env;
use std::path::PathBuf;

use log::LevelFilter;

/// Environment variable naming the engine library to load.
pub const LIBRARY_ENV: &str = "CFLUIDSYNTH_LIBRARY";

/// Environment variable selecting the log level installed at open.
pub const LOG_ENV: &str = "CFLUIDSYNTH_LOG";

/// Configuration used when the module is opened.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// Explicit path of the engine's shared library. When unset the
    /// platform's usual names are tried.
    pub library: Option<PathBuf>,
    /// Install a logger with this level when the module is opened.
    pub log_level: Option<LevelFilter>,
}

impl BridgeConfig {
    /// Build a configuration from `CFLUIDSYNTH_LIBRARY` and `CFLUIDSYNTH_LOG`.
    pub fn from_env() -> Self {
        Self {
            library: env::var_os(LIBRARY_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            log_level: env::var(LOG_ENV).ok().and_then(|v| parse_level(&v)),
        }
    }
}

/// Parse a level name (`"off"`, `"error"`, … `"trace"`), case-insensitive.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    name.trim().parse::<LevelFilter>().ok()
}
