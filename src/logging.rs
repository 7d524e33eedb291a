//! Structured logging initialisation.
//!
//! Level and format come from the configuration file's `logging` section.
//! Invalid values fall back to the defaults with a warning after the
//! subscriber is installed; they are never fatal.

use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

use crate::config::LogConfig;

const DEFAULT_LEVEL: &str = "info";
const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn init(config: &LogConfig) {
    let requested_level = config.level.to_lowercase();
    let level = if requested_level.is_empty() {
        DEFAULT_LEVEL
    } else if LEVELS.contains(&requested_level.as_str()) {
        requested_level.as_str()
    } else {
        DEFAULT_LEVEL
    };

    let directives = format!(
        "netconfd={level},netconfd_net={level},netconfd_dhcp={level}",
        level = level
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let format = config.format.to_lowercase();
    let registry = registry().with(filter);
    match format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        "compact" => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    if !requested_level.is_empty() && level != requested_level {
        warn!(requested = %config.level, "invalid log level, defaulting to info");
    }
    if !format.is_empty() && !matches!(format.as_str(), "text" | "json" | "compact") {
        warn!(requested = %config.format, "invalid log format, defaulting to text");
    }
}
