//! Process-wide logger setup
//!
//! The crate only emits through the `log` macros. Binaries and integration
//! tests call [`init_logging`] once to route them to `env_logger`; `RUST_LOG`
//! overrides the configured default filter.

use std::sync::Once;

use log::LevelFilter;

static INIT: Once = Once::new();

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set, in `env_logger` syntax
    pub default_filter: String,
    /// Per-module caps applied on top of the filter
    pub module_levels: Vec<(String, LevelFilter)>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            // wgpu is chatty at info
            module_levels: vec![
                ("wgpu_core".to_string(), LevelFilter::Warn),
                ("wgpu_hal".to_string(), LevelFilter::Error),
                ("naga".to_string(), LevelFilter::Warn),
            ],
        }
    }
}

/// Installs the logger. Later calls, and calls after some other logger was
/// installed, do nothing.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(config.default_filter.as_str()),
        );
        for (module, level) in &config.module_levels {
            builder.filter_module(module, *level);
        }
        if builder.try_init().is_err() {
            log::debug!("A logger was already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging(&LoggingConfig::default());
        init_logging(&LoggingConfig {
            default_filter: "trace".to_string(),
            module_levels: Vec::new(),
        });
        log::info!("logging initialized twice without panicking");
    }
}
