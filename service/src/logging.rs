use crate::config::Config;
use log::LevelFilter;
use simplelog::{self, ConfigBuilder};

/// Dependency modules silenced unless running at Trace.
const FILTERED_MODULES: &[&str] = &["tower", "hyper", "axum", "h2", "mio", "tokio_util"];

pub struct Logger {}

impl Logger {
    /// Initializes the global terminal logger from the provided Config.
    ///
    /// At Trace every module logs; at any other level the dependencies in
    /// `FILTERED_MODULES` are suppressed so hub activity stays readable.
    pub fn init_logger(config: &Config) {
        let log_config = Self::build_log_config(config.log_level_filter);

        simplelog::TermLogger::init(
            config.log_level_filter,
            log_config,
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )
        .expect("Failed to start simplelog");
    }

    fn build_log_config(level: LevelFilter) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        for module in Self::ignored_modules(level) {
            builder.add_filter_ignore_str(module);
        }

        builder.build()
    }

    fn ignored_modules(level: LevelFilter) -> &'static [&'static str] {
        if level == LevelFilter::Trace {
            &[]
        } else {
            FILTERED_MODULES
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_level_keeps_dependency_logs() {
        assert!(Logger::ignored_modules(LevelFilter::Trace).is_empty());
    }

    #[test]
    fn test_other_levels_filter_http_stack() {
        for level in [
            LevelFilter::Off,
            LevelFilter::Error,
            LevelFilter::Warn,
            LevelFilter::Info,
            LevelFilter::Debug,
        ] {
            let ignored = Logger::ignored_modules(level);
            assert!(ignored.contains(&"hyper"), "{level} should filter hyper");
            assert!(ignored.contains(&"axum"), "{level} should filter axum");
        }
    }

    #[test]
    fn test_build_log_config_does_not_panic() {
        let _config = Logger::build_log_config(LevelFilter::Info);
        let _config = Logger::build_log_config(LevelFilter::Trace);
    }
}
