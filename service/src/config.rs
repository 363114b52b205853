use chrono::{DateTime, Utc};
use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use hub::HubConfig;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

fn parse_watermark(value: &str) -> Result<DateTime<Utc>, String> {
    let watermark = DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))?;
    if watermark > Utc::now() {
        return Err(format!("{value} is in the future"));
    }
    Ok(watermark)
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,

    /// Seconds between dispatch ticks that push pending updates to open connections
    #[arg(long, env, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_interval_secs: u64,

    /// Upper bound in seconds on a single write to one client connection
    #[arg(long, env, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub write_timeout_secs: u64,

    /// RFC 3339 timestamp to start delivering updates from (defaults to startup time)
    #[arg(long, env, value_parser = parse_watermark)]
    pub initial_watermark: Option<DateTime<Utc>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Parse from an explicit argument list without consulting `.env`.
    pub fn from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Config::parse_from(args)
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.interface(), self.port)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            tick_interval: self.tick_interval(),
            initial_watermark: self.initial_watermark,
            write_timeout: self.write_timeout(),
        }
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_hub_defaults() {
        let config = Config::parse_from(["catalog_platform_rs"]);
        assert_eq!(config.listen_address(), "127.0.0.1:4000");
        assert_eq!(config.hub_config(), HubConfig::default());
        assert!(!config.is_production());
    }

    #[test]
    fn test_hub_settings_from_flags() {
        let config = Config::parse_from([
            "catalog_platform_rs",
            "--tick-interval-secs",
            "2",
            "--write-timeout-secs",
            "3",
            "--initial-watermark",
            "2024-05-01T12:00:00+02:00",
            "--runtime-env",
            "PRODUCTION",
        ]);

        let hub_config = config.hub_config();
        assert_eq!(hub_config.tick_interval, Duration::from_secs(2));
        assert_eq!(hub_config.write_timeout, Duration::from_secs(3));
        assert_eq!(
            hub_config.initial_watermark.map(|w| w.to_rfc3339()),
            Some("2024-05-01T10:00:00+00:00".to_string())
        );
        assert!(config.is_production());
    }

    #[test]
    fn test_rejects_zero_tick_interval_and_bad_watermark() {
        assert!(
            Config::try_parse_from(["catalog_platform_rs", "--tick-interval-secs", "0"]).is_err()
        );
        assert!(
            Config::try_parse_from(["catalog_platform_rs", "--initial-watermark", "yesterday"])
                .is_err()
        );
    }

    #[test]
    fn test_rejects_future_watermark() {
        let tomorrow = (Utc::now() + chrono::Duration::days(1)).to_rfc3339();
        assert!(
            Config::try_parse_from(["catalog_platform_rs", "--initial-watermark", &tomorrow])
                .is_err()
        );
    }

    #[test]
    fn test_rust_env_parsing() {
        assert_eq!("Staging".parse::<RustEnv>(), Ok(RustEnv::Staging));
        assert_eq!("qa".parse::<RustEnv>(), Err(RustEnvParseError));
        assert_eq!(RustEnv::Production.to_string(), "production");
    }
}
