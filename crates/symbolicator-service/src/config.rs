use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sentry::types::Dsn;
use serde::{Deserialize, Deserializer, Serialize, de};
use tracing::level_filters::LevelFilter;

/// Controls the log format
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect (pretty for tty, simplified for other)
    Auto,
    /// With colors
    Pretty,
    /// Simplified log output
    Simplified,
    /// Dump out JSON lines
    Json,
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// The log level for symbolication.
    #[serde(deserialize_with = "deserialize_level_filter")]
    pub level: LevelFilter,
    /// Controls the log format.
    pub format: LogFormat,
    /// When set to true, backtraces are forced on.
    pub enable_backtraces: bool,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
            enable_backtraces: true,
        }
    }
}

/// Control the metrics.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Metrics {
    /// host/port of statsd instance
    pub statsd: Option<String>,
    /// The prefix that should be added to all metrics.
    pub prefix: String,
    /// A map containing custom tags and their values.
    ///
    /// These tags will be appended to every metric.
    pub custom_tags: BTreeMap<String, String>,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            statsd: env::var("STATSD_SERVER").ok(),
            prefix: "symbolicator".into(),
            custom_tags: BTreeMap::new(),
        }
    }
}

/// Configuration of the process-wide in-memory symbol cache.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct SymbolCacheConfig {
    /// Maximum number of cached lookups. `0` disables the cache.
    ///
    /// Defaults to `100_000`.
    pub capacity: u64,

    /// Entries that were not accessed for this long are evicted.
    ///
    /// Defaults to `1h`.
    #[serde(with = "humantime_serde")]
    pub time_to_idle: Option<Duration>,
}

impl Default for SymbolCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            time_to_idle: Some(Duration::from_secs(3600)),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct CacheConfigs {
    /// Caches the results of the symbol provider across events.
    pub symbols: SymbolCacheConfig,
}

/// How instruction addresses are padded in the external representation of a backtrace.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddrPadding {
    /// Pad every address to the pointer width of the image it was resolved in.
    #[default]
    PointerWidth,
    /// Pad every address of a backtrace to the longest address within that backtrace.
    Longest,
}

/// Tunables of the symbolication engine.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct SymbolicationConfig {
    /// Upper bound for a single symbol provider call.
    ///
    /// A frame whose lookup exceeds this keeps its unresolved data.
    #[serde(with = "humantime_serde")]
    pub provider_timeout: Duration,

    /// Padding of addresses in the external representation.
    pub addr_padding: AddrPadding,

    /// Number of hex digits used for frames without a matched image.
    pub default_addr_width: usize,
}

impl Default for SymbolicationConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(5),
            addr_padding: AddrPadding::default(),
            default_addr_width: 8,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Configuration for internal logging.
    pub logging: Logging,

    /// Configuration for reporting metrics to a statsd instance.
    pub metrics: Metrics,

    /// DSN to report internal errors to
    pub sentry_dsn: Option<Dsn>,

    /// Fine-tune in-memory caches
    pub caches: CacheConfigs,

    /// Controls frame resolution and rendering.
    pub symbolication: SymbolicationConfig,
}

impl Config {
    pub fn get(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_reader(
                fs::File::open(path).context("failed to open configuration file")?,
            ),
            None => Ok(Config::default()),
        }
    }

    fn from_reader(mut reader: impl std::io::Read) -> Result<Self> {
        let mut config = String::new();
        reader
            .read_to_string(&mut config)
            .context("failed reading config file")?;
        // check for empty files explicitly
        if config.trim().is_empty() {
            anyhow::bail!("config file empty");
        }
        serde_yaml::from_str(&config).context("failed to parse config YAML")
    }
}

#[derive(Debug)]
struct LevelFilterVisitor;

impl de::Visitor<'_> for LevelFilterVisitor {
    type Value = LevelFilter;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> std::fmt::Result {
        write!(
            formatter,
            r#"one of the strings "off", "error", "warn", "info", "debug", or "trace""#
        )
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match v {
            "off" => Ok(LevelFilter::OFF),
            "error" => Ok(LevelFilter::ERROR),
            "warn" => Ok(LevelFilter::WARN),
            "info" => Ok(LevelFilter::INFO),
            "debug" => Ok(LevelFilter::DEBUG),
            "trace" => Ok(LevelFilter::TRACE),
            _ => Err(de::Error::unknown_variant(
                v,
                &["off", "error", "warn", "info", "debug", "trace"],
            )),
        }
    }
}

fn deserialize_level_filter<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<LevelFilter, D::Error> {
    deserializer.deserialize_str(LevelFilterVisitor)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_symbolication_config() {
        let cfg = Config::get(None).unwrap();
        assert_eq!(cfg.symbolication, SymbolicationConfig::default());
        assert_eq!(cfg.symbolication.addr_padding, AddrPadding::PointerWidth);

        let yaml = r#"
            symbolication:
              provider_timeout: 250ms
              addr_padding: longest
        "#;
        let cfg = Config::from_reader(yaml.as_bytes()).unwrap();
        assert_eq!(
            cfg.symbolication.provider_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(cfg.symbolication.addr_padding, AddrPadding::Longest);
        assert_eq!(cfg.symbolication.default_addr_width, 8);
    }

    #[test]
    fn test_cache_config() {
        let yaml = r#"
            caches:
              symbols:
                capacity: 10
        "#;
        let cfg = Config::from_reader(yaml.as_bytes()).unwrap();
        assert_eq!(cfg.caches.symbols.capacity, 10);
        assert_eq!(
            cfg.caches.symbols.time_to_idle,
            Some(Duration::from_secs(3600))
        );
    }

    #[test]
    fn test_disabling_expiry() {
        // It should be possible to set a cache value to `None` meaning "do not expire".
        let yaml = r#"
            caches:
              symbols:
                time_to_idle: null
        "#;
        let cfg = Config::from_reader(yaml.as_bytes()).unwrap();
        assert_eq!(cfg.caches.symbols.time_to_idle, None);
        assert_eq!(cfg.caches.symbols.capacity, 100_000);
    }

    #[test]
    fn test_logging_level() {
        let yaml = r#"
            logging:
              level: debug
              format: json
        "#;
        let cfg = Config::from_reader(yaml.as_bytes()).unwrap();
        assert_eq!(cfg.logging.level, LevelFilter::DEBUG);
        assert_eq!(cfg.logging.format, LogFormat::Json);

        let yaml = r#"
            logging:
              level: loud
        "#;
        assert!(Config::from_reader(yaml.as_bytes()).is_err());
    }

    #[test]
    fn test_unknown_fields() {
        // Unknown fields should not cause failure
        let yaml = r#"
            caches:
              not_a_cache:
                capacity: 1
        "#;
        let cfg = Config::from_reader(yaml.as_bytes());
        assert!(cfg.is_ok());
    }

    #[test]
    fn test_empty_file() {
        // Empty files aren't supported
        let yaml = r#""#;
        let result = Config::from_reader(yaml.as_bytes());
        assert!(result.is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "symbolication:\n  default_addr_width: 16").unwrap();

        let cfg = Config::get(Some(file.path())).unwrap();
        assert_eq!(cfg.symbolication.default_addr_width, 16);

        assert!(Config::get(Some(Path::new("/does/not/exist.yml"))).is_err());
    }
}
