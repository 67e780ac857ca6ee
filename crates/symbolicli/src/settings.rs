use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use symbolicator_service::config::{AddrPadding, Config};
use tracing::level_filters::LevelFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Outputs the entire symbolication result in its external representation as JSON.
    Json,
    /// Outputs the first exception as a detailed list of frames.
    Pretty,
    /// Outputs the first exception as a table.
    Compact,
}

/// Padding of instruction addresses in JSON output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Padding {
    /// Pad to the pointer width of each frame's image.
    PointerWidth,
    /// Pad to the longest address of each stack.
    Longest,
}

impl From<Padding> for AddrPadding {
    fn from(padding: Padding) -> Self {
        match padding {
            Padding::PointerWidth => AddrPadding::PointerWidth,
            Padding::Longest => AddrPadding::Longest,
        }
    }
}

/// A utility that symbolicates Sentry event payloads locally.
///
/// Frames are resolved with a JSON symbol table passed via `--symbols`. Without one, frames
/// are only matched to images and classified.
///
/// The output format can be controlled with the `--format` option.
#[derive(Clone, Parser, Debug)]
#[command(author, version, about, long_about)]
struct Cli {
    /// Path to the event JSON to symbolicate.
    pub event: PathBuf,

    /// Path to a JSON symbol table used to resolve addresses.
    #[arg(long, short)]
    pub symbols: Option<PathBuf>,

    /// Path to a YAML configuration file.
    #[arg(long, short, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// The output format.
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Padding of instruction addresses in JSON output.
    ///
    /// Overrides `symbolication.addr_padding` of the configuration file.
    #[arg(long, value_enum)]
    padding: Option<Padding>,

    /// The severity level of logging output.
    ///
    /// Possible values:
    /// off, error, warn, info, debug, trace
    ///
    /// Overrides `logging.level` of the configuration file.
    #[arg(long)]
    log_level: Option<LevelFilter>,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub event: PathBuf,
    pub symbols: Option<PathBuf>,
    pub config: Config,
    pub output_format: OutputFormat,
}

impl Settings {
    pub fn get() -> Result<Self> {
        Self::from_cli(Cli::parse())
    }

    fn from_cli(cli: Cli) -> Result<Self> {
        let mut config = Config::get(cli.config.as_deref()).context("failed loading config")?;

        if let Some(level) = cli.log_level {
            config.logging.level = level;
        }
        if let Some(padding) = cli.padding {
            config.symbolication.addr_padding = padding.into();
        }

        Ok(Settings {
            event: cli.event,
            symbols: cli.symbols,
            config,
            output_format: cli.format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "symbolicli",
            "event.json",
            "--symbols",
            "symbols.json",
            "--format",
            "compact",
            "--padding",
            "longest",
            "--log-level",
            "debug",
        ]);
        let settings = Settings::from_cli(cli).unwrap();

        assert_eq!(settings.event, PathBuf::from("event.json"));
        assert_eq!(settings.symbols, Some(PathBuf::from("symbols.json")));
        assert_eq!(settings.output_format, OutputFormat::Compact);
        assert_eq!(settings.config.logging.level, LevelFilter::DEBUG);
        assert_eq!(
            settings.config.symbolication.addr_padding,
            AddrPadding::Longest
        );
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_cli(Cli::parse_from(["symbolicli", "event.json"])).unwrap();

        assert_eq!(settings.output_format, OutputFormat::Json);
        assert_eq!(settings.symbols, None);
        assert_eq!(settings.config.logging.level, LevelFilter::INFO);
    }
}
