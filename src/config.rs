use crate::error::LoggerError;
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: &str = "COM5";
pub const DEFAULT_BAUD_RATE: u32 = 115200;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_OUTPUT: &str = "cansatdata.csv";

#[derive(Parser, Debug, Default)]
#[clap(name = "serial-line-logger", version, about)]
pub struct Cli {
    /// Path to an optional TOML configuration file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Override serial port name (e.g. COM5, /dev/ttyUSB0)
    #[clap(long)]
    pub port: Option<String>,

    /// Override baud rate
    #[clap(long)]
    pub baud_rate: Option<u32>,

    /// Override log file path
    #[clap(long)]
    pub output: Option<PathBuf>,

    /// Override read timeout in milliseconds
    #[clap(long)]
    pub read_timeout_ms: Option<u64>,

    /// Print raw lines only, without timestamps or a log file
    #[clap(long)]
    pub no_timestamp: bool,

    /// Join lines split across read timeouts instead of emitting the fragments
    #[clap(long)]
    pub reassemble: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub port: String,
    pub baud_rate: u32,
    pub timestamp: bool,
    pub output: PathBuf,
    pub read_timeout_ms: u64,
    pub reassemble_partial_lines: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timestamp: true,
            output: PathBuf::from(DEFAULT_OUTPUT),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            reassemble_partial_lines: false,
        }
    }
}

impl Config {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.port.trim().is_empty() {
            return Err(LoggerError::Config("port must not be empty".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(LoggerError::Config("baud_rate must be positive".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(LoggerError::Config(
                "read_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config: Config = match cli.config {
        Some(ref path) => {
            let config_content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&config_content).context("Failed to parse config file")?
        }
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(ref port) = cli.port {
        config.port = port.clone();
    }

    if let Some(baud_rate) = cli.baud_rate {
        config.baud_rate = baud_rate;
    }

    if let Some(ref output) = cli.output {
        config.output = output.clone();
    }

    if let Some(read_timeout_ms) = cli.read_timeout_ms {
        config.read_timeout_ms = read_timeout_ms;
    }

    if cli.no_timestamp {
        config.timestamp = false;
    }

    if cli.reassemble {
        config.reassemble_partial_lines = true;
    }

    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_invocation() {
        let config = load_config(&Cli::default()).unwrap();
        assert_eq!(config.port, "COM5");
        assert_eq!(config.baud_rate, 115200);
        assert!(config.timestamp);
        assert_eq!(config.output, PathBuf::from("cansatdata.csv"));
        assert_eq!(config.read_timeout(), Duration::from_millis(100));
        assert!(!config.reassemble_partial_lines);
    }

    #[test]
    fn file_values_fill_missing_keys_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"/dev/ttyUSB0\"\nbaud_rate = 9600").unwrap();

        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            ..Cli::default()
        };
        let config = load_config(&cli).unwrap();
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert!(config.timestamp);
        assert_eq!(config.read_timeout_ms, DEFAULT_READ_TIMEOUT_MS);
    }

    #[test]
    fn cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"/dev/ttyUSB0\"\ntimestamp = true").unwrap();

        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            port: Some("/dev/ttyACM1".to_string()),
            output: Some(PathBuf::from("flight.csv")),
            no_timestamp: true,
            reassemble: true,
            ..Cli::default()
        };
        let config = load_config(&cli).unwrap();
        assert_eq!(config.port, "/dev/ttyACM1");
        assert_eq!(config.output, PathBuf::from("flight.csv"));
        assert!(!config.timestamp);
        assert!(config.reassemble_partial_lines);
    }

    #[test]
    fn rejects_zero_baud_rate() {
        let cli = Cli {
            baud_rate: Some(0),
            ..Cli::default()
        };
        let err = load_config(&cli).unwrap_err();
        assert!(err.to_string().contains("baud_rate"));
    }

    #[test]
    fn rejects_zero_timeout_and_empty_port() {
        let config = Config {
            read_timeout_ms: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(LoggerError::Config(_))));

        let config = Config {
            port: "  ".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(LoggerError::Config(_))));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/logger.toml")),
            ..Cli::default()
        };
        let err = load_config(&cli).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from([
            "serial-line-logger",
            "--port",
            "/dev/ttyUSB0",
            "--baud-rate",
            "57600",
            "--no-timestamp",
        ]);
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(cli.baud_rate, Some(57600));
        assert!(cli.no_timestamp);
        assert!(!cli.reassemble);
    }
}
