//! Serial line logger: reads newline-delimited data from a serial port, echoes
//! it to stdout and appends timestamped records to a CSV file.

pub mod config;
pub mod connection;
pub mod error;
pub mod log_file;
pub mod logger;
pub mod record;

pub use config::{Cli, Config};
pub use connection::{LineSource, ReadOutcome, SerialConnection};
pub use error::LoggerError;
pub use log_file::LogFile;
pub use logger::{run, LineLogger, RunSummary};
pub use record::Record;
