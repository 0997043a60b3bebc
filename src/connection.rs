use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use log::{info, trace};
use std::mem;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::time::timeout;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Result of one bounded read attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes up to and including `\n`, or whatever arrived before the timeout
    Line(Vec<u8>),
    /// The timeout expired with nothing to report
    Empty,
    /// End of stream
    Closed,
}

/// Anything the line logger can poll for lines.
#[async_trait]
pub trait LineSource: Send {
    /// Waits at most one read timeout for the next line.
    ///
    /// Must be cancel safe: bytes received by an abandoned call are kept for
    /// the next one.
    async fn read_line(&mut self) -> Result<ReadOutcome>;
}

/// Line reader over a serial port (or any byte stream in tests).
pub struct SerialConnection<R = SerialStream> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    read_timeout: Duration,
    reassemble: bool,
}

impl SerialConnection<SerialStream> {
    /// Opens the configured port. Fails straight away if the device is
    /// missing, busy, or rejects the baud rate.
    pub fn open(config: &Config) -> Result<Self> {
        let port = tokio_serial::new(&config.port, config.baud_rate)
            .timeout(config.read_timeout())
            .open_native_async()?;

        info!(
            "Connected to serial port: {} at {} baud",
            config.port, config.baud_rate
        );

        Ok(Self::new(
            port,
            config.read_timeout(),
            config.reassemble_partial_lines,
        ))
    }
}

impl<R: AsyncRead + Unpin> SerialConnection<R> {
    pub fn new(stream: R, read_timeout: Duration, reassemble: bool) -> Self {
        Self {
            reader: BufReader::new(stream),
            pending: Vec::new(),
            read_timeout,
            reassemble,
        }
    }

    fn take_pending(&mut self) -> ReadOutcome {
        ReadOutcome::Line(mem::take(&mut self.pending))
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LineSource for SerialConnection<R> {
    async fn read_line(&mut self) -> Result<ReadOutcome> {
        // read_until appends partial bytes to `pending` even when the timeout
        // cancels it, so nothing is lost between attempts.
        let read = timeout(
            self.read_timeout,
            self.reader.read_until(b'\n', &mut self.pending),
        )
        .await;

        match read {
            Ok(Ok(0)) => {
                if self.pending.is_empty() {
                    info!("Serial connection closed");
                    Ok(ReadOutcome::Closed)
                } else {
                    Ok(self.take_pending())
                }
            }
            Ok(Ok(n)) => {
                trace!("Read {} bytes from serial port", n);
                Ok(self.take_pending())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_elapsed) => {
                if self.pending.is_empty() || self.reassemble {
                    Ok(ReadOutcome::Empty)
                } else {
                    trace!(
                        "Read timed out mid-line, emitting {} bytes",
                        self.pending.len()
                    );
                    Ok(self.take_pending())
                }
            }
        }
    }
}
