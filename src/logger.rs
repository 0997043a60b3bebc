use crate::config::Config;
use crate::connection::{LineSource, ReadOutcome, SerialConnection};
use crate::error::Result;
use crate::log_file::LogFile;
use crate::record::Record;
use log::{debug, info};
use std::future::Future;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Counters reported when a run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records: u64,
    pub empty_reads: u64,
}

/// Polls a line source and echoes each line to the console. With a log file,
/// lines are timestamped and appended to it; without one, they are printed raw.
pub struct LineLogger<S, W> {
    source: S,
    console: W,
    log_file: Option<LogFile>,
    summary: RunSummary,
}

impl<S, W> LineLogger<S, W>
where
    S: LineSource,
    W: AsyncWrite + Unpin,
{
    pub fn new(source: S, console: W, log_file: Option<LogFile>) -> Self {
        Self {
            source,
            console,
            log_file,
            summary: RunSummary::default(),
        }
    }

    /// Runs until `shutdown` resolves or the source closes.
    ///
    /// The log file is flushed and released on every exit path, including errors.
    pub async fn run<F>(mut self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let result = loop {
            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                outcome = self.source.read_line() => Some(outcome),
            };

            let outcome = match outcome {
                Some(Ok(outcome)) => outcome,
                Some(Err(e)) => break Err(e),
                None => {
                    info!("Shutdown requested");
                    break Ok(());
                }
            };

            match outcome {
                ReadOutcome::Line(bytes) => {
                    if let Err(e) = self.handle_line(&bytes).await {
                        break Err(e);
                    }
                }
                ReadOutcome::Empty => self.summary.empty_reads += 1,
                ReadOutcome::Closed => break Ok(()),
            }
        };

        let closed = self.finish().await;
        result?;
        closed?;

        info!("Logged {} records", self.summary.records);
        Ok(self.summary)
    }

    async fn handle_line(&mut self, bytes: &[u8]) -> Result<()> {
        // Only a read with no bytes is empty; a bare terminator is a blank record.
        if bytes.is_empty() {
            self.summary.empty_reads += 1;
            return Ok(());
        }

        let record = Record::from_bytes(bytes, self.log_file.is_some());

        let line = record.to_line();
        self.console.write_all(line.as_bytes()).await?;
        self.console.write_all(b"\n").await?;
        self.console.flush().await?;

        if let Some(ref mut log_file) = self.log_file {
            log_file.append(&record).await?;
        }

        self.summary.records += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.console.flush().await?;
        if let Some(log_file) = self.log_file.take() {
            debug!(
                "Closing {} ({} records appended)",
                log_file.path().display(),
                log_file.appended()
            );
            log_file.close().await?;
        }
        Ok(())
    }
}

/// Opens the configured port and, if timestamping, the log file, then logs
/// to stdout until `shutdown` resolves.
///
/// The port is opened first, so a bad port never touches the log file.
pub async fn run<F>(config: &Config, shutdown: F) -> Result<RunSummary>
where
    F: Future<Output = ()>,
{
    config.validate()?;

    let connection = SerialConnection::open(config)?;

    let log_file = open_log_file(config).await?;

    LineLogger::new(connection, tokio::io::stdout(), log_file)
        .run(shutdown)
        .await
}

/// The log file is only touched when timestamping is enabled.
pub async fn open_log_file(config: &Config) -> Result<Option<LogFile>> {
    if config.timestamp {
        Ok(Some(LogFile::open_append(&config.output).await?))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_log_file_without_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            timestamp: false,
            output: dir.path().join("cansatdata.csv"),
            ..Config::default()
        };

        assert!(open_log_file(&config).await.unwrap().is_none());
        assert!(!config.output.exists());
    }

    #[tokio::test]
    async fn log_file_created_with_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output: dir.path().join("cansatdata.csv"),
            ..Config::default()
        };

        let log_file = open_log_file(&config).await.unwrap();
        assert_eq!(log_file.as_ref().map(LogFile::path), Some(config.output.as_path()));
        assert!(config.output.exists());
    }
}
