use crate::error::Result;
use crate::record::Record;
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

pub const RECORD_TERMINATOR: &str = "\r\n";

/// Append-only CSV log, held open for the whole run.
pub struct LogFile {
    path: PathBuf,
    file: File,
    appended: u64,
}

impl LogFile {
    pub async fn open_append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        info!("Appending records to {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file,
            appended: 0,
        })
    }

    /// Writes `timestamp,payload\r\n` with the payload bytes as received, and
    /// flushes before returning.
    pub async fn append(&mut self, record: &Record) -> Result<()> {
        let mut line = record.to_bytes();
        line.extend_from_slice(RECORD_TERMINATOR.as_bytes());
        self.file.write_all(&line).await?;
        self.file.flush().await?;
        self.appended += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appended(&self) -> u64 {
        self.appended
    }

    pub async fn close(mut self) -> Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        debug!(
            "Closed {} after {} records",
            self.path.display(),
            self.appended
        );
        Ok(())
    }
}
