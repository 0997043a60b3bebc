use chrono::{DateTime, Local, NaiveDateTime};
use std::borrow::Cow;

/// Timestamp layout written in front of each record: `DD/MM/YYYY,HH:MM:SS`.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y,%H:%M:%S";

/// A single line captured from the serial connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Local wall-clock time in `TIMESTAMP_FORMAT`, if timestamping is on
    pub timestamp: Option<String>,
    /// Received bytes with the line terminator removed
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(timestamp: Option<String>, payload: Vec<u8>) -> Self {
        Self { timestamp, payload }
    }

    /// Builds a record from raw bytes, stamping it with the current time when asked.
    pub fn from_bytes(bytes: &[u8], with_timestamp: bool) -> Self {
        let timestamp = with_timestamp.then(|| format_timestamp(Local::now()));
        Self::new(timestamp, strip_terminator(bytes).to_vec())
    }

    /// Payload for display; bytes that are not UTF-8 show as U+FFFD.
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Stored form: `timestamp,payload` with the payload bytes untouched.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut line = Vec::with_capacity(self.payload.len() + 20);
        if let Some(ref timestamp) = self.timestamp {
            line.extend_from_slice(timestamp.as_bytes());
            line.push(b',');
        }
        line.extend_from_slice(&self.payload);
        line
    }

    /// Console form, `timestamp,payload` or just `payload`.
    pub fn to_line(&self) -> String {
        match self.timestamp {
            Some(ref timestamp) => format!("{},{}", timestamp, self.payload_text()),
            None => self.payload_text().into_owned(),
        }
    }

    /// Recovers a timestamped record from a stored log line.
    ///
    /// The timestamp itself contains a comma, so the payload starts after the
    /// second comma. Commas and non-UTF-8 bytes inside the payload are kept.
    pub fn parse(line: &[u8]) -> Option<Self> {
        let line = strip_terminator(line);
        let mut fields = line.splitn(3, |&b| b == b',');
        let date = std::str::from_utf8(fields.next()?).ok()?;
        let time = std::str::from_utf8(fields.next()?).ok()?;
        let payload = fields.next()?;

        let timestamp = format!("{},{}", date, time);
        NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT).ok()?;

        Some(Self::new(Some(timestamp), payload.to_vec()))
    }
}

pub fn format_timestamp(now: DateTime<Local>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Drops any trailing `\r`/`\n` bytes.
pub fn strip_terminator(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != b'\r' && b != b'\n')
        .map_or(0, |i| i + 1);
    &bytes[..end]
}
