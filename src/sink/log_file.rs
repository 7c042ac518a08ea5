// Append-only event log

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::codec::Encoded;
use crate::config::SinkKind;
use crate::error::SinkError;
use crate::event::NormalizedEvent;

/// Appends one record per event. The file is reopened for every write, so it
/// can be rotated or deleted while the run is in progress.
pub struct LogFileSink {
    path: PathBuf,
}

impl LogFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append(&self, record: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(record)
    }
}

impl super::Sink for LogFileSink {
    fn kind(&self) -> SinkKind {
        SinkKind::LogFile
    }

    fn deliver(&mut self, event: &NormalizedEvent, payload: &Encoded) -> Result<(), SinkError> {
        let mut record = Vec::with_capacity(payload.len() + 128);
        match payload {
            Encoded::Text(text) => record.extend_from_slice(text.as_bytes()),
            Encoded::Binary(bytes) => {
                tracing::debug!("{} encoded as {} bytes", event.kind(), bytes.len());
                record.extend_from_slice(
                    format!("{} ({} bytes): ", event, bytes.len()).as_bytes(),
                );
                record.extend_from_slice(bytes);
            }
        }
        record.push(b'\n');

        self.append(&record).map_err(|source| SinkError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::sink::Sink;
    use tempfile::TempDir;

    #[test]
    fn test_text_records_are_one_per_line() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("events.log");
        let mut sink = LogFileSink::new(&path);
        let event = NormalizedEvent::new(EventKind::StartTest);

        sink.deliver(&event, &Encoded::Text("{\"a\":1}".to_string()))
            .expect("first");
        sink.deliver(&event, &Encoded::Text("{\"a\":2}".to_string()))
            .expect("second");

        let content = fs::read_to_string(&path).expect("read log");
        assert_eq!(content, "{\"a\":1}\n{\"a\":2}\n");
    }

    #[test]
    fn test_binary_record_has_summary_prefix() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("events.log");
        let mut sink = LogFileSink::new(&path);
        let mut event = NormalizedEvent::new(EventKind::EndTest);
        event.id = "1001".to_string();
        event.test_name = Some("T1".to_string());

        sink.deliver(&event, &Encoded::Binary(vec![1, 2, 3]))
            .expect("deliver");

        let content = fs::read(&path).expect("read log");
        let prefix = b"EndTest - T1 - 1001 (3 bytes): ";
        assert!(content.starts_with(prefix));
        assert_eq!(&content[prefix.len()..], &[1, 2, 3, b'\n']);
    }

    #[test]
    fn test_survives_file_removal() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("events.log");
        let mut sink = LogFileSink::new(&path);
        let event = NormalizedEvent::new(EventKind::StartRun);

        sink.deliver(&event, &Encoded::Text("one".to_string()))
            .expect("first");
        fs::remove_file(&path).expect("remove");
        sink.deliver(&event, &Encoded::Text("two".to_string()))
            .expect("second");

        assert_eq!(fs::read_to_string(&path).expect("read"), "two\n");
    }
}
