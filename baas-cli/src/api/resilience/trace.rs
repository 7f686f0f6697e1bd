//! Append-only trace of batch responses and terminal errors

use std::path::Path;

use log::warn;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::api::error::ApiError;

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Timestamped line sink. Once closed, further records are dropped.
pub struct TraceSink {
    writer: Mutex<Option<Writer>>,
}

impl TraceSink {
    /// Open (or create) `path` for appending
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| ApiError::local_io(path, e))?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            writer: Mutex::new(Some(Box::new(writer))),
        }
    }

    /// Write and flush `{rfc3339 timestamp} {line}`. Failures are logged, not propagated.
    pub async fn record(&self, line: &str) {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return;
        };
        let entry = format!("{} {}\n", chrono::Utc::now().to_rfc3339(), line);
        // tokio::fs::File completes writes in the background until flushed
        let written = match writer.write_all(entry.as_bytes()).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!("Failed to write trace line: {}", e);
        }
    }

    /// Flush and close. Idempotent.
    pub async fn close(&self) {
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            if let Err(e) = writer.shutdown().await {
                warn!("Failed to close trace sink: {}", e);
            }
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.writer.lock().await.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lines_are_timestamped_and_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.log");
        tokio::fs::write(&path, "existing\n").await.unwrap();

        let sink = TraceSink::open(&path).await.unwrap();
        sink.record("first").await;
        sink.record("second").await;
        sink.close().await;

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "existing");
        assert!(lines[1].ends_with(" first"));
        assert!(chrono::DateTime::parse_from_rfc3339(lines[1].split(' ').next().unwrap()).is_ok());
        assert!(lines[2].ends_with(" second"));
    }

    #[tokio::test]
    async fn test_record_is_on_disk_without_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.log");
        let sink = TraceSink::open(&path).await.unwrap();

        for i in 0..50 {
            let line = format!("line {}", i);
            sink.record(&line).await;
            let content = std::fs::read_to_string(&path).unwrap();
            assert!(content.ends_with(&format!("{}\n", line)), "missing {:?}", line);
        }
        assert!(!sink.is_closed().await);
    }

    #[tokio::test]
    async fn test_closed_sink_drops_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.log");

        let sink = TraceSink::open(&path).await.unwrap();
        sink.record("kept").await;
        sink.close().await;
        assert!(sink.is_closed().await);
        sink.record("dropped").await;
        sink.close().await;

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.contains("kept"));
        assert!(!content.contains("dropped"));
    }
}
