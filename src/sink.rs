//! Delivery of an encoded export.
//!
//! A sink receives exactly one [`ExportPayload`] per successful export and
//! nothing at all when the export fails or is cancelled.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::ExportError;

pub const CSV_MIME_TYPE: &str = "text/csv;charset=utf-8";

/// A finished CSV document ready for handoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub filename: String,
    pub mime_type: &'static str,
    pub content: Vec<u8>,
}

impl ExportPayload {
    pub fn csv(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: CSV_MIME_TYPE,
            content,
        }
    }
}

/// Boxed future returned by [`OutputSink::deliver`].
pub type DeliverFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ExportError>> + Send + 'a>>;

/// Destination of a finished export.
pub trait OutputSink: Send + Sync {
    /// Hands the payload over and returns a description of where it went.
    fn deliver<'a>(&'a self, payload: ExportPayload) -> DeliverFuture<'a>;
}

// ─────────────────────────────────────────────────────────────────────────────
// AtomicFileSink
// ─────────────────────────────────────────────────────────────────────────────

/// Writes the payload into a directory.
///
/// Content goes to a temporary file next to the destination which is
/// renamed into place once fully written. A failed write leaves nothing
/// behind and never replaces an existing file with partial content.
#[derive(Debug, Clone)]
pub struct AtomicFileSink {
    dir: PathBuf,
}

impl AtomicFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl OutputSink for AtomicFileSink {
    fn deliver<'a>(&'a self, payload: ExportPayload) -> DeliverFuture<'a> {
        Box::pin(async move {
            validate_filename(&payload.filename)?;
            let final_path = self.dir.join(&payload.filename);
            let dir = self.dir.clone();
            let size = payload.content.len();

            let written = tokio::task::spawn_blocking(move || {
                write_atomic_blocking(&dir, &final_path, &payload.content)
            })
            .await
            .map_err(|e| ExportError::Internal(format!("Task join error: {}", e)))??;

            info!("[SINK] Wrote {} bytes to {}", size, written.display());
            Ok(written.display().to_string())
        })
    }
}

fn validate_filename(filename: &str) -> Result<(), ExportError> {
    let invalid = filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains('/')
        || filename.contains('\\');
    if invalid {
        return Err(ExportError::Encoding(format!(
            "Invalid export filename: {:?}",
            filename
        )));
    }
    Ok(())
}

/// Blocking implementation of the temp-file-then-rename write.
fn write_atomic_blocking(dir: &Path, final_path: &Path, content: &[u8]) -> Result<PathBuf, ExportError> {
    let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
        ExportError::Encoding(format!("Failed to create temporary file: {}", e))
    })?;

    temp_file
        .write_all(content)
        .and_then(|_| temp_file.flush())
        .map_err(|e| ExportError::Encoding(format!("Failed to write export: {}", e)))?;

    temp_file.persist(final_path).map_err(|e| {
        ExportError::Encoding(format!(
            "Failed to persist file to {}: {}",
            final_path.display(),
            e.error
        ))
    })?;

    Ok(final_path.to_path_buf())
}

// ─────────────────────────────────────────────────────────────────────────────
// MemorySink
// ─────────────────────────────────────────────────────────────────────────────

/// Keeps delivered payloads in memory, for response streaming or tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<ExportPayload>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, oldest first.
    pub async fn payloads(&self) -> Vec<ExportPayload> {
        self.delivered.lock().await.clone()
    }

    /// Removes and returns the most recent payload.
    pub async fn take_last(&self) -> Option<ExportPayload> {
        self.delivered.lock().await.pop()
    }
}

impl OutputSink for MemorySink {
    fn deliver<'a>(&'a self, payload: ExportPayload) -> DeliverFuture<'a> {
        Box::pin(async move {
            let location = format!("memory:{}", payload.filename);
            self.delivered.lock().await.push(payload);
            Ok(location)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_sink_writes_payload() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let sink = AtomicFileSink::new(temp_dir.path());

        let location = sink
            .deliver(ExportPayload::csv("labels.csv", b"Name\nAda".to_vec()))
            .await
            .expect("deliver");

        let final_path = temp_dir.path().join("labels.csv");
        assert_eq!(location, final_path.display().to_string());
        assert_eq!(fs::read(&final_path).expect("read"), b"Name\nAda");

        // No temporary files left behind.
        let entries: Vec<_> = fs::read_dir(temp_dir.path())
            .expect("Failed to read dir")
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_file_sink_replaces_existing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("out.csv");
        fs::write(&final_path, "old content").expect("seed");

        let sink = AtomicFileSink::new(temp_dir.path());
        sink.deliver(ExportPayload::csv("out.csv", b"new".to_vec()))
            .await
            .expect("deliver");

        assert_eq!(fs::read_to_string(&final_path).expect("read"), "new");
    }

    #[tokio::test]
    async fn test_file_sink_rejects_path_components() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let sink = AtomicFileSink::new(temp_dir.path());

        for name in ["../escape.csv", "nested/out.csv", "a\\b.csv", "", ".."] {
            let err = sink
                .deliver(ExportPayload::csv(name, b"x".to_vec()))
                .await
                .unwrap_err();
            assert!(matches!(err, ExportError::Encoding(_)), "{:?} accepted", name);
        }

        let entries: Vec<_> = fs::read_dir(temp_dir.path())
            .expect("Failed to read dir")
            .collect();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_file_sink_missing_directory_fails_cleanly() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let sink = AtomicFileSink::new(temp_dir.path().join("does-not-exist"));

        let err = sink
            .deliver(ExportPayload::csv("out.csv", b"x".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Encoding(_)));
    }

    #[tokio::test]
    async fn test_memory_sink_records_payloads() {
        let sink = MemorySink::new();
        let location = sink
            .deliver(ExportPayload::csv("a.csv", b"x".to_vec()))
            .await
            .expect("deliver");

        assert_eq!(location, "memory:a.csv");
        let payloads = sink.payloads().await;
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].mime_type, CSV_MIME_TYPE);
        assert_eq!(sink.take_last().await.map(|p| p.filename), Some("a.csv".into()));
        assert!(sink.payloads().await.is_empty());
    }
}
