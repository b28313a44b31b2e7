//! Local file output, used instead of the document store.

use crate::document::BulkDocument;
use crate::error::LoaderError;
use crate::sink::{BatchOutcome, DocumentSink};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{error, info};

/// Layout of the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// A single pretty-printed JSON array
    JsonArray,
    /// One compact document per line
    Ndjson,
}

impl FileFormat {
    /// `.ndjson` and `.jsonl` select NDJSON; anything else is a JSON array.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("ndjson") | Some("jsonl") => FileFormat::Ndjson,
            _ => FileFormat::JsonArray,
        }
    }
}

struct FileState {
    writer: Option<BufWriter<File>>,
    written: usize,
}

/// Streams documents to a file as batches arrive.
pub struct FileSink {
    path: PathBuf,
    format: FileFormat,
    state: Mutex<FileState>,
}

impl FileSink {
    /// Create (or truncate) the output file.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, LoaderError> {
        let path = path.as_ref().to_path_buf();
        let format = FileFormat::from_path(&path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut writer = BufWriter::new(File::create(&path).await?);
        if format == FileFormat::JsonArray {
            writer.write_all(b"[").await?;
        }

        info!(path = %path.display(), format = ?format, "Writing documents to file");

        Ok(Self {
            path,
            format,
            state: Mutex::new(FileState {
                writer: Some(writer),
                written: 0,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append<D: BulkDocument>(&self, batch: &[D], written_now: &mut usize) -> Result<(), LoaderError> {
        let mut state = self.state.lock().await;
        let FileState { writer, written } = &mut *state;
        let writer = writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "file sink already closed"))?;

        for doc in batch {
            match self.format {
                FileFormat::JsonArray => {
                    let separator: &[u8] = if *written == 0 { b"\n" } else { b",\n" };
                    writer.write_all(separator).await?;
                    writer.write_all(&serde_json::to_vec_pretty(doc)?).await?;
                }
                FileFormat::Ndjson => {
                    writer.write_all(&serde_json::to_vec(doc)?).await?;
                    writer.write_all(b"\n").await?;
                }
            }
            *written += 1;
            *written_now += 1;
        }

        Ok(())
    }
}

#[async_trait]
impl<D: BulkDocument> DocumentSink<D> for FileSink {
    async fn write_batch(&self, batch: Vec<D>) -> BatchOutcome {
        let mut written_now = 0;
        match self.append(&batch, &mut written_now).await {
            Ok(()) => BatchOutcome {
                submitted: batch.len(),
                succeeded: written_now,
                ..Default::default()
            },
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to write batch to file");
                BatchOutcome {
                    submitted: batch.len(),
                    succeeded: written_now,
                    failed: batch.len() - written_now,
                    ..Default::default()
                }
            }
        }
    }

    async fn close(&self) -> Result<(), LoaderError> {
        let mut state = self.state.lock().await;
        if let Some(mut writer) = state.writer.take() {
            if self.format == FileFormat::JsonArray {
                writer.write_all(b"\n]\n").await?;
            }
            writer.flush().await?;
            info!(path = %self.path.display(), documents = state.written, "File output complete");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
