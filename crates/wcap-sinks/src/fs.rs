//! Per-day image files under the output root

use anyhow::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use wcap_core::{CaptureRecord, CaptureSink};

use crate::{date_key, SinkError, SinkResult};

/// Writes `<root>/images/YYYY-MM-DD/HH-MM-SS.<ext>`
pub struct FsSink {
    images: PathBuf,
    written: AtomicI64,
}

impl FsSink {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            images: root.as_ref().join("images"),
            written: AtomicI64::new(0),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images
    }

    /// Where `record` is written
    pub fn path_for(&self, record: &CaptureRecord) -> PathBuf {
        let file = format!(
            "{}.{}",
            record.capture_time().format("%H-%M-%S"),
            extension(&record.image_format)
        );
        self.images.join(date_key(record.capture_date())).join(file)
    }

    async fn write(&self, record: &CaptureRecord) -> SinkResult<PathBuf> {
        let path = self.path_for(record);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(SinkError::Duplicate {
                    date: record.capture_date(),
                    time: record.capture_time(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&record.image).await?;
        file.flush().await?;
        Ok(path)
    }
}

fn extension(format: &str) -> &str {
    match format {
        "jpeg" | "jpg" => "jpg",
        "" => "bin",
        other => other,
    }
}

#[async_trait::async_trait]
impl CaptureSink for FsSink {
    fn name(&self) -> &str {
        "filesystem"
    }

    #[instrument(skip(self, record), fields(captured_at = %record.captured_at))]
    async fn store(&self, record: &CaptureRecord) -> Result<i64> {
        let path = self.write(record).await?;
        let id = self.written.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(id, path = %path.display(), bytes = record.image.len(), "Capture image written");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::both;

    #[tokio::test]
    async fn test_writes_per_day_layout() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::new(dir.path());
        let record = both("2024-12-15 10:20:30");

        let id = sink.store(&record).await.unwrap();

        assert_eq!(id, 1);
        let path = dir.path().join("images").join("2024-12-15").join("10-20-30.jpg");
        assert_eq!(sink.path_for(&record), path);
        assert_eq!(std::fs::read(&path).unwrap(), record.image);
    }

    #[tokio::test]
    async fn test_counter_increases() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::new(dir.path());
        assert_eq!(sink.store(&both("2024-12-15 10:20:30")).await.unwrap(), 1);
        assert_eq!(sink.store(&both("2024-12-15 10:30:30")).await.unwrap(), 2);
        assert_eq!(sink.store(&both("2024-12-16 00:00:00")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_existing_file_is_a_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::new(dir.path());
        sink.store(&both("2024-12-15 10:20:30")).await.unwrap();

        let err = sink.store(&both("2024-12-15 10:20:30")).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<SinkError>(), Some(SinkError::Duplicate { .. })));
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("jpeg"), "jpg");
        assert_eq!(extension("png"), "png");
    }
}
