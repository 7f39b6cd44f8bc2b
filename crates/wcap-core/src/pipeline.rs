use anyhow::Result;

use crate::CaptureRecord;

/// Destination for finished captures (database row, image file, ...).
///
/// Returns the identifier generated by the store.
#[async_trait::async_trait]
pub trait CaptureSink: Send + Sync {
    fn name(&self) -> &str;

    async fn store(&self, record: &CaptureRecord) -> Result<i64>;
}
