//! Store into several sinks at once

use anyhow::Result;
use tracing::{debug, info, warn};
use wcap_core::{CaptureRecord, CaptureSink};

use crate::SinkError;

/// Stores into every sink in order. The first sink is the primary: the
/// returned id is always its id, and its failure is the store's failure
/// even when a secondary kept a copy. Secondary failures are logged only.
pub struct FanoutSink {
    sinks: Vec<Box<dyn CaptureSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn CaptureSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Name of the sink whose id is returned
    pub fn primary(&self) -> Option<&str> {
        self.sinks.first().map(|sink| sink.name())
    }
}

#[async_trait::async_trait]
impl CaptureSink for FanoutSink {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn store(&self, record: &CaptureRecord) -> Result<i64> {
        let Some((primary, secondaries)) = self.sinks.split_first() else {
            return Err(SinkError::NoSinks.into());
        };

        let outcome = primary.store(record).await;
        let mut copies = 0;
        for sink in secondaries {
            match sink.store(record).await {
                Ok(id) => {
                    copies += 1;
                    debug!(sink = sink.name(), id, "Copy stored");
                }
                Err(e) => warn!(sink = sink.name(), error = %e, "Secondary sink failed"),
            }
        }

        match outcome {
            Ok(id) => {
                info!(sink = primary.name(), id, copies, "Capture stored");
                Ok(id)
            }
            Err(e) => {
                warn!(sink = primary.name(), error = %e, copies, "Primary sink failed");
                Err(e)
            }
        }
    }
}
