//! The sink abstraction every output implements.

use crate::document::BulkDocument;
use crate::error::LoaderError;
use async_trait::async_trait;

/// Result of writing one batch.
///
/// Counts are per document. A batch is considered failed when any document
/// was lost to exhausted retries or a non-retryable request error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub submitted: usize,
    pub succeeded: usize,
    /// Document re-submissions caused by transient failures
    pub retried: usize,
    /// Documents permanently rejected by the store and skipped
    pub dropped: usize,
    /// Documents not written because the batch gave up
    pub failed: usize,
}

impl BatchOutcome {
    /// Outcome for a batch that could not be written at all.
    pub fn all_failed(submitted: usize) -> Self {
        Self {
            submitted,
            failed: submitted,
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed > 0
    }
}

/// Destination for generated documents.
#[async_trait]
pub trait DocumentSink<D: BulkDocument>: Send + Sync {
    /// Write one batch. Failures are classified and reported in the outcome,
    /// never raised, so one bad batch does not stop the run.
    async fn write_batch(&self, batch: Vec<D>) -> BatchOutcome;

    /// Flush and release the sink once no further batches will arrive.
    async fn close(&self) -> Result<(), LoaderError> {
        Ok(())
    }

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_failed_outcome() {
        let outcome = BatchOutcome::all_failed(7);
        assert_eq!(outcome.submitted, 7);
        assert_eq!(outcome.failed, 7);
        assert_eq!(outcome.succeeded, 0);
        assert!(outcome.is_failed());
    }

    #[test]
    fn test_dropped_documents_do_not_fail_batch() {
        let outcome = BatchOutcome {
            submitted: 10,
            succeeded: 9,
            dropped: 1,
            ..Default::default()
        };
        assert!(!outcome.is_failed());
    }
}
