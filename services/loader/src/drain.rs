//! Consumes batches from the generation channel and writes them to a sink.

use crate::document::BulkDocument;
use crate::error::LoaderError;
use crate::sink::{BatchOutcome, DocumentSink};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Aggregate result of a load run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub batches: u64,
    pub failed_batches: u64,
    pub succeeded: u64,
    pub retried: u64,
    pub dropped: u64,
    pub failed: u64,
}

impl LoadReport {
    fn record(&mut self, outcome: &BatchOutcome) {
        self.batches += 1;
        self.succeeded += outcome.succeeded as u64;
        self.retried += outcome.retried as u64;
        self.dropped += outcome.dropped as u64;
        self.failed += outcome.failed as u64;
        if outcome.is_failed() {
            self.failed_batches += 1;
        }
    }

    /// True when no batch permanently failed.
    pub fn is_success(&self) -> bool {
        self.failed_batches == 0
    }
}

/// Write every batch received on `rx` to `sink`, at most `concurrency`
/// batches at a time, then close the sink.
///
/// Returns once the sending side has been dropped and all in-flight batches
/// have completed.
pub async fn drain<D, S>(
    rx: mpsc::Receiver<Vec<D>>,
    sink: Arc<S>,
    concurrency: usize,
) -> Result<LoadReport, LoaderError>
where
    D: BulkDocument,
    S: DocumentSink<D> + ?Sized + 'static,
{
    let sink_name = sink.name();
    info!(sink = sink_name, concurrency = concurrency, "Loader started");

    let writer = sink.clone();
    let mut outcomes = ReceiverStream::new(rx)
        .map(move |batch| {
            let sink = writer.clone();
            async move {
                let started = Instant::now();
                let outcome = sink.write_batch(batch).await;
                (outcome, started.elapsed())
            }
        })
        .buffer_unordered(concurrency.max(1));

    let mut report = LoadReport::default();
    while let Some((outcome, elapsed)) = outcomes.next().await {
        report.record(&outcome);

        metrics::histogram!("loader.batch.duration_seconds").record(elapsed.as_secs_f64());
        metrics::counter!("loader.documents.written").increment(outcome.succeeded as u64);
        metrics::counter!("loader.documents.retried").increment(outcome.retried as u64);
        metrics::counter!("loader.documents.dropped").increment(outcome.dropped as u64);

        if outcome.is_failed() {
            metrics::counter!("loader.batches.failed").increment(1);
            warn!(
                sink = sink_name,
                submitted = outcome.submitted,
                failed = outcome.failed,
                "Batch failed"
            );
        } else {
            debug!(
                sink = sink_name,
                written = outcome.succeeded,
                dropped = outcome.dropped,
                elapsed_ms = elapsed.as_millis(),
                "Batch written"
            );
        }
    }

    sink.close().await?;

    info!(
        sink = sink_name,
        batches = report.batches,
        succeeded = report.succeeded,
        retried = report.retried,
        dropped = report.dropped,
        failed_batches = report.failed_batches,
        "Loader finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemorySink, TestDoc};

    #[tokio::test]
    async fn test_drain_aggregates_batches() {
        let (tx, rx) = mpsc::channel(2);
        let sink = Arc::new(MemorySink::default());

        let producer = tokio::spawn(async move {
            for tenant in ["tenant-001", "tenant-002", "tenant-003"] {
                tx.send(TestDoc::batch(tenant, 5)).await.unwrap();
            }
        });

        let report = drain(rx, sink.clone(), 2).await.unwrap();
        producer.await.unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.succeeded, 15);
        assert!(report.is_success());
        assert_eq!(sink.documents().len(), 15);
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_failed_batch_is_reported_and_run_continues() {
        let (tx, rx) = mpsc::channel(4);
        let sink = Arc::new(MemorySink::failing_partition("tenant-bad"));

        tx.send(TestDoc::batch("tenant-001", 2)).await.unwrap();
        tx.send(TestDoc::batch("tenant-bad", 3)).await.unwrap();
        tx.send(TestDoc::batch("tenant-002", 2)).await.unwrap();
        drop(tx);

        let report = drain(rx, sink.clone(), 1).await.unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.failed, 3);
        assert_eq!(report.succeeded, 4);
        assert!(!report.is_success());
    }

    #[test]
    fn test_empty_channel_yields_empty_report() {
        let (tx, rx) = mpsc::channel::<Vec<TestDoc>>(1);
        drop(tx);
        let sink = Arc::new(MemorySink::default());

        let report = tokio_test::block_on(drain(rx, sink.clone(), 1)).unwrap();
        assert_eq!(report, LoadReport::default());
        assert!(sink.is_closed());
    }
}
