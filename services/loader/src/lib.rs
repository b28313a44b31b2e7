//! Camtrap Loader - batched, retried writes of generated documents.
//!
//! Batches arrive on a bounded channel and are written to a
//! [`DocumentSink`]: the Elasticsearch bulk API or a local file.
//!
//! # Example
//!
//! ```rust,no_run
//! use camtrap_loader::{drain, Credentials, ElasticsearchConfig, ElasticsearchSink};
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! # #[derive(serde::Serialize)] struct Doc { id: String, tenant: String }
//! # impl camtrap_loader::BulkDocument for Doc {
//! #     fn document_id(&self) -> &str { &self.id }
//! #     fn partition_key(&self) -> &str { &self.tenant }
//! # }
//! #[tokio::main]
//! async fn main() -> Result<(), camtrap_loader::LoaderError> {
//!     let config = ElasticsearchConfig::default();
//!     let sink = Arc::new(ElasticsearchSink::new(
//!         "https://localhost:9200",
//!         Credentials::ApiKey("key".into()),
//!         config,
//!     )?);
//!
//!     let (tx, rx) = mpsc::channel::<Vec<Doc>>(4);
//!     drop(tx);
//!     let report = drain(rx, sink, 2).await?;
//!     assert!(report.is_success());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod document;
pub mod drain;
pub mod elasticsearch;
pub mod error;
pub mod file_sink;
pub mod sink;

pub use config::{Credentials, ElasticsearchConfig};
pub use document::{index_name, BulkDocument};
pub use drain::{drain, LoadReport};
pub use elasticsearch::{ClusterInfo, ElasticsearchSink};
pub use error::LoaderError;
pub use file_sink::{FileFormat, FileSink};
pub use sink::{BatchOutcome, DocumentSink};

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use serde::Serialize;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Serialize)]
    pub struct TestDoc {
        pub id: String,
        pub tenant_id: String,
        pub value: u32,
    }

    impl TestDoc {
        pub fn batch(tenant: &str, n: usize) -> Vec<TestDoc> {
            (0..n)
                .map(|i| TestDoc {
                    id: format!("{tenant}-{i}"),
                    tenant_id: tenant.to_string(),
                    value: i as u32,
                })
                .collect()
        }
    }

    impl BulkDocument for TestDoc {
        fn document_id(&self) -> &str {
            &self.id
        }

        fn partition_key(&self) -> &str {
            &self.tenant_id
        }
    }

    /// In-memory sink that fails every batch routed to one partition.
    #[derive(Default)]
    pub struct MemorySink {
        documents: Mutex<Vec<TestDoc>>,
        failing_partition: Option<String>,
        closed: AtomicBool,
    }

    impl MemorySink {
        pub fn failing_partition(partition: &str) -> Self {
            Self {
                failing_partition: Some(partition.to_string()),
                ..Default::default()
            }
        }

        pub fn documents(&self) -> Vec<TestDoc> {
            self.documents.lock().unwrap().clone()
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentSink<TestDoc> for MemorySink {
        async fn write_batch(&self, batch: Vec<TestDoc>) -> BatchOutcome {
            let fails = batch
                .iter()
                .any(|d| Some(d.partition_key()) == self.failing_partition.as_deref());
            if fails {
                return BatchOutcome::all_failed(batch.len());
            }
            let outcome = BatchOutcome {
                submitted: batch.len(),
                succeeded: batch.len(),
                ..Default::default()
            };
            self.documents.lock().unwrap().extend(batch);
            outcome
        }

        async fn close(&self) -> Result<(), LoaderError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "memory"
        }
    }
}
