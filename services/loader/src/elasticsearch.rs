//! Elasticsearch `_bulk` sink with retry and failure classification.
//!
//! Each batch is sent as NDJSON `create` actions. Failures are sorted into:
//!
//! - transient (transport error, timeout, HTTP 429/5xx, per-item 429/5xx):
//!   the affected documents are re-sent with exponential backoff
//! - permanent per-item rejections (mapping or validation 4xx): logged with
//!   the document id, dropped and counted
//! - non-retryable request errors (auth, bad endpoint): the batch fails
//!
//! Documents are created with their own id, so a `409` seen on a retry means
//! an earlier attempt already landed and counts as written.

use crate::config::{Credentials, ElasticsearchConfig};
use crate::document::{index_name, BulkDocument};
use crate::error::LoaderError;
use crate::sink::{BatchOutcome, DocumentSink};
use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};

/// Cluster identity returned by the root endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterInfo {
    #[serde(default)]
    pub cluster_name: String,
    pub version: ClusterVersion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterVersion {
    pub number: String,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    status: u16,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl BulkItem {
    fn reason(&self) -> String {
        match &self.error {
            Some(err) => {
                let kind = err.get("type").and_then(|v| v.as_str()).unwrap_or("unknown");
                let reason = err.get("reason").and_then(|v| v.as_str()).unwrap_or("");
                format!("{kind}: {reason}")
            }
            None => format!("status {}", self.status),
        }
    }
}

/// What to do with one document after a bulk response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemDisposition {
    Written,
    Retry,
    Reject,
}

fn classify_item(status: u16, attempt: u32) -> ItemDisposition {
    match status {
        200..=299 => ItemDisposition::Written,
        409 if attempt > 0 => ItemDisposition::Written,
        429 | 500..=599 => ItemDisposition::Retry,
        _ => ItemDisposition::Reject,
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// One serialized document awaiting a successful write.
struct PendingDocument {
    id: String,
    index: String,
    source: String,
}

enum AttemptError {
    Transient(LoaderError),
    Fatal(String),
}

/// Bulk writer for an Elasticsearch-compatible endpoint.
pub struct ElasticsearchSink {
    client: Client,
    endpoint: String,
    credentials: Credentials,
    config: ElasticsearchConfig,
}

impl ElasticsearchSink {
    /// Create a sink for the given endpoint.
    pub fn new(
        endpoint: impl Into<String>,
        credentials: Credentials,
        config: ElasticsearchConfig,
    ) -> Result<Self, LoaderError> {
        config.validate()?;

        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(LoaderError::Configuration(
                "elasticsearch endpoint must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| LoaderError::Configuration(format!("failed to build HTTP client: {e}")))?;

        if !config.verify_ssl {
            warn!(endpoint = %endpoint, "TLS certificate verification disabled");
        }

        Ok(Self {
            client,
            endpoint,
            credentials,
            config,
        })
    }

    /// Index name for a tenant.
    pub fn index_for(&self, tenant_id: &str) -> String {
        index_name(&self.config.index_prefix, tenant_id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::None => request,
            Credentials::ApiKey(key) => request.header(AUTHORIZATION, format!("ApiKey {key}")),
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }

    /// Verify the endpoint is reachable and the credentials are accepted.
    pub async fn check_connection(&self) -> Result<ClusterInfo, LoaderError> {
        let response = self
            .authorize(self.client.get(format!("{}/", self.endpoint)))
            .send()
            .await
            .map_err(|e| LoaderError::Write(format!("connection failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoaderError::Configuration(format!(
                "cluster check returned {status}: {body}"
            )));
        }

        let info: ClusterInfo = response
            .json()
            .await
            .map_err(|e| LoaderError::Write(format!("invalid cluster info: {e}")))?;

        info!(
            endpoint = %self.endpoint,
            cluster = %info.cluster_name,
            version = %info.version.number,
            "Connected to document store"
        );

        Ok(info)
    }

    fn encode(&self, pending: &[PendingDocument]) -> String {
        let mut body = String::with_capacity(pending.iter().map(|d| d.source.len() + 96).sum());
        for doc in pending {
            let action = serde_json::json!({ "create": { "_index": doc.index, "_id": doc.id } });
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&doc.source);
            body.push('\n');
        }
        body
    }

    /// Send one bulk request and return the per-item statuses in order.
    async fn submit(&self, pending: &[PendingDocument]) -> Result<Vec<BulkItem>, AttemptError> {
        let mut url = format!("{}/_bulk", self.endpoint);
        if self.config.refresh {
            url.push_str("?refresh=true");
        }

        let response = self
            .authorize(self.client.post(url))
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(self.encode(pending))
            .send()
            .await
            .map_err(|e| AttemptError::Transient(LoaderError::Write(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("bulk request returned {status}: {body}");
            return Err(if is_transient_status(status) {
                AttemptError::Transient(LoaderError::Write(message))
            } else {
                AttemptError::Fatal(message)
            });
        }

        let parsed: BulkResponse = response.json().await.map_err(|e| {
            AttemptError::Transient(LoaderError::Write(format!("unreadable bulk response: {e}")))
        })?;

        if parsed.items.len() != pending.len() {
            return Err(AttemptError::Transient(LoaderError::Write(format!(
                "bulk response has {} items for {} documents",
                parsed.items.len(),
                pending.len()
            ))));
        }

        debug!(items = parsed.items.len(), errors = parsed.errors, "Bulk response received");

        Ok(parsed
            .items
            .into_iter()
            .map(|mut item| {
                item.remove("create")
                    .or_else(|| item.into_values().next())
                    .unwrap_or(BulkItem {
                        status: 500,
                        error: None,
                    })
            })
            .collect())
    }
}

#[async_trait]
impl<D: BulkDocument> DocumentSink<D> for ElasticsearchSink {
    #[instrument(skip(self, batch), fields(batch_size = batch.len()))]
    async fn write_batch(&self, batch: Vec<D>) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            submitted: batch.len(),
            ..Default::default()
        };

        let mut pending = Vec::with_capacity(batch.len());
        for doc in &batch {
            match serde_json::to_string(doc) {
                Ok(source) => pending.push(PendingDocument {
                    id: doc.document_id().to_string(),
                    index: self.index_for(doc.partition_key()),
                    source,
                }),
                Err(e) => {
                    error!(document_id = %doc.document_id(), error = %e, "Document could not be serialized");
                    outcome.dropped += 1;
                }
            }
        }
        drop(batch);

        let mut backoff = ExponentialBackoff {
            current_interval: self.config.initial_backoff(),
            initial_interval: self.config.initial_backoff(),
            max_interval: self.config.max_backoff(),
            max_elapsed_time: None,
            ..Default::default()
        };
        let mut attempt = 0u32;

        while !pending.is_empty() {
            let failure = match self.submit(&pending).await {
                Ok(items) => {
                    let mut retry = Vec::new();
                    for (doc, item) in pending.into_iter().zip(items) {
                        match classify_item(item.status, attempt) {
                            ItemDisposition::Written => outcome.succeeded += 1,
                            ItemDisposition::Retry => retry.push(doc),
                            ItemDisposition::Reject => {
                                let err = LoaderError::PermanentWrite {
                                    document_id: doc.id,
                                    reason: item.reason(),
                                };
                                error!(index = %doc.index, error = %err, "Document dropped");
                                outcome.dropped += 1;
                            }
                        }
                    }
                    pending = retry;
                    if pending.is_empty() {
                        break;
                    }
                    format!("{} documents rejected transiently", pending.len())
                }
                Err(AttemptError::Fatal(message)) => {
                    error!(
                        documents = pending.len(),
                        error = %message,
                        "Bulk request failed permanently"
                    );
                    outcome.failed += pending.len();
                    return outcome;
                }
                Err(AttemptError::Transient(e)) => e.to_string(),
            };

            attempt += 1;
            if attempt > self.config.max_retries {
                error!(
                    attempts = attempt,
                    documents = pending.len(),
                    error = %failure,
                    "Bulk retries exhausted, batch failed"
                );
                outcome.failed += pending.len();
                return outcome;
            }

            let delay = backoff.next_backoff().unwrap_or_else(|| self.config.max_backoff());
            warn!(
                attempt = attempt,
                delay_ms = delay.as_millis(),
                documents = pending.len(),
                error = %failure,
                "Bulk write incomplete, retrying"
            );
            outcome.retried += pending.len();
            tokio::time::sleep(delay).await;
        }

        outcome
    }

    fn name(&self) -> &'static str {
        "elasticsearch"
    }
}
