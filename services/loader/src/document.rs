//! Documents the loader knows how to route.

use serde::Serialize;

/// A serializable document with a stable id and a routing partition.
///
/// The partition is the tenant id; every tenant gets its own index.
pub trait BulkDocument: Serialize + Send + Sync + 'static {
    /// Stable document id, used as `_id` so retries stay idempotent.
    fn document_id(&self) -> &str;

    /// Routing key that selects the target index.
    fn partition_key(&self) -> &str;
}

/// Index name for a partition: `{prefix}-{partition without '-'}`.
pub fn index_name(prefix: &str, partition: &str) -> String {
    format!("{}-{}", prefix, partition.replace('-', "")).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_name_strips_dashes() {
        assert_eq!(index_name("camtrap-media", "tenant-001"), "camtrap-media-tenant001");
        assert_eq!(index_name("media", "acme"), "media-acme");
    }

    #[test]
    fn test_index_name_is_lowercase() {
        assert_eq!(index_name("media", "Tenant-A"), "media-tenanta");
    }
}
