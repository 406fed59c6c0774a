//! Knowledge-base name resolution.
//!
//! Maps human-readable knowledge-base names to vector-store identifiers.
//! Successful resolutions are cached with a TTL so per-call tool rebuilds
//! do not re-list the stack's vector stores.

use crate::llm::{LlmError, StackClient, VectorStoreEntry};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Time-to-live for cached name resolutions.
const CACHE_TTL_SECS: u64 = 300;
/// Maximum number of cached resolutions.
const CACHE_MAX_CAPACITY: u64 = 1024;

/// Resolves a knowledge-base name to a vector-store identifier.
///
/// Callers decide how to degrade on failure; the tool builder falls back to
/// the raw name rather than failing the call.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait KnowledgeResolver: Send + Sync {
    /// Resolve `kb_name` to a vector-store identifier.
    async fn vector_store_id(&self, kb_name: &str) -> Result<String, LlmError>;
}

/// Stack-backed resolver with a TTL cache over successful lookups.
pub struct StackKnowledgeResolver {
    client: Arc<StackClient>,
    cache: Cache<String, String>,
}

impl StackKnowledgeResolver {
    /// Create a resolver over the given stack client.
    #[must_use]
    pub fn new(client: Arc<StackClient>) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_MAX_CAPACITY)
            .time_to_live(Duration::from_secs(CACHE_TTL_SECS))
            .build();

        Self { client, cache }
    }
}

/// Pick the store matching `kb_name` from a listing: the name must contain
/// the knowledge-base name, and among matches the most recently created
/// store wins.
fn select_store(stores: &[VectorStoreEntry], kb_name: &str) -> Option<String> {
    stores
        .iter()
        .filter(|vs| {
            vs.name
                .as_deref()
                .is_some_and(|name| name.contains(kb_name))
        })
        .max_by_key(|vs| vs.created_at.unwrap_or(0))
        .and_then(|vs| vs.id.clone())
}

#[async_trait::async_trait]
impl KnowledgeResolver for StackKnowledgeResolver {
    async fn vector_store_id(&self, kb_name: &str) -> Result<String, LlmError> {
        if let Some(id) = self.cache.get(kb_name).await {
            debug!(kb = kb_name, id = %id, "Vector store resolved from cache");
            return Ok(id);
        }

        let stores = self.client.list_vector_stores().await?;
        let id = select_store(&stores, kb_name).ok_or_else(|| {
            LlmError::ApiError(format!("no vector store matches knowledge base '{kb_name}'"))
        })?;

        info!(kb = kb_name, id = %id, "Resolved knowledge base to vector store");
        self.cache.insert(kb_name.to_string(), id.clone()).await;
        Ok(id)
    }
}
