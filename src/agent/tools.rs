//! Tool-set assembly.
//!
//! Builds the tool list handed to the responses API from an agent's
//! knowledge bases and remote tool server entries, with optional per-call
//! identity propagation and allow-list filtering.

use crate::config::McpServerConfig;
use crate::knowledge::KnowledgeResolver;
use crate::llm::ToolDescriptor;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Header carrying the acting user's identity to remote tool servers,
/// out-of-band of the conversation content.
pub const IDENTITY_HEADER: &str = "AUTHORITATIVE_USER_ID";

/// Default approval policy for remote tool servers.
const DEFAULT_APPROVAL: &str = "never";

/// Assembles tool descriptor lists for provider invocations.
pub struct ToolSetBuilder {
    resolver: Arc<dyn KnowledgeResolver>,
}

impl ToolSetBuilder {
    /// Create a builder over the given knowledge resolver.
    #[must_use]
    pub fn new(resolver: Arc<dyn KnowledgeResolver>) -> Self {
        Self { resolver }
    }

    /// Build the tool list for one call.
    ///
    /// Knowledge bases that fail to resolve degrade to their raw name. All
    /// resolved identifiers aggregate into a single file-search descriptor.
    /// Remote server entries missing a name or URI are skipped; a bad entry
    /// never aborts the remaining entries. A call-time `allowed_tools` list
    /// overrides any allow-list in the server's own config.
    pub async fn build(
        &self,
        kb_names: &[String],
        servers: &[McpServerConfig],
        caller_identity: Option<&str>,
        allowed_tools: Option<&[String]>,
    ) -> Vec<ToolDescriptor> {
        let mut tools = Vec::new();

        if !kb_names.is_empty() {
            let mut vector_store_ids = Vec::with_capacity(kb_names.len());
            for kb_name in kb_names {
                match self.resolver.vector_store_id(kb_name).await {
                    Ok(id) => vector_store_ids.push(id),
                    Err(err) => {
                        warn!(
                            kb = %kb_name,
                            error = %err,
                            "Vector store lookup failed, using knowledge base name as identifier"
                        );
                        vector_store_ids.push(kb_name.clone());
                    }
                }
            }

            if !vector_store_ids.is_empty() {
                tools.push(ToolDescriptor::FileSearch { vector_store_ids });
            }
        }

        for server in servers {
            let (Some(name), Some(uri)) = (
                server.name.as_deref().filter(|n| !n.is_empty()),
                server.uri.as_deref().filter(|u| !u.is_empty()),
            ) else {
                warn!(server = ?server, "Skipping remote tool server with missing name or uri");
                continue;
            };

            let headers = caller_identity.map(|identity| {
                HashMap::from([(IDENTITY_HEADER.to_string(), identity.to_string())])
            });

            // A call-time allow-list wins over the server's own config.
            let allowed = allowed_tools
                .map(<[String]>::to_vec)
                .or_else(|| server.allowed_tools.clone());

            tools.push(ToolDescriptor::Mcp {
                server_label: name.to_string(),
                server_url: uri.to_string(),
                require_approval: server
                    .require_approval
                    .clone()
                    .unwrap_or_else(|| DEFAULT_APPROVAL.to_string()),
                headers,
                allowed_tools: allowed,
            });
        }

        debug!(count = tools.len(), "Built tools array");
        tools
    }
}
