//! Agent registry and lookup.
//!
//! Owns every configured agent. Lookup is by exact name, with a deliberate
//! best-effort fallback to the first registered agent when the name is
//! unknown; only an empty registry fails.

use crate::agent::{Agent, AgentError};
use crate::config::{AgentConfig, AgentsFile, ConfigFileError, Settings};
use crate::knowledge::KnowledgeResolver;
use crate::llm::{ModerationProvider, ResponsesProvider};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while building or querying the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry holds no agents at all.
    #[error("no agents are configured")]
    NoAgents,
    /// The agent configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigFileError),
    /// One configured agent failed to build.
    #[error("failed to build agent '{name}'")]
    Agent {
        /// Name of the failing agent entry.
        name: String,
        /// Underlying construction error.
        #[source]
        source: AgentError,
    },
}

/// The set of configured agents, in registration order.
pub struct AgentRegistry {
    agents: Vec<(String, Arc<Agent>)>,
}

impl AgentRegistry {
    /// Build the registry from `agents.yaml` in the configured directory.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` when the file cannot be loaded or an agent
    /// fails to build.
    pub async fn from_settings(
        settings: &Settings,
        responses: Arc<dyn ResponsesProvider>,
        moderation: Arc<dyn ModerationProvider>,
        resolver: Arc<dyn KnowledgeResolver>,
    ) -> Result<Self, RegistryError> {
        let path = Path::new(&settings.agent_config_dir).join("agents.yaml");
        let file = AgentsFile::load(&path)?;
        info!(path = %path.display(), entries = file.agents.len(), "Loaded agent configuration");
        Self::from_configs(file.agents, settings, responses, moderation, resolver).await
    }

    /// Build the registry from already-parsed agent configurations. Entries
    /// without a name are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Agent` when a named entry fails to build.
    pub async fn from_configs(
        configs: Vec<AgentConfig>,
        settings: &Settings,
        responses: Arc<dyn ResponsesProvider>,
        moderation: Arc<dyn ModerationProvider>,
        resolver: Arc<dyn KnowledgeResolver>,
    ) -> Result<Self, RegistryError> {
        let mut agents = Vec::new();

        for config in configs {
            let Some(name) = config.name.clone().filter(|n| !n.is_empty()) else {
                debug!("Skipping agent entry without a name");
                continue;
            };

            let agent = Agent::new(
                name.clone(),
                config,
                settings,
                responses.clone(),
                moderation.clone(),
                resolver.clone(),
            )
            .await
            .map_err(|source| RegistryError::Agent {
                name: name.clone(),
                source,
            })?;

            agents.push((name, Arc::new(agent)));
        }

        Ok(Self { agents })
    }

    /// Look up an agent by name. Unknown names fall back to the first
    /// registered agent.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NoAgents` when the registry is empty.
    pub fn lookup(&self, name: &str) -> Result<Arc<Agent>, RegistryError> {
        if let Some((_, agent)) = self.agents.iter().find(|(n, _)| n == name) {
            return Ok(agent.clone());
        }

        if let Some((fallback, agent)) = self.agents.first() {
            debug!(
                requested = name,
                fallback = %fallback,
                "Agent not found, falling back to first registered agent"
            );
            return Ok(agent.clone());
        }

        Err(RegistryError::NoAgents)
    }

    /// Names of every registered agent, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// True when no agents are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockModerationProvider, MockResponsesProvider};
    use crate::knowledge::MockKnowledgeResolver;

    fn settings() -> Settings {
        Settings {
            stack_host: "localhost".to_string(),
            stack_port: "8321".to_string(),
            stack_api_key: "dummy-key".to_string(),
            agent_config_dir: "config".to_string(),
            default_agent: None,
            safety_model: None,
            safety_url: None,
            show_empty_response_info: false,
        }
    }

    fn named(name: &str) -> AgentConfig {
        AgentConfig {
            name: Some(name.to_string()),
            model: Some("test-model".to_string()),
            ..AgentConfig::default()
        }
    }

    async fn registry_of(configs: Vec<AgentConfig>) -> AgentRegistry {
        AgentRegistry::from_configs(
            configs,
            &settings(),
            Arc::new(MockResponsesProvider::new()),
            Arc::new(MockModerationProvider::new()),
            Arc::new(MockKnowledgeResolver::new()),
        )
        .await
        .expect("registry builds")
    }

    #[tokio::test]
    async fn exact_name_wins() {
        let registry = registry_of(vec![named("first"), named("second")]).await;
        let agent = registry.lookup("second").expect("lookup succeeds");
        assert_eq!(agent.name(), "second");
    }

    #[tokio::test]
    async fn unknown_name_falls_back_to_first_registered() {
        let registry = registry_of(vec![named("first"), named("second")]).await;
        let agent = registry.lookup("nonexistent").expect("fallback succeeds");
        assert_eq!(agent.name(), "first");
    }

    #[tokio::test]
    async fn empty_registry_fails_lookup() {
        let registry = registry_of(Vec::new()).await;
        assert!(matches!(
            registry.lookup("anything"),
            Err(RegistryError::NoAgents)
        ));
    }

    #[tokio::test]
    async fn unnamed_entries_are_skipped() {
        let configs = vec![
            AgentConfig {
                model: Some("orphan".to_string()),
                ..AgentConfig::default()
            },
            named("real"),
            AgentConfig {
                name: Some(String::new()),
                model: Some("blank".to_string()),
                ..AgentConfig::default()
            },
        ];
        let registry = registry_of(configs).await;
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["real"]);
    }
}
