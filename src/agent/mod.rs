//! Agent orchestration.
//!
//! An [`Agent`] owns one resolved configuration (model, sampling defaults,
//! system message, default tool set, shields) and turns a conversation into
//! a safe, non-empty textual reply: input moderation, tool assembly,
//! provider invocation, response extraction, output moderation, and bounded
//! retry on top.

/// Response classification and text extraction.
pub mod extract;
/// Moderation shields for input and output content.
pub mod moderation;
/// Bounded retry with capped exponential backoff.
pub mod retry;
/// Tool-set assembly.
pub mod tools;

pub use retry::ResponseAttempt;

use crate::config::{AgentConfig, Settings};
use crate::knowledge::KnowledgeResolver;
use crate::llm::{
    LlmError, Message, ModerationProvider, ProviderResponse, ResponseRequest, ResponsesProvider,
    ToolDescriptor,
};
use moderation::ModerationGate;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tools::ToolSetBuilder;
use tracing::{debug, info, instrument, warn};

/// Errors during agent construction.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No model is configured and the stack reports no LLM models.
    #[error("no model available for agent '{0}': not configured and none served upstream")]
    NoModelAvailable(String),
    /// The stack could not be asked for its model list.
    #[error("failed to list models for agent '{0}': {1}")]
    ModelListing(String, #[source] LlmError),
}

/// Per-call overrides for one orchestrated response.
#[derive(Debug, Clone, Default)]
pub struct RespondOptions {
    /// Sampling temperature override.
    pub temperature: Option<f32>,
    /// Extra system messages appended after the agent's own, in order.
    pub extra_system_messages: Vec<String>,
    /// Identity of the acting human user, propagated to remote tool servers
    /// out-of-band.
    pub caller_identity: Option<String>,
    /// Restriction of the tools callable on remote servers; overrides any
    /// allow-list in the server configs.
    pub allowed_tools: Option<Vec<String>>,
    /// Invoke the provider with no tools at all.
    pub skip_all_tools: bool,
    /// Invoke the provider without remote tool servers, keeping
    /// knowledge-base search.
    pub skip_remote_tools: bool,
    /// Caller state label, used for diagnostics only.
    pub state_label: Option<String>,
    /// Telemetry context tag, used for diagnostics only.
    pub telemetry_tag: Option<String>,
}

#[derive(Debug, Clone)]
struct SamplingDefaults {
    temperature: f32,
    stream: bool,
}

impl Default for SamplingDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            stream: false,
        }
    }
}

/// One configured agent with its derived caches.
pub struct Agent {
    name: String,
    config: AgentConfig,
    model: String,
    sampling: SamplingDefaults,
    system_message: String,
    default_tools: Vec<ToolDescriptor>,
    input_shields: Vec<String>,
    output_shields: Vec<String>,
    gate: ModerationGate,
    tool_builder: ToolSetBuilder,
    responses: Arc<dyn ResponsesProvider>,
    show_empty_response_info: bool,
}

impl Agent {
    /// Build an agent from its static configuration: resolve the model,
    /// compute sampling defaults, build the default tool set once, and wire
    /// the moderation gate.
    ///
    /// # Errors
    ///
    /// Returns `AgentError` when no model can be determined.
    pub async fn new(
        name: String,
        config: AgentConfig,
        settings: &Settings,
        responses: Arc<dyn ResponsesProvider>,
        moderation: Arc<dyn ModerationProvider>,
        resolver: Arc<dyn KnowledgeResolver>,
    ) -> Result<Self, AgentError> {
        let model = resolve_model(&name, &config, responses.as_ref()).await?;
        let sampling = resolve_sampling(&config);
        let system_message = config.system_message.clone().unwrap_or_default();

        let (input_shields, output_shields) = if settings.shields_enabled() {
            (config.input_shields.clone(), config.output_shields.clone())
        } else {
            if !config.input_shields.is_empty() || !config.output_shields.is_empty() {
                warn!(
                    agent = %name,
                    "Shields configured but the safety subsystem is not; disabling shields"
                );
            }
            (Vec::new(), Vec::new())
        };

        let gate = ModerationGate::new(
            moderation,
            to_set(&config.ignored_input_shield_categories),
            to_set(&config.ignored_output_shield_categories),
        );

        let tool_builder = ToolSetBuilder::new(resolver);
        let default_tools = tool_builder
            .build(&config.knowledge_bases, &config.mcp_servers, None, None)
            .await;

        info!(
            agent = %name,
            model = %model,
            tools = default_tools.len(),
            input_shields = input_shields.len(),
            output_shields = output_shields.len(),
            "Initialized agent"
        );

        Ok(Self {
            name,
            config,
            model,
            sampling,
            system_message,
            default_tools,
            input_shields,
            output_shields,
            gate,
            tool_builder,
            responses,
            show_empty_response_info: settings.show_empty_response_info,
        })
    }

    /// Agent name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Produce a reply with the default retry budget. The result is always
    /// presentable: the generated text, a shield refusal, or one of the
    /// fixed apology strings.
    pub async fn respond(&self, messages: &[Message], options: &RespondOptions) -> String {
        self.respond_with_retry(messages, options, retry::MAX_RETRIES)
            .await
    }

    /// Produce a reply, retrying empty or failed attempts up to
    /// `max_retries` times with capped exponential backoff.
    pub async fn respond_with_retry(
        &self,
        messages: &[Message],
        options: &RespondOptions,
        max_retries: usize,
    ) -> String {
        retry::run_with_retry(|| self.respond_once(messages, options), max_retries).await
    }

    /// One orchestrated response attempt, without retry.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` only for failures outside the provider exchange
    /// (e.g. request serialization); provider failures are absorbed into
    /// the returned [`ResponseAttempt`].
    #[instrument(skip(self, messages, options), fields(agent = %self.name))]
    pub async fn respond_once(
        &self,
        messages: &[Message],
        options: &RespondOptions,
    ) -> Result<ResponseAttempt, LlmError> {
        if !self.input_shields.is_empty() && !messages.is_empty() {
            let verdict = self.gate.check_input(messages, &self.input_shields).await;
            if !verdict.is_safe {
                info!(agent = %self.name, "Input blocked by shield");
                let message = verdict
                    .user_message
                    .unwrap_or_else(|| moderation::INPUT_REFUSAL.to_string());
                return Ok(ResponseAttempt::Refused(message));
            }
        }

        let mut input = Vec::with_capacity(1 + options.extra_system_messages.len() + messages.len());
        input.push(Message::system(&self.system_message));
        for extra in &options.extra_system_messages {
            input.push(Message::system(extra));
        }
        input.extend_from_slice(messages);

        let request = ResponseRequest {
            input,
            model: self.model.clone(),
            temperature: options.temperature.unwrap_or(self.sampling.temperature),
            stream: self.sampling.stream,
            tools: match self.effective_tools(options).await {
                tools if tools.is_empty() => None,
                tools => Some(tools),
            },
        };

        debug!(
            agent = %self.name,
            state = options.state_label.as_deref().unwrap_or(""),
            context = options.telemetry_tag.as_deref().unwrap_or(""),
            "Invoking responses API"
        );

        let response = match self.responses.create_response(request).await {
            Ok(response) => response,
            Err(err) => return Ok(classify_provider_failure(&err)),
        };

        let outcome = extract::extract(&response);
        if let Some(classification) = outcome.classification {
            warn!(agent = %self.name, classification = %classification, "Response error detected");
            return Ok(ResponseAttempt::Transient(Some(classification)));
        }
        if outcome.text.is_empty() {
            self.log_empty_response(&response, options);
            warn!(agent = %self.name, "No valid content found in response");
            return Ok(ResponseAttempt::Transient(None));
        }

        if !self.output_shields.is_empty() {
            let verdict = self
                .gate
                .check_output(&outcome.text, &self.output_shields)
                .await;
            if !verdict.is_safe {
                info!(agent = %self.name, "Output blocked by shield");
                let message = verdict
                    .user_message
                    .unwrap_or_else(|| moderation::OUTPUT_REFUSAL.to_string());
                return Ok(ResponseAttempt::Refused(message));
            }
        }

        Ok(ResponseAttempt::Reply(outcome.text))
    }

    /// Resolve the tool set for one call. Precedence: skip everything, then
    /// skip remote servers only, then an identity/filter-driven rebuild,
    /// then the cached default.
    async fn effective_tools(&self, options: &RespondOptions) -> Vec<ToolDescriptor> {
        if options.skip_all_tools {
            return Vec::new();
        }
        if options.skip_remote_tools {
            return self
                .tool_builder
                .build(
                    &self.config.knowledge_bases,
                    &[],
                    options.caller_identity.as_deref(),
                    options.allowed_tools.as_deref(),
                )
                .await;
        }
        if options.caller_identity.is_some() || options.allowed_tools.is_some() {
            return self
                .tool_builder
                .build(
                    &self.config.knowledge_bases,
                    &self.config.mcp_servers,
                    options.caller_identity.as_deref(),
                    options.allowed_tools.as_deref(),
                )
                .await;
        }
        self.default_tools.clone()
    }

    /// Dump the internals of a response that yielded no usable text.
    /// Operator-gated; silent by default.
    fn log_empty_response(&self, response: &ProviderResponse, options: &RespondOptions) {
        if !self.show_empty_response_info {
            return;
        }

        warn!(
            agent = %self.name,
            state = options.state_label.as_deref().unwrap_or(""),
            id = response.id.as_deref().unwrap_or(""),
            status = response.status.as_deref().unwrap_or(""),
            model = response.model.as_deref().unwrap_or(""),
            skip_all_tools = options.skip_all_tools,
            skip_remote_tools = options.skip_remote_tools,
            output_text = response.output_text.as_deref().unwrap_or(""),
            "Empty response detected, no valid content found"
        );

        for (idx, item) in response.output.as_deref().unwrap_or_default().iter().enumerate() {
            warn!(
                agent = %self.name,
                index = idx,
                kind = item.kind.as_deref().unwrap_or(""),
                parts = item.content.as_ref().map_or(0, Vec::len),
                "Empty response output item"
            );
        }
    }
}

async fn resolve_model(
    name: &str,
    config: &AgentConfig,
    responses: &dyn ResponsesProvider,
) -> Result<String, AgentError> {
    if let Some(model) = config.model.as_deref().filter(|m| !m.is_empty()) {
        info!(agent = %name, model = %model, "Using configured model");
        return Ok(model.to_string());
    }

    let models = responses
        .list_models()
        .await
        .map_err(|err| AgentError::ModelListing(name.to_string(), err))?;

    models
        .iter()
        .filter(|m| m.model_type.as_deref() == Some("llm"))
        .find_map(|m| m.identifier.clone())
        .map(|model| {
            info!(agent = %name, model = %model, "Using first available LLM model");
            model
        })
        .ok_or_else(|| AgentError::NoModelAvailable(name.to_string()))
}

fn resolve_sampling(config: &AgentConfig) -> SamplingDefaults {
    let mut sampling = SamplingDefaults::default();
    if let Some(temperature) = config
        .sampling_params
        .as_ref()
        .and_then(|p| p.strategy.as_ref())
        .and_then(|s| s.temperature)
    {
        sampling.temperature = temperature;
    }
    sampling
}

fn to_set(categories: &[String]) -> HashSet<String> {
    categories.iter().cloned().collect()
}

/// Map a provider failure to an attempt outcome. Timeout, connection and
/// network failures are transient; anything else is an unexpected failure
/// that the retry layer remembers but never shows to the end user.
fn classify_provider_failure(err: &LlmError) -> ResponseAttempt {
    let transient = matches!(err, LlmError::NetworkError(_)) || {
        let msg = err.to_string().to_lowercase();
        msg.contains("timeout") || msg.contains("connection") || msg.contains("network")
    };

    if transient {
        warn!(error = %err, "Transient failure calling responses API");
        ResponseAttempt::Transient(Some(err.to_string()))
    } else {
        warn!(error = %err, "Unexpected failure calling responses API");
        ResponseAttempt::Failed(format!("Unable to get response from responses API: {err}"))
    }
}
