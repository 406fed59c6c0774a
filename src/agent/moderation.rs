//! Moderation shields for input and output content.
//!
//! Shields run in list order and short-circuit on the first unsafe verdict.
//! A shield that errors is skipped (fail-open): availability is favored
//! over strictness, and a broken safety endpoint must not take the agent
//! down with it.

use crate::llm::{Message, ModerationProvider};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Generic refusal for blocked user input.
pub const INPUT_REFUSAL: &str =
    "I apologize, but I cannot process that request due to safety concerns.";

/// Generic refusal for blocked generated output.
pub const OUTPUT_REFUSAL: &str =
    "I apologize, but I cannot provide that response due to safety concerns.";

/// Verdict of one moderation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldVerdict {
    /// True when the content passed every shield.
    pub is_safe: bool,
    /// Shield-supplied user-facing message; `None` when safe or when the
    /// shield gave no message (callers then apply the pass-appropriate
    /// generic refusal).
    pub user_message: Option<String>,
}

impl ShieldVerdict {
    fn safe() -> Self {
        Self {
            is_safe: true,
            user_message: None,
        }
    }

    fn blocked(user_message: Option<String>) -> Self {
        Self {
            is_safe: false,
            user_message,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Pass {
    Input,
    Output,
}

impl Pass {
    fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// Runs configured shields over input and output content.
pub struct ModerationGate {
    provider: Arc<dyn ModerationProvider>,
    ignored_input: HashSet<String>,
    ignored_output: HashSet<String>,
}

impl ModerationGate {
    /// Create a gate with per-pass ignored-category sets.
    #[must_use]
    pub fn new(
        provider: Arc<dyn ModerationProvider>,
        ignored_input: HashSet<String>,
        ignored_output: HashSet<String>,
    ) -> Self {
        Self {
            provider,
            ignored_input,
            ignored_output,
        }
    }

    /// Check a conversation before it reaches the model. Only the last
    /// message is evaluated; earlier turns were checked by prior calls.
    pub async fn check_input(&self, messages: &[Message], shields: &[String]) -> ShieldVerdict {
        if shields.is_empty() {
            return ShieldVerdict::safe();
        }
        let Some(last) = messages.last() else {
            return ShieldVerdict::safe();
        };
        self.run(&last.content, shields, Pass::Input).await
    }

    /// Check a candidate reply before it reaches the caller.
    pub async fn check_output(&self, reply: &str, shields: &[String]) -> ShieldVerdict {
        if shields.is_empty() {
            return ShieldVerdict::safe();
        }
        self.run(reply, shields, Pass::Output).await
    }

    async fn run(&self, content: &str, shields: &[String], pass: Pass) -> ShieldVerdict {
        let ignored = match pass {
            Pass::Input => &self.ignored_input,
            Pass::Output => &self.ignored_output,
        };

        for shield in shields {
            debug!(
                shield = %shield,
                pass = pass.as_str(),
                chars = content.len(),
                "Running moderation shield"
            );

            let result = match self.provider.moderate(content, shield).await {
                Ok(result) => result,
                Err(err) => {
                    // Fail open: a broken shield is skipped, not fatal.
                    warn!(
                        shield = %shield,
                        pass = pass.as_str(),
                        error = %err,
                        "Shield invocation failed, continuing"
                    );
                    continue;
                }
            };

            if !result.flagged {
                continue;
            }

            let has_effective_flag = result
                .categories
                .iter()
                .any(|(category, flagged)| *flagged && !ignored.contains(category));

            if has_effective_flag {
                warn!(
                    shield = %shield,
                    pass = pass.as_str(),
                    categories = ?result.categories,
                    scores = ?result.category_scores,
                    "Content flagged by shield"
                );
                return ShieldVerdict::blocked(result.user_message);
            }

            info!(
                shield = %shield,
                pass = pass.as_str(),
                categories = ?result.categories,
                "Content flagged only in ignored categories"
            );
        }

        ShieldVerdict::safe()
    }
}
