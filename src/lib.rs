#![deny(missing_docs)]
//! Aegis Agent core library.
//!
//! Configuration-driven agents that turn a conversation into a safe,
//! non-empty textual reply: input moderation shields, knowledge-base and
//! remote tool assembly, provider invocation, response extraction and
//! bounded retry with backoff.

/// Agent orchestration: moderation, tools, extraction, retry.
pub mod agent;
/// Configuration management.
pub mod config;
/// Knowledge-base name resolution.
pub mod knowledge;
/// Stack client, wire types and provider traits.
pub mod llm;
/// Agent registry and lookup.
pub mod registry;
