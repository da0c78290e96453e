// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! LLM provider drivers and the caller→backend router.
//!
//! Two HTTP drivers are provided: [`OpenAiProvider`] for everything that
//! speaks the `/chat/completions` wire format and [`AnthropicProvider`] for
//! the `/v1/messages` API.  [`ProviderRouter`] binds logical caller ids
//! (agents, stewards) to concrete backends and walks an ordered failover
//! chain when the primary call fails.

pub mod anthropic;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod router;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use mock::{MockProvider, ScriptedProvider};
pub use openai::OpenAiProvider;
pub use provider::{ChatStream, LlmProvider};
pub use router::ProviderRouter;
pub use types::{
    ChatChunk, ChatMessage, ChatRequest, ChatResponse, FunctionCall, Role, TokenUsage,
    ToolCallData, ToolChoice, ToolDefinition, FINISH_TOOL_CALLS,
};
