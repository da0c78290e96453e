// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use troupe_model::{ChatRequest, ChatResponse};

use crate::error::EngineError;

/// Narrow "execute an agent" capability.
///
/// The team scheduler, the steward, the A2A engine, and the admin commands
/// all drive agents; they take this trait rather than the engine so tests
/// can swap in a deterministic mock.  The real engine is its only in-process
/// implementation.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// One full cognitive execution; returns the reply content.
    async fn execute(&self, agent_id: &str, message: &str) -> Result<String, EngineError>;

    /// Provider routing without the loop, for decomposition/aggregation
    /// calls that need raw LLM access under an agent's binding.
    async fn route_raw(
        &self,
        agent_id: &str,
        req: ChatRequest,
    ) -> Result<ChatResponse, EngineError>;

    /// Whether an agent id is currently registered (and not soft-deleted).
    fn is_registered(&self, agent_id: &str) -> bool;
}
