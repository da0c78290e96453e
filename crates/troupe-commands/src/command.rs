// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use troupe_a2a::ConversationEngine;
use troupe_bus::MessageBus;
use troupe_core::{AgentEngine, MemoryStore, RagStore, SkillStore};
use troupe_team::{Steward, TeamStore};

/// Shared subsystem handles every command can reach.
#[derive(Clone)]
pub struct Handles {
    pub engine: Arc<AgentEngine>,
    pub skills: Arc<SkillStore>,
    pub teams: Arc<TeamStore>,
    pub steward: Arc<Steward>,
    pub a2a: Arc<ConversationEngine>,
    pub memory: Arc<dyn MemoryStore>,
    pub rag: Arc<dyn RagStore>,
    pub bus: Arc<dyn MessageBus>,
}

/// Where a command invocation came from, plus the subsystem handles.
#[derive(Clone)]
pub struct CommandContext {
    pub platform: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    pub handles: Handles,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub content: String,
}

impl CommandResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// One slash command.  The argument tail is opaque to the registry;
/// commands parse it themselves.
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn usage(&self) -> &str;
    async fn execute(&self, args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult>;
}
