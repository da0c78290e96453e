// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Builtin command families: listing, creation, admin, memory, team,
//! provider, retrieval, and agent-to-agent tasks.

mod a2a;
mod agents;
mod memory;
mod misc;
mod provider;
mod skills;
mod teams;

pub use a2a::A2aCommand;
pub use agents::{AgentAdminCommand, CreateAgentCommand, ListAgentsCommand};
pub use memory::{ForgetCommand, RecallCommand, RememberCommand};
pub use misc::{CreateScheduleCommand, HelpCommand, ListToolsCommand, RagSearchCommand, StatusCommand};
pub use provider::ProviderCommand;
pub use skills::{CreateSkillCommand, ListSkillsCommand};
pub use teams::{CreateTeamCommand, TeamCommand};

use std::sync::Arc;

use crate::command::CommandContext;
use crate::registry::CommandRegistry;

/// Register every builtin command family.
pub fn register_builtins(registry: &CommandRegistry, help_registry: Arc<CommandRegistry>) {
    registry.register(HelpCommand {
        registry: help_registry,
    });
    registry.register(ListAgentsCommand);
    registry.register(ListToolsCommand);
    registry.register(ListSkillsCommand);
    registry.register(StatusCommand);
    registry.register(CreateAgentCommand);
    registry.register(CreateSkillCommand);
    registry.register(CreateTeamCommand);
    registry.register(CreateScheduleCommand);
    registry.register(AgentAdminCommand);
    registry.register(RememberCommand);
    registry.register(ForgetCommand);
    registry.register(RecallCommand);
    registry.register(TeamCommand);
    registry.register(ProviderCommand);
    registry.register(RagSearchCommand);
    registry.register(A2aCommand);
}

/// Split the first whitespace-delimited word off an argument tail.
pub(crate) fn split_word(args: &str) -> (&str, &str) {
    let trimmed = args.trim_start();
    match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim_start()),
        None => (trimmed, ""),
    }
}

pub(crate) fn resolve_agent_id(ctx: &CommandContext, name_or_id: &str) -> Option<String> {
    let engine = &ctx.handles.engine;
    engine
        .find_by_name(name_or_id)
        .or_else(|| engine.get(name_or_id))
        .map(|a| a.id)
}

// ── Test support ──────────────────────────────────────────────────────────────
