// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::builtin::{resolve_agent_id, split_word};
use crate::command::{Command, CommandContext, CommandResult};

/// Provider verbs: list registered backends, rebind an agent.
pub struct ProviderCommand;

#[async_trait]
impl Command for ProviderCommand {
    fn name(&self) -> &str {
        "provider"
    }
    fn description(&self) -> &str {
        "List providers or switch an agent's binding"
    }
    fn usage(&self) -> &str {
        "/provider <list|switch> [agent] [provider-id]"
    }

    async fn execute(&self, args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let (verb, rest) = split_word(args);
        let router = ctx.handles.engine.router();

        match verb {
            "list" | "" => {
                let default = router.default_id().unwrap_or_else(|| "(none)".into());
                let lines: Vec<String> = router
                    .ids()
                    .into_iter()
                    .map(|id| {
                        if id == default {
                            format!("- {id} (default)")
                        } else {
                            format!("- {id}")
                        }
                    })
                    .collect();
                Ok(CommandResult::text(if lines.is_empty() {
                    "No providers registered.".into()
                } else {
                    lines.join("\n")
                }))
            }
            "switch" => {
                let (agent, provider_id) = split_word(rest);
                let Some(agent_id) = resolve_agent_id(ctx, agent) else {
                    return Ok(CommandResult::text(format!("Unknown agent: {agent}")));
                };
                if router.get(provider_id).is_none() {
                    return Ok(CommandResult::text(format!(
                        "Unknown provider: {provider_id}"
                    )));
                }
                router.bind(&agent_id, provider_id);
                Ok(CommandResult::text(format!(
                    "Agent {agent} now routes to {provider_id}"
                )))
            }
            _ => Ok(CommandResult::text(format!("Usage: {}", self.usage()))),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
