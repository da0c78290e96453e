// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use troupe_core::extract_keywords;

use crate::builtin::{resolve_agent_id, split_word};
use crate::command::{Command, CommandContext, CommandResult};

pub struct RememberCommand;

#[async_trait]
impl Command for RememberCommand {
    fn name(&self) -> &str {
        "remember"
    }
    fn description(&self) -> &str {
        "Store a memory for an agent"
    }
    fn usage(&self) -> &str {
        "/remember <agent> <text>"
    }

    async fn execute(&self, args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let (agent, text) = split_word(args);
        let Some(agent_id) = resolve_agent_id(ctx, agent) else {
            return Ok(CommandResult::text(format!("Unknown agent: {agent}")));
        };
        if text.is_empty() {
            return Ok(CommandResult::text(format!("Usage: {}", self.usage())));
        }
        let keywords = extract_keywords(text);
        ctx.handles.memory.process(&agent_id, text, &keywords).await?;
        Ok(CommandResult::text(format!(
            "Remembered for {agent} ({} keyword(s))",
            keywords.len()
        )))
    }
}

pub struct ForgetCommand;

#[async_trait]
impl Command for ForgetCommand {
    fn name(&self) -> &str {
        "forget"
    }
    fn description(&self) -> &str {
        "Drop an agent's memories matching a pattern"
    }
    fn usage(&self) -> &str {
        "/forget <agent> <pattern>"
    }

    async fn execute(&self, args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let (agent, pattern) = split_word(args);
        let Some(agent_id) = resolve_agent_id(ctx, agent) else {
            return Ok(CommandResult::text(format!("Unknown agent: {agent}")));
        };
        let removed = ctx.handles.memory.forget(&agent_id, pattern).await?;
        Ok(CommandResult::text(format!("Forgot {removed} memor(ies)")))
    }
}

pub struct RecallCommand;

#[async_trait]
impl Command for RecallCommand {
    fn name(&self) -> &str {
        "recall"
    }
    fn description(&self) -> &str {
        "Recall an agent's memories for a query"
    }
    fn usage(&self) -> &str {
        "/recall <agent> <query>"
    }

    async fn execute(&self, args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let (agent, query) = split_word(args);
        let Some(agent_id) = resolve_agent_id(ctx, agent) else {
            return Ok(CommandResult::text(format!("Unknown agent: {agent}")));
        };
        let keywords = extract_keywords(query);
        let context = ctx.handles.memory.recall(&agent_id, &keywords).await?;
        if context.is_empty() {
            return Ok(CommandResult::text("Nothing recalled."));
        }
        Ok(CommandResult::text(context))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::tests_support::{context, seed_agent};

    #[tokio::test]
    async fn remember_then_recall_then_forget() {
        let ctx = context();
        seed_agent(&ctx, "Ada");

        RememberCommand
            .execute("Ada the staging database lives on host seven", &ctx)
            .await
            .unwrap();

        let recalled = RecallCommand
            .execute("Ada where is the staging database", &ctx)
            .await
            .unwrap();
        assert!(recalled.content.contains("host seven"));

        let forgotten = ForgetCommand.execute("Ada staging", &ctx).await.unwrap();
        assert_eq!(forgotten.content, "Forgot 1 memor(ies)");

        let empty = RecallCommand
            .execute("Ada where is the staging database", &ctx)
            .await
            .unwrap();
        assert_eq!(empty.content, "Nothing recalled.");
    }

    #[tokio::test]
    async fn unknown_agent_is_reported_not_errored() {
        let ctx = context();
        let out = RememberCommand.execute("Ghost something", &ctx).await.unwrap();
        assert_eq!(out.content, "Unknown agent: Ghost");
    }
}
