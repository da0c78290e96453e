// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use troupe_core::Skill;

use crate::builtin::split_word;
use crate::command::{Command, CommandContext, CommandResult};

pub struct ListSkillsCommand;

#[async_trait]
impl Command for ListSkillsCommand {
    fn name(&self) -> &str {
        "list_skills"
    }
    fn description(&self) -> &str {
        "List available skills"
    }
    fn usage(&self) -> &str {
        "/list_skills"
    }

    async fn execute(&self, _args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let skills = ctx.handles.skills.list();
        if skills.is_empty() {
            return Ok(CommandResult::text("No skills defined."));
        }
        let lines: Vec<String> = skills
            .iter()
            .map(|s| format!("- {}: {} (tools: {})", s.name, s.description, s.tools.join(", ")))
            .collect();
        Ok(CommandResult::text(lines.join("\n")))
    }
}

pub struct CreateSkillCommand;

#[async_trait]
impl Command for CreateSkillCommand {
    fn name(&self) -> &str {
        "create_skill"
    }
    fn description(&self) -> &str {
        "Define a skill (prompt fragment + allowed tools)"
    }
    fn usage(&self) -> &str {
        "/create_skill <name> [tool1,tool2] [prompt text]"
    }

    async fn execute(&self, args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let (name, rest) = split_word(args);
        if name.is_empty() {
            return Ok(CommandResult::text(format!("Usage: {}", self.usage())));
        }
        let (tool_list, prompt) = split_word(rest);
        let mut skill = Skill::new(name);
        skill.tools = tool_list
            .split(',')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        skill.prompt = prompt.to_string();
        let id = ctx.handles.skills.upsert(skill);
        Ok(CommandResult::text(format!("Created skill {name} ({id})")))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
