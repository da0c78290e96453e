// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Skills: bundles of a prompt fragment and a set of tool names, assignable
//! to agents.  Assignment is ordered and set-semantic (duplicates ignored).

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillSource {
    Builtin,
    Plugin,
    Db,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Prompt fragment injected into the system prompt of assigned agents.
    #[serde(default)]
    pub prompt: String,
    /// Tool names the skill allows.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "default_source")]
    pub source: SkillSource,
}

fn default_source() -> SkillSource {
    SkillSource::Builtin
}

impl Skill {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            prompt: String::new(),
            tools: Vec::new(),
            source: SkillSource::Builtin,
        }
    }
}

/// Concurrent skill catalogue plus per-agent assignments.
#[derive(Default)]
pub struct SkillStore {
    skills: RwLock<HashMap<String, Skill>>,
    /// agent id → ordered skill ids.
    assignments: RwLock<HashMap<String, Vec<String>>>,
}

impl SkillStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a skill; returns its id.
    pub fn upsert(&self, mut skill: Skill) -> String {
        if skill.id.is_empty() {
            skill.id = Uuid::new_v4().to_string();
        }
        let id = skill.id.clone();
        self.skills.write().unwrap().insert(id.clone(), skill);
        id
    }

    pub fn get(&self, skill_id: &str) -> Option<Skill> {
        self.skills.read().unwrap().get(skill_id).cloned()
    }

    /// All skills, sorted by name.
    pub fn list(&self) -> Vec<Skill> {
        let mut all: Vec<Skill> = self.skills.read().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Assign a skill to an agent.  Idempotent: a duplicate assignment is a
    /// no-op and returns `false`.
    pub fn assign(&self, agent_id: &str, skill_id: &str) -> bool {
        let mut assignments = self.assignments.write().unwrap();
        let list = assignments.entry(agent_id.to_string()).or_default();
        if list.iter().any(|id| id == skill_id) {
            return false;
        }
        list.push(skill_id.to_string());
        true
    }

    /// Remove an assignment; returns whether it existed.
    pub fn unassign(&self, agent_id: &str, skill_id: &str) -> bool {
        let mut assignments = self.assignments.write().unwrap();
        let Some(list) = assignments.get_mut(agent_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|id| id != skill_id);
        list.len() != before
    }

    /// Skills assigned to an agent, in assignment order.  Ids whose skill was
    /// deleted from the catalogue are skipped.
    pub fn skills_for(&self, agent_id: &str) -> Vec<Skill> {
        let assignments = self.assignments.read().unwrap();
        let skills = self.skills.read().unwrap();
        assignments
            .get(agent_id)
            .map(|ids| ids.iter().filter_map(|id| skills.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// Markdown block listing the agent's skills, or `None` when it has none.
    pub fn prompt_for(&self, agent_id: &str) -> Option<String> {
        let skills = self.skills_for(agent_id);
        if skills.is_empty() {
            return None;
        }
        let mut block = String::from("## Skills\n");
        for s in &skills {
            block.push_str(&format!("- **{}**: {}\n", s.name, s.description));
            if !s.prompt.is_empty() {
                block.push_str(&format!("  {}\n", s.prompt));
            }
        }
        Some(block)
    }

    /// Union of tool names across the agent's skills, in stable order of
    /// first appearance.
    pub fn tool_names_for(&self, agent_id: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for skill in self.skills_for(agent_id) {
            for tool in skill.tools {
                if !names.contains(&tool) {
                    names.push(tool);
                }
            }
        }
        names
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
