// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One member slot in a team.  `role` is free-form and drives scheduler
/// matching; `priority` breaks ties among members sharing a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub agent_id: String,
    pub role: String,
    #[serde(default)]
    pub can_delegate: bool,
    #[serde(default)]
    pub priority: i32,
}

/// A named group of agents: the unit of decomposed multi-agent execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub steward_agent_id: String,
    #[serde(default)]
    pub members: Vec<TeamMember>,
    #[serde(default)]
    pub workflow_type: String,
}

impl Team {
    pub fn new(name: impl Into<String>, steward_agent_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            steward_agent_id: steward_agent_id.into(),
            members: Vec::new(),
            workflow_type: "parallel".into(),
        }
    }

    pub fn with_member(mut self, member: TeamMember) -> Self {
        self.members.push(member);
        self
    }
}

/// Read-mostly team registry.
#[derive(Default)]
pub struct TeamStore {
    teams: RwLock<HashMap<String, Team>>,
}

impl TeamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, mut team: Team) -> Team {
        if team.id.is_empty() {
            team.id = Uuid::new_v4().to_string();
        }
        self.teams
            .write()
            .unwrap()
            .insert(team.id.clone(), team.clone());
        team
    }

    pub fn get(&self, team_id: &str) -> Option<Team> {
        self.teams.read().unwrap().get(team_id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Team> {
        self.teams
            .read()
            .unwrap()
            .values()
            .find(|t| t.name == name)
            .cloned()
    }

    /// Teams sorted by name.
    pub fn list(&self) -> Vec<Team> {
        let mut all: Vec<Team> = self.teams.read().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn remove(&self, team_id: &str) -> bool {
        self.teams.write().unwrap().remove(team_id).is_some()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
