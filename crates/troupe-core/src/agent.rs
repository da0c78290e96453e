// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an agent.  Observational only: the status field never
/// gates execution, and concurrent executions of the same agent both run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Thinking,
    Working,
    Resting,
}

/// A registered persona: the unit of LLM invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub backstory: String,
    /// Provider binding, consumed by the router at registration time.
    #[serde(default)]
    pub provider_id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_status")]
    pub status: AgentStatus,
    /// Soft-delete marker: the record is retained so the id stays claimed,
    /// but the agent is invisible to `get`/`list`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_status() -> AgentStatus {
    AgentStatus::Idle
}

impl AgentRecord {
    /// A minimally populated record; `AgentEngine::register` fills in the id
    /// and timestamps.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            role: String::new(),
            personality: String::new(),
            system_prompt: String::new(),
            backstory: String::new(),
            provider_id: String::new(),
            model: String::new(),
            status: AgentStatus::Idle,
            deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// The persona line injected into the system prompt when the agent has a
    /// personality.
    pub fn persona_line(&self) -> Option<String> {
        if self.personality.is_empty() {
            return None;
        }
        Some(format!(
            "You are {}, {}. Background: {}",
            self.name, self.personality, self.backstory
        ))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
