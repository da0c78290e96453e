// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle of an agent-to-agent task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum A2aStatus {
    Submitted,
    Planning,
    Confirmed,
    Working,
    Completed,
    Failed,
    Canceled,
}

impl A2aStatus {
    /// Whether moving from `self` to `to` is a legal lifecycle step.
    pub fn can_transition(self, to: A2aStatus) -> bool {
        use A2aStatus::*;
        matches!(
            (self, to),
            (Submitted, Planning)
                | (Submitted, Canceled)
                | (Planning, Confirmed)
                | (Planning, Canceled)
                | (Confirmed, Working)
                | (Confirmed, Canceled)
                | (Working, Completed)
                | (Working, Failed)
                | (Working, Canceled)
        )
    }

    /// Completed, failed, and canceled tasks never move again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            A2aStatus::Completed | A2aStatus::Failed | A2aStatus::Canceled
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid status transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: A2aStatus,
    pub to: A2aStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2aTask {
    pub id: String,
    pub description: String,
    pub status: A2aStatus,
    #[serde(default)]
    pub proposed_agents: Vec<String>,
    #[serde(default)]
    pub confirmed_agents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub max_rounds: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl A2aTask {
    pub fn new(description: impl Into<String>, proposed_agents: Vec<String>, max_rounds: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            status: A2aStatus::Submitted,
            proposed_agents,
            confirmed_agents: Vec::new(),
            result: None,
            max_rounds,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a transition in place; an illegal move changes nothing.
    pub fn transition(&mut self, to: A2aStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// One utterance inside a task's conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2aMessage {
    pub id: String,
    pub task_id: String,
    pub agent_id: String,
    pub round: u32,
    pub msg_type: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use A2aStatus::*;

    #[test]
    fn legal_transitions_follow_the_lifecycle() {
        for (from, to) in [
            (Submitted, Planning),
            (Submitted, Canceled),
            (Planning, Confirmed),
            (Planning, Canceled),
            (Confirmed, Working),
            (Confirmed, Canceled),
            (Working, Completed),
            (Working, Failed),
            (Working, Canceled),
        ] {
            assert!(from.can_transition(to), "{from:?} -> {to:?} must be legal");
        }
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        for (from, to) in [
            (Submitted, Working),
            (Submitted, Completed),
            (Planning, Working),
            (Confirmed, Completed),
            (Completed, Working),
            (Canceled, Planning),
            (Failed, Completed),
            (Working, Planning),
        ] {
            assert!(!from.can_transition(to), "{from:?} -> {to:?} must be illegal");
        }
    }

    #[test]
    fn failed_transition_leaves_state_unchanged() {
        let mut task = A2aTask::new("t", vec![], 4);
        let err = task.transition(Working).unwrap_err();
        assert_eq!(err.from, Submitted);
        assert_eq!(task.status, Submitted);
    }

    #[test]
    fn transition_chain_reaches_completed() {
        let mut task = A2aTask::new("t", vec![], 4);
        task.transition(Planning).unwrap();
        task.transition(Confirmed).unwrap();
        task.transition(Working).unwrap();
        task.transition(Completed).unwrap();
        assert!(task.status.is_terminal());
    }
}
