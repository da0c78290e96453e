// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of one step in the cognitive trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    MemoryRecall,
    SchemaMatch,
    SchemaUpdate,
    Reasoning,
    ToolCall,
    ToolResult,
    Response,
}

/// One recorded step.  Timestamps are wall-clock; compare chain *shape* in
/// tests, never exact times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingStep {
    pub step_type: StepType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
}

/// Append-only record of one execution's cognitive steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThinkingChain {
    pub steps: Vec<ThinkingStep>,
}

impl ThinkingChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step_type: StepType, content: impl Into<String>) {
        self.steps.push(ThinkingStep {
            step_type,
            content: content.into(),
            timestamp: Utc::now(),
            tokens_used: None,
        });
    }

    pub fn push_response(&mut self, content: impl Into<String>, tokens_used: u32) {
        self.steps.push(ThinkingStep {
            step_type: StepType::Response,
            content: content.into(),
            timestamp: Utc::now(),
            tokens_used: Some(tokens_used),
        });
    }

    /// Number of steps of one kind; used by invariant checks.
    pub fn count(&self, step_type: StepType) -> usize {
        self.steps.iter().filter(|s| s.step_type == step_type).count()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_step_type() {
        let mut chain = ThinkingChain::new();
        chain.push(StepType::Reasoning, "a");
        chain.push(StepType::ToolCall, "b");
        chain.push(StepType::ToolResult, "c");
        chain.push_response("done", 42);
        assert_eq!(chain.count(StepType::Reasoning), 1);
        assert_eq!(chain.count(StepType::ToolCall), 1);
        assert_eq!(chain.count(StepType::ToolResult), 1);
        assert_eq!(chain.count(StepType::Response), 1);
        assert_eq!(chain.steps.last().unwrap().tokens_used, Some(42));
    }

    #[test]
    fn step_type_serialises_snake_case() {
        assert_eq!(
            serde_json::to_string(&StepType::MemoryRecall).unwrap(),
            "\"memory_recall\""
        );
    }
}
