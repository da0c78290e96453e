// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The moderated round-robin conversation driver.
//!
//! Speakers take turns in confirmed-agent order.  A round's reply can end
//! the conversation early by carrying a consensus marker; otherwise the
//! conversation runs to the round cap.  Either way a summarizer produces
//! the task result, falling back to the last utterance when it fails.

use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, warn};

use troupe_core::AgentExecutor;
use troupe_model::{ChatMessage, ChatRequest};

use crate::store::A2aStore;
use crate::task::{A2aMessage, A2aStatus, A2aTask};

/// Markers any participant can emit to signal agreement.  Matching is a
/// case-insensitive substring check.
const CONSENSUS_MARKERS: &[&str] = &["[consensus]", "[完成]", "[结论]", "[done]"];

/// True when `reply` carries any consensus marker.
pub fn has_consensus(reply: &str) -> bool {
    let lowered = reply.to_lowercase();
    CONSENSUS_MARKERS.iter().any(|m| lowered.contains(m))
}

pub struct ConversationEngine {
    executor: Arc<dyn AgentExecutor>,
    store: Arc<A2aStore>,
    /// Steward agent the summarizer runs through.
    moderator_agent_id: String,
}

impl ConversationEngine {
    pub fn new(
        executor: Arc<dyn AgentExecutor>,
        store: Arc<A2aStore>,
        moderator_agent_id: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            store,
            moderator_agent_id: moderator_agent_id.into(),
        }
    }

    pub fn store(&self) -> &Arc<A2aStore> {
        &self.store
    }

    /// Run a confirmed task's conversation to completion.
    pub async fn run(&self, task_id: &str) -> anyhow::Result<A2aTask> {
        let task = self
            .store
            .get(task_id)
            .with_context(|| format!("unknown a2a task: {task_id}"))?;
        if task.confirmed_agents.is_empty() {
            anyhow::bail!("a2a task {task_id} has no confirmed agents");
        }

        self.store.transition(task_id, A2aStatus::Working)?;
        let agents = task.confirmed_agents.clone();

        for round in 1..=task.max_rounds {
            let speaker = &agents[((round - 1) as usize) % agents.len()];
            let prompt = self.round_prompt(&task, &agents, round, speaker);

            let reply = match self.executor.execute(speaker, &prompt).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(task_id, speaker = %speaker, round, error = %e, "speaker failed");
                    let _ = self.store.transition(task_id, A2aStatus::Failed);
                    return Err(e.into());
                }
            };
            self.store.add_message(task_id, speaker, round, "agent", &reply);
            debug!(task_id, round, speaker = %speaker, "round complete");

            if has_consensus(&reply) {
                debug!(task_id, round, "consensus reached");
                return self.finish(task_id, &task).await;
            }
        }

        // Round cap reached without consensus.
        self.finish(task_id, &task).await
    }

    fn round_prompt(&self, task: &A2aTask, agents: &[String], round: u32, speaker: &str) -> String {
        let transcript = render_transcript(&self.store.messages(&task.id));
        let final_hint = if round == task.max_rounds {
            "\nThis is the final round: state your final conclusion."
        } else {
            ""
        };
        format!(
            "Task: {}\nParticipants: {}\nRound {} of {}.\n\n\
             Conversation so far:\n{}\n\n\
             You are {}. Speak as yourself and move the task forward. \
             When everyone agrees, include [consensus] in your reply.{}",
            task.description,
            agents.join(", "),
            round,
            task.max_rounds,
            transcript,
            speaker,
            final_hint,
        )
    }

    /// Summarize the transcript and complete the task.  A summarizer failure
    /// degrades to the last message's content.
    async fn finish(&self, task_id: &str, task: &A2aTask) -> anyhow::Result<A2aTask> {
        let messages = self.store.messages(task_id);
        let result = match self.summarize(task, &messages).await {
            Ok(summary) if !summary.is_empty() => summary,
            outcome => {
                if let Err(e) = outcome {
                    warn!(task_id, error = %e, "summarizer failed; using last message");
                }
                messages
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default()
            }
        };
        self.store.set_result(task_id, &result)?;
        Ok(self.store.transition(task_id, A2aStatus::Completed)?)
    }

    async fn summarize(&self, task: &A2aTask, messages: &[A2aMessage]) -> anyhow::Result<String> {
        let prompt = format!(
            "The following agents discussed a task.\nTask: {}\n\nTranscript:\n{}\n\n\
             Produce the final summary of the outcome.",
            task.description,
            render_transcript(messages),
        );
        let req = ChatRequest::new(
            String::new(),
            vec![
                ChatMessage::system("You summarize multi-agent discussions."),
                ChatMessage::user(prompt),
            ],
        );
        let response = self
            .executor
            .route_raw(&self.moderator_agent_id, req)
            .await?;
        Ok(response.content)
    }
}

fn render_transcript(messages: &[A2aMessage]) -> String {
    if messages.is_empty() {
        return "(no messages yet)".into();
    }
    messages
        .iter()
        .map(|m| format!("[round {}] {}: {}", m.round, m.agent_id, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
