// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Context;
use chrono::Utc;
use uuid::Uuid;

use crate::task::{A2aMessage, A2aStatus, A2aTask, TransitionError};

/// In-memory task and message store.  Critical sections are short: append
/// and read only, no I/O under the lock.
#[derive(Default)]
pub struct A2aStore {
    tasks: Mutex<HashMap<String, A2aTask>>,
    messages: Mutex<Vec<A2aMessage>>,
}

impl A2aStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        description: impl Into<String>,
        proposed_agents: Vec<String>,
        max_rounds: u32,
    ) -> A2aTask {
        let task = A2aTask::new(description, proposed_agents, max_rounds);
        self.tasks
            .lock()
            .unwrap()
            .insert(task.id.clone(), task.clone());
        task
    }

    pub fn get(&self, task_id: &str) -> Option<A2aTask> {
        self.tasks.lock().unwrap().get(task_id).cloned()
    }

    /// Tasks sorted newest first.
    pub fn list(&self) -> Vec<A2aTask> {
        let mut all: Vec<A2aTask> = self.tasks.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// Apply a status transition.  Illegal moves return the error and leave
    /// the stored task untouched.
    pub fn transition(&self, task_id: &str, to: A2aStatus) -> anyhow::Result<A2aTask> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(task_id)
            .with_context(|| format!("unknown a2a task: {task_id}"))?;
        task.transition(to).map_err(|e: TransitionError| anyhow::Error::new(e))?;
        Ok(task.clone())
    }

    /// Fix the confirmed participant list (planning-phase outcome).
    pub fn confirm_agents(&self, task_id: &str, agents: Vec<String>) -> anyhow::Result<A2aTask> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(task_id)
            .with_context(|| format!("unknown a2a task: {task_id}"))?;
        task.confirmed_agents = agents;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    pub fn set_result(&self, task_id: &str, result: impl Into<String>) -> anyhow::Result<()> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(task_id)
            .with_context(|| format!("unknown a2a task: {task_id}"))?;
        task.result = Some(result.into());
        task.updated_at = Utc::now();
        Ok(())
    }

    pub fn add_message(
        &self,
        task_id: &str,
        agent_id: &str,
        round: u32,
        msg_type: &str,
        content: impl Into<String>,
    ) -> A2aMessage {
        let msg = A2aMessage {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            agent_id: agent_id.to_string(),
            round,
            msg_type: msg_type.to_string(),
            content: content.into(),
            created_at: Utc::now(),
        };
        self.messages.lock().unwrap().push(msg.clone());
        msg
    }

    /// A task's messages ordered by `(round, created_at)`.
    pub fn messages(&self, task_id: &str) -> Vec<A2aMessage> {
        let mut out: Vec<A2aMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.task_id == task_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.round, a.created_at).cmp(&(b.round, b.created_at)));
        out
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
