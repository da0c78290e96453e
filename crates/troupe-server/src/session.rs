// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Session persistence: at most one session per
//! `(agent_id, platform, channel_id)`, with append-only messages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub agent_id: String,
    pub platform: String,
    pub channel_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub id: String,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Lazily create a session; the same tuple always yields the same id.
    async fn find_or_create(
        &self,
        agent_id: &str,
        platform: &str,
        channel_id: &str,
    ) -> anyhow::Result<SessionRecord>;

    async fn append(&self, session_id: &str, role: &str, content: &str) -> anyhow::Result<()>;

    /// Messages in append (wall-clock) order.
    async fn messages(&self, session_id: &str) -> anyhow::Result<Vec<SessionMessage>>;
}

/// In-process store backed by concurrent maps.
#[derive(Default)]
pub struct MemorySessionStore {
    /// `(agent, platform, channel)` key → session id.
    index: DashMap<String, String>,
    sessions: DashMap<String, SessionRecord>,
    messages: DashMap<String, Vec<SessionMessage>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(agent_id: &str, platform: &str, channel_id: &str) -> String {
        format!("{agent_id}|{platform}|{channel_id}")
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find_or_create(
        &self,
        agent_id: &str,
        platform: &str,
        channel_id: &str,
    ) -> anyhow::Result<SessionRecord> {
        let key = Self::key(agent_id, platform, channel_id);
        // entry() keeps concurrent callers from racing two sessions into
        // existence for the same tuple.
        let id_entry = self.index.entry(key).or_insert_with(|| {
            let record = SessionRecord {
                id: Uuid::new_v4().to_string(),
                agent_id: agent_id.to_string(),
                platform: platform.to_string(),
                channel_id: channel_id.to_string(),
                status: "active".into(),
                created_at: Utc::now(),
            };
            let id = record.id.clone();
            self.sessions.insert(id.clone(), record);
            self.messages.insert(id.clone(), Vec::new());
            id
        });
        let id = id_entry.value().clone();
        drop(id_entry);
        self.sessions
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| anyhow::anyhow!("session index points at a missing record: {id}"))
    }

    async fn append(&self, session_id: &str, role: &str, content: &str) -> anyhow::Result<()> {
        let mut list = self
            .messages
            .get_mut(session_id)
            .ok_or_else(|| anyhow::anyhow!("unknown session: {session_id}"))?;
        list.push(SessionMessage {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn messages(&self, session_id: &str) -> anyhow::Result<Vec<SessionMessage>> {
        Ok(self
            .messages
            .get(session_id)
            .map(|l| l.value().clone())
            .unwrap_or_default())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_or_create_is_idempotent_per_tuple() {
        let store = MemorySessionStore::new();
        let first = store.find_or_create("a1", "slack", "ch1").await.unwrap();
        let second = store.find_or_create("a1", "slack", "ch1").await.unwrap();
        assert_eq!(first.id, second.id);

        let other_channel = store.find_or_create("a1", "slack", "ch2").await.unwrap();
        assert_ne!(first.id, other_channel.id);
        let other_platform = store.find_or_create("a1", "rest", "ch1").await.unwrap();
        assert_ne!(first.id, other_platform.id);
    }

    #[tokio::test]
    async fn appends_grow_by_exactly_the_appended_count() {
        let store = MemorySessionStore::new();
        let session = store.find_or_create("a1", "slack", "ch1").await.unwrap();
        store.append(&session.id, "user", "hi").await.unwrap();
        store.append(&session.id, "assistant", "hello").await.unwrap();

        // Re-resolving the session must not touch the message log.
        store.find_or_create("a1", "slack", "ch1").await.unwrap();
        let messages = store.messages(&session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "assistant");
    }

    #[tokio::test]
    async fn append_to_unknown_session_errors() {
        let store = MemorySessionStore::new();
        assert!(store.append("ghost", "user", "x").await.is_err());
    }

    #[tokio::test]
    async fn concurrent_find_or_create_yields_one_session() {
        let store = std::sync::Arc::new(MemorySessionStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.find_or_create("a1", "slack", "ch1").await.unwrap().id
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }
}
