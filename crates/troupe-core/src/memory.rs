// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Ports to the memory and retrieval collaborators.
//!
//! The graph memory store and the vector subsystem live outside the core;
//! the engine consumes them through these traits and degrades gracefully
//! when a call fails (log and continue without that context).  The in-memory
//! implementations back tests and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

/// Collection the engine indexes conversations into and recalls from.
pub const CONVERSATIONS_COLLECTION: &str = "conversations";

// ─── Memory port ──────────────────────────────────────────────────────────────

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Formatted context prompt for the given keywords; empty string when
    /// nothing relevant is stored.
    async fn recall(&self, agent_id: &str, keywords: &[String]) -> anyhow::Result<String>;

    /// Absorb a new piece of text with its keywords.
    async fn process(&self, agent_id: &str, text: &str, keywords: &[String])
        -> anyhow::Result<()>;

    /// Drop memories matching `pattern`; returns how many were removed.
    async fn forget(&self, agent_id: &str, pattern: &str) -> anyhow::Result<usize>;
}

struct MemoryEntry {
    text: String,
    keywords: Vec<String>,
    created_at: DateTime<Utc>,
}

/// Keyword-overlap memory for tests and single-process runs.
#[derive(Default)]
pub struct InMemoryMemory {
    entries: RwLock<HashMap<String, Vec<MemoryEntry>>>,
}

impl InMemoryMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemory {
    async fn recall(&self, agent_id: &str, keywords: &[String]) -> anyhow::Result<String> {
        let entries = self.entries.read().await;
        let Some(list) = entries.get(agent_id) else {
            return Ok(String::new());
        };
        let mut hits: Vec<&MemoryEntry> = list
            .iter()
            .filter(|e| e.keywords.iter().any(|k| keywords.contains(k)))
            .collect();
        if hits.is_empty() {
            return Ok(String::new());
        }
        hits.sort_by_key(|e| std::cmp::Reverse(e.created_at));
        let mut block = String::from("## Recalled memory\n");
        for e in hits.iter().take(10) {
            block.push_str(&format!("- {}\n", e.text));
        }
        Ok(block)
    }

    async fn process(
        &self,
        agent_id: &str,
        text: &str,
        keywords: &[String],
    ) -> anyhow::Result<()> {
        let mut entries = self.entries.write().await;
        entries
            .entry(agent_id.to_string())
            .or_default()
            .push(MemoryEntry {
                text: text.to_string(),
                keywords: keywords.to_vec(),
                created_at: Utc::now(),
            });
        Ok(())
    }

    async fn forget(&self, agent_id: &str, pattern: &str) -> anyhow::Result<usize> {
        let mut entries = self.entries.write().await;
        let Some(list) = entries.get_mut(agent_id) else {
            return Ok(0);
        };
        let before = list.len();
        list.retain(|e| !e.text.contains(pattern));
        Ok(before - list.len())
    }
}

// ─── RAG port ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RagHit {
    pub text: String,
    pub score: f32,
}

#[async_trait]
pub trait RagStore: Send + Sync {
    async fn search(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
    ) -> anyhow::Result<Vec<RagHit>>;

    async fn store(&self, collection: &str, text: &str, metadata: Value) -> anyhow::Result<()>;
}

/// Token-overlap retrieval for tests and single-process runs.  The real
/// vector subsystem replaces this behind the same trait.
#[derive(Default)]
pub struct InMemoryRag {
    collections: RwLock<HashMap<String, Vec<(String, Value)>>>,
}

impl InMemoryRag {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RagStore for InMemoryRag {
    async fn search(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
    ) -> anyhow::Result<Vec<RagHit>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let terms: Vec<String> = crate::keywords::extract_keywords(query);
        let mut scored: Vec<RagHit> = docs
            .iter()
            .filter_map(|(text, _)| {
                let lower = text.to_lowercase();
                let overlap = terms.iter().filter(|t| lower.contains(t.as_str())).count();
                (overlap > 0).then(|| RagHit {
                    text: text.clone(),
                    score: overlap as f32 / terms.len().max(1) as f32,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn store(&self, collection: &str, text: &str, metadata: Value) -> anyhow::Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push((text.to_string(), metadata));
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
