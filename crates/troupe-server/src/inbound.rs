// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user message normalized across platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub platform: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// A reply headed back to a platform channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub platform: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastType {
    Announcement,
    TaskComplete,
    WorldEvent,
    DailyDigest,
}

/// A one-to-many notification pushed to platform adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broadcast {
    #[serde(rename = "type")]
    pub broadcast_type: BroadcastType,
    pub title: String,
    pub content: String,
    pub agent_id: String,
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<String>>,
}

impl Broadcast {
    /// Render into the text body adapters deliver.
    pub fn render(&self) -> String {
        format!("**{}**\n{}", self.title, self.content)
    }
}

/// Delivery port to the platform adapters.  The router never retries a
/// failed delivery; adapters own their own semantics.
#[async_trait]
pub trait OutboundGateway: Send + Sync {
    async fn send(&self, msg: OutboundMessage) -> anyhow::Result<()>;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
