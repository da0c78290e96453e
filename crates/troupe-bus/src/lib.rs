// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-recipient message streams with blocking consume.
//!
//! Each recipient owns a stream keyed `STREAM_PREFIX + recipient_id`.
//! Subscribers receive messages in publish order through a bounded channel;
//! a slow subscriber makes publishers wait rather than lose messages.
//! Re-subscription starts at "now": only messages published after the
//! subscribe call are delivered.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Stream key prefix shared by all bus backends.
pub const STREAM_PREFIX: &str = "agent:stream:";

/// Per-subscriber channel capacity.
pub const SUBSCRIBE_BUFFER: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub id: String,
    pub from: String,
    pub to: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl BusMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from: from.into(),
            to: to.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn stream_key(&self) -> String {
        format!("{STREAM_PREFIX}{}", self.to)
    }
}

/// A live subscription.  Dropping it (or calling [`cancel`]) detaches the
/// subscriber from the stream.
pub struct Subscription {
    rx: mpsc::Receiver<BusMessage>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BusMessage> {
        self.rx.try_recv().ok()
    }

    pub fn cancel(&mut self) {
        self.rx.close();
    }
}

/// Abstract bus: external backends implement this over their own streams and
/// tolerate transient errors by continuing to poll.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Append to the recipient's stream and deliver to live subscribers.
    /// Must not silently drop messages for slow subscribers.
    async fn publish(&self, msg: BusMessage) -> anyhow::Result<()>;

    /// Start consuming a recipient's stream from now.
    async fn subscribe(&self, agent_id: &str) -> anyhow::Result<Subscription>;
}

#[derive(Default)]
struct StreamState {
    /// Append-only log; subscribers joining later do not replay it.
    log: Vec<BusMessage>,
    subscribers: Vec<mpsc::Sender<BusMessage>>,
}

/// In-process bus implementation.
#[derive(Default)]
pub struct MemoryBus {
    streams: Mutex<HashMap<String, StreamState>>,
}

impl MemoryBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Length of a recipient's stream log (observability/tests).
    pub async fn stream_len(&self, agent_id: &str) -> usize {
        let streams = self.streams.lock().await;
        streams
            .get(&format!("{STREAM_PREFIX}{agent_id}"))
            .map(|s| s.log.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, msg: BusMessage) -> anyhow::Result<()> {
        let key = msg.stream_key();
        // Snapshot senders so the lock is not held across channel sends;
        // sends block when a subscriber's buffer is full.
        let senders: Vec<mpsc::Sender<BusMessage>> = {
            let mut streams = self.streams.lock().await;
            let state = streams.entry(key.clone()).or_default();
            state.log.push(msg.clone());
            state.subscribers.retain(|s| !s.is_closed());
            state.subscribers.clone()
        };
        debug!(stream = %key, subscribers = senders.len(), "published message");
        for sender in senders {
            // A receiver cancelled between snapshot and send is not a loss.
            let _ = sender.send(msg.clone()).await;
        }
        Ok(())
    }

    async fn subscribe(&self, agent_id: &str) -> anyhow::Result<Subscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIBE_BUFFER);
        let mut streams = self.streams.lock().await;
        streams
            .entry(format!("{STREAM_PREFIX}{agent_id}"))
            .or_default()
            .subscribers
            .push(tx);
        Ok(Subscription { rx })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
