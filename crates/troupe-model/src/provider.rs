// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::types::{ChatChunk, ChatRequest, ChatResponse};

pub type ChatStream = Pin<Box<dyn Stream<Item = anyhow::Result<ChatChunk>> + Send>>;

/// Capability set every backend variant must provide.
///
/// Implementations are shared (`Arc<dyn LlmProvider>`) and must be safe for
/// concurrent use; the HTTP drivers share one `reqwest::Client` per instance.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable provider id for routing and status display.
    fn name(&self) -> &str;

    /// One complete (non-streaming) chat turn.
    async fn chat(&self, req: ChatRequest) -> anyhow::Result<ChatResponse>;

    /// Streaming chat turn; yields text deltas until the provider finishes.
    async fn chat_stream(&self, req: ChatRequest) -> anyhow::Result<ChatStream>;

    /// Model ids available from this backend.
    async fn list_models(&self) -> anyhow::Result<Vec<String>>;

    /// Cheap liveness probe.  The default implementation reuses the model
    /// listing; drivers with a dedicated endpoint can override.
    async fn health_check(&self) -> anyhow::Result<()> {
        self.list_models().await.map(|_| ())
    }
}
