// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! REST ingestion: `POST /message` synthesizes an inbound message on a
//! per-request channel, waits on a 1-buffered reply channel, and answers
//! with the first outbound message, or 504 when the agent does not reply
//! in time.  The in-flight execution is not cancelled on timeout; its late
//! reply is dropped at send time because the waiter is gone.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::inbound::{InboundMessage, OutboundGateway, OutboundMessage};
use crate::router::InboundRouter;

pub const REST_PLATFORM: &str = "rest";

/// Waiters keyed by per-request channel id.
type PendingReplies = Arc<DashMap<String, mpsc::Sender<OutboundMessage>>>;

/// Gateway half: delivers replies to the waiter for their channel, or drops
/// them when the waiter timed out and left.
pub struct RestGateway {
    pending: PendingReplies,
}

impl RestGateway {
    pub fn new() -> (Arc<Self>, PendingReplies) {
        let pending: PendingReplies = Arc::new(DashMap::new());
        (
            Arc::new(Self {
                pending: pending.clone(),
            }),
            pending,
        )
    }
}

#[async_trait]
impl OutboundGateway for RestGateway {
    async fn send(&self, msg: OutboundMessage) -> anyhow::Result<()> {
        match self.pending.get(&msg.channel_id) {
            Some(tx) => {
                // 1-buffered: only the first reply counts.
                let _ = tx.try_send(msg);
            }
            None => {
                debug!(channel = %msg.channel_id, "no waiter for reply; dropping");
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct RestState {
    pub router: Arc<InboundRouter>,
    pub pending: PendingReplies,
    pub reply_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct RestMessage {
    user_id: String,
    user_name: String,
    content: String,
}

/// Build the axum application.
pub fn app(state: RestState) -> axum::Router {
    axum::Router::new()
        .route("/message", post(post_message))
        .with_state(state)
}

/// Bind and serve until the process stops.
pub async fn serve(state: RestState, listen: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(addr = %listen, "rest surface listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn post_message(State(state): State<RestState>, Json(body): Json<RestMessage>) -> Response {
    if body.content.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "content must not be empty").into_response();
    }

    // A unique channel per request keeps replies from crossing callers.
    let channel_id = format!("rest-{}", Uuid::new_v4());
    let (tx, mut rx) = mpsc::channel(1);
    state.pending.insert(channel_id.clone(), tx);

    let inbound = InboundMessage {
        platform: REST_PLATFORM.into(),
        channel_id: channel_id.clone(),
        user_id: body.user_id,
        user_name: body.user_name,
        content: body.content,
        timestamp: Utc::now(),
        reply_to: None,
    };
    let router = state.router.clone();
    tokio::spawn(async move {
        router.handle(inbound).await;
    });

    let reply = tokio::time::timeout(state.reply_timeout, rx.recv()).await;
    state.pending.remove(&channel_id);

    match reply {
        Ok(Some(outbound)) => Json(outbound).into_response(),
        _ => (StatusCode::GATEWAY_TIMEOUT, "agent did not reply in time").into_response(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
