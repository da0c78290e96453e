// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The server surface: normalized inbound/outbound message shapes, the
//! priority inbound router, session persistence, the heartbeat clock
//! listener, and REST ingestion.

pub mod heartbeat;
pub mod http;
pub mod inbound;
pub mod router;
pub mod session;

pub use heartbeat::{ClockListener, Heartbeat, MemoryScheduleSink, ScheduleSink, HEARTBEAT_PROMPT};
pub use http::{serve, RestGateway, RestState};
pub use inbound::{Broadcast, BroadcastType, InboundMessage, OutboundMessage, OutboundGateway};
pub use router::InboundRouter;
pub use session::{MemorySessionStore, SessionMessage, SessionRecord, SessionStore};
