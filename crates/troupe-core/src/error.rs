// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Failures the engine surfaces to its callers.
///
/// Tool failures never appear here: they are converted into `{"error":...}`
/// tool results inside the loop so the model can observe and recover.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// The provider router exhausted the primary and every fallback.
    #[error("provider failure: {0}")]
    Provider(#[source] anyhow::Error),

    #[error("execution cancelled")]
    Cancelled,
}
