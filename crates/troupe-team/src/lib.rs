// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Teams: the member registry, the bounded parallel scheduler that fans
//! sub-tasks out onto agents, and the steward that decomposes a team task,
//! dispatches it, and aggregates the results.

pub mod scheduler;
pub mod steward;
pub mod team;

pub use scheduler::{SubTask, TaskResult, TaskScheduler, TaskStatus, POOL_SIZE};
pub use steward::{DecompositionPlan, Intent, PlannedTask, Steward, StewardResult};
pub use team::{Team, TeamMember, TeamStore};
