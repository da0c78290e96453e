// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "troupe", about = "A multi-agent LLM orchestration server", version)]
pub struct Cli {
    /// Path to the configuration file (default: troupe.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the orchestration server (the default)
    Serve,
    /// Print the resolved configuration as YAML
    ShowConfig,
    /// List configured LLM providers
    ListProviders,
}
