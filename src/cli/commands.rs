//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::resource::ResourceType;

/// Skald - Promote notification configuration between environments.
#[derive(Parser, Debug)]
#[command(name = "skald")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the promotion settings file.
    #[arg(short, long, global = true, env = "SKALD_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare two environments and show what a publish would change.
    Diff {
        /// Bundle file holding the organization's environments and resources.
        bundle: PathBuf,

        /// Source environment id.
        source: String,

        /// Target environment id.
        target: String,

        /// Restrict the comparison to these resource types.
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        types: Vec<ResourceType>,
    },

    /// Publish the source environment's state into the target.
    Publish {
        /// Bundle file holding the organization's environments and resources.
        bundle: PathBuf,

        /// Source environment id.
        source: String,

        /// Target environment id.
        target: String,

        /// Principal performing the promotion.
        #[arg(short, long, env = "SKALD_ACTOR")]
        actor: Option<String>,

        /// Restrict the publish to these resource types.
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        types: Vec<ResourceType>,

        /// Delete target resources that no longer exist in the source.
        #[arg(long)]
        prune: bool,

        /// Number of entries applied per batch.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Replay one resource's change history into a target environment.
    PromoteChange {
        /// Bundle file holding the organization's environments and resources.
        bundle: PathBuf,

        /// Type of the resource to promote.
        resource_type: ResourceType,

        /// Source-environment id of the resource.
        resource_id: String,

        /// Target environment id.
        target: String,

        /// Principal performing the promotion.
        #[arg(short, long, env = "SKALD_ACTOR")]
        actor: Option<String>,
    },

    /// Show the state a resource's change history folds down to.
    Aggregate {
        /// Bundle file holding the organization's change history.
        bundle: PathBuf,

        /// Type of the resource to inspect.
        resource_type: ResourceType,

        /// Source-environment id of the resource.
        resource_id: String,
    },

    /// List the environments in a bundle and their promotion edges.
    Environments {
        /// Bundle file holding the organization's environments.
        bundle: PathBuf,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
