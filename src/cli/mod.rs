//! CLI module for the Skald promotion tool.
//!
//! This module provides the command-line interface for diffing and
//! publishing notification configuration between environments.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
