//! CLI module for the stratus stack planner.
//!
//! This module provides the command-line interface for validating,
//! planning and rendering stacks.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, StateCommands};
pub use output::OutputFormatter;
