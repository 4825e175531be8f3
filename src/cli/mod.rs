//! CLI module for the gridconf tool.
//!
//! This module provides the command-line interface for running and
//! checking grid middleware configuration.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
