//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gridconf - declarative configuration tool for grid middleware.
#[derive(Parser, Debug)]
#[command(name = "gridconf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the site configuration file.
    #[arg(
        short,
        long,
        global = true,
        env = "GRIDCONF_CONFIG",
        default_value = "/etc/gridconf/config.ini"
    )]
    pub config: PathBuf,

    /// Treat this host as a compute entry point.
    #[arg(long, global = true, env = "GRIDCONF_CE")]
    pub ce: bool,

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
    /// Parse, validate, and apply the configuration, then write the
    /// external-attribute file.
    Run {
        /// Where to write the merged attribute file.
        #[arg(long, default_value = "/etc/gridconf/attributes.conf")]
        attributes_file: PathBuf,
    },

    /// Parse and validate only; touch nothing.
    Check,
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

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_subcommand_parses() {
        let cli = Cli::try_parse_from(["gridconf", "--ce", "check"]).unwrap();
        assert!(cli.ce);
        assert!(matches!(cli.command, Commands::Check));
    }

    #[test]
    fn test_run_accepts_attribute_path() {
        let cli = Cli::try_parse_from([
            "gridconf",
            "run",
            "--attributes-file",
            "/tmp/attributes.conf",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { attributes_file } => {
                assert_eq!(attributes_file, PathBuf::from("/tmp/attributes.conf"));
            }
            Commands::Check => panic!("expected run"),
        }
    }
}
