//! gridconf CLI entrypoint.
//!
//! This is the main entrypoint for the gridconf command-line tool.

use std::process::ExitCode;

use gridconf::cli::{Cli, Commands, OutputFormatter};
use gridconf::config::{Context, IniConfig};
use gridconf::error::Result;
use gridconf::export;
use gridconf::orchestrator::Orchestrator;

use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    // Load .env if present (GRIDCONF_CONFIG, GRIDCONF_HOSTNAME, ...).
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Runs the selected command; returns whether the run was clean.
fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);
    let config = IniConfig::load(&cli.config)?;
    let ctx = Context::discover(cli.ce);
    debug!(config = %cli.config.display(), ce = cli.ce, "Starting");

    let mut orchestrator = Orchestrator::with_default_registry();

    match cli.command {
        Commands::Run { attributes_file } => {
            let result = orchestrator.run(&config, &ctx)?;
            print!("{}", formatter.format_result(&result, true));

            // The attribute file is only ever written for a clean run.
            if result.ok {
                export::write_attributes_file(&attributes_file, &result.attributes)?;
                debug!(
                    digest = export::attributes_digest(&result.attributes),
                    "Attribute set written"
                );
            }
            Ok(result.ok)
        }
        Commands::Check => {
            let result = orchestrator.check(&config, &ctx)?;
            print!("{}", formatter.format_result(&result, false));
            Ok(result.ok)
        }
    }
}
