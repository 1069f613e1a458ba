//! Remendador: CLI for Remendar reference namespace files
//!
//! ## Usage
//!
//! ```bash
//! remendador check refs/*.json                          # Validate namespaces
//! remendador show refs/login.json loginButton           # Print one entry
//! remendador promote refs/login.json loginButton '#ok'  # Manual heal
//! ```

use clap::Parser;
use remendar::logging::{self, LogFormat};
use remendar_cli::{handlers, Cli, CliConfig, CliResult, Commands, Verbosity};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let _ = logging::init_with(LogFormat::Pretty, config.verbosity.log_directive());

    match cli.command {
        Commands::Check(args) => handlers::execute_check(&config, &args),
        Commands::Show(args) => handlers::execute_show(&config, &args),
        Commands::Promote(args) => handlers::execute_promote(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliResult<CliConfig> {
    let healer = CliConfig::load_healer(cli.config.as_deref())?;
    Ok(CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_healer(healer))
}
