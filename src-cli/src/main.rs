//! Skusho Command-Line Interface
//!
//! Drives the capture service over its local socket: start and stop the
//! mirroring session, trigger bursts and inspect the unlock window.

mod client;
mod colors;
mod commands;
mod exit_codes;

use clap::{Parser, Subcommand};
use exit_codes::ExitCode;

/// Skusho - Burst Screenshot CLI
#[derive(Parser, Debug)]
#[command(name = "skusho")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a capture session
    Start {
        /// Consent token returned by the system mirroring prompt
        #[arg(long)]
        consent: String,
    },
    /// Stop the current capture session
    Stop,
    /// Show service status
    Status,
    /// Capture a burst now
    Capture,
    /// Open the capture unlock window after a completed reward
    Unlock,
    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}", colors::error(&format!("Failed to create runtime: {}", e)));
            std::process::exit(ExitCode::GeneralError.as_i32());
        }
    };

    let exit_code = runtime.block_on(run(cli));
    std::process::exit(exit_code.as_i32());
}

async fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Commands::Start { consent } => commands::start(consent, cli.json, cli.quiet).await,
        Commands::Stop => commands::stop(cli.json, cli.quiet).await,
        Commands::Status => commands::status(cli.json, cli.quiet).await,
        Commands::Capture => commands::capture(cli.json, cli.quiet).await,
        Commands::Unlock => commands::unlock(cli.json, cli.quiet).await,
        Commands::Version => {
            commands::version(cli.json);
            ExitCode::Success
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    /// Verify the CLI definition is valid
    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_start_with_consent() {
        let cli = Cli::try_parse_from(["skusho", "start", "--consent", "granted"]).unwrap();
        assert!(!cli.json);
        assert!(!cli.quiet);
        match cli.command {
            Commands::Start { consent } => assert_eq!(consent, "granted"),
            _ => panic!("Expected Start command"),
        }
    }

    #[test]
    fn start_requires_consent() {
        assert!(Cli::try_parse_from(["skusho", "start"]).is_err());
    }

    #[test]
    fn parse_status_with_json() {
        let cli = Cli::try_parse_from(["skusho", "status", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn parse_global_quiet() {
        let cli = Cli::try_parse_from(["skusho", "-q", "capture"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Capture));
    }

    #[test]
    fn parse_simple_commands() {
        let parse = |cmd: &str| Cli::try_parse_from(["skusho", cmd]).unwrap().command;
        assert!(matches!(parse("stop"), Commands::Stop));
        assert!(matches!(parse("unlock"), Commands::Unlock));
        assert!(matches!(parse("version"), Commands::Version));
    }

    #[test]
    fn parse_unknown_command_fails() {
        assert!(Cli::try_parse_from(["skusho", "record"]).is_err());
    }
}
