//! U2F demo CLI - drive registration and signing ceremonies against a
//! simulated security key.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  64  Usage error (bad arguments, origin or field)
  65  Data error (response could not be parsed)
  66  Input file not found or unreadable
  69  Device reported an error code
  74  I/O error";

#[derive(Parser)]
#[command(name = "u2f-demo")]
#[command(author, version, about = "FIDO U2F ceremony demo client", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only print results, no progress or decoration
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options for the simulated authenticator and the ceremony budget.
#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Page origin the relying-party id is derived from [env: U2F_ORIGIN]
    #[arg(long)]
    pub origin: Option<String>,

    /// Ceremony budget in seconds [env: U2F_TIMEOUT_SECS]
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Time the simulated key takes to be touched
    #[arg(long, value_name = "MS", default_value_t = 1500)]
    pub latency_ms: u64,

    /// Seed for the simulated key material
    #[arg(long, default_value_t = 0xDEAD_BEEF_CAFE_BABE)]
    pub seed: u64,

    /// Make the device answer with this error code
    #[arg(long, value_name = "CODE")]
    pub fail: Option<u16>,

    /// Make the device never answer, so the ceremony times out
    #[arg(long, conflicts_with = "fail")]
    pub hang: bool,

    /// Print the resulting state record as JSON
    #[arg(long)]
    pub json: bool,
}

/// Which raw response a file holds.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ResponseKind {
    Registration,
    Signature,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new key with the simulated authenticator
    Register {
        /// Registration challenge (defaults to U2F_REGISTER_CHALLENGE or the built-in one)
        #[arg(long)]
        challenge: Option<String>,

        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Sign a challenge with a registered key handle
    Sign {
        /// Websafe base64 key handle from a registration
        #[arg(long)]
        key_handle: String,

        /// Signing challenge (defaults to U2F_SIGN_CHALLENGE or the built-in one)
        #[arg(long)]
        challenge: Option<String>,

        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Run the whole page flow: register on #reg, then sign on #sig
    Demo {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Parse a raw device response (JSON) into its fields
    Parse {
        /// Kind of response in the input
        #[arg(value_enum)]
        kind: ResponseKind,

        /// Path to the response JSON, or `-` for stdin
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show how a fragment identifier is routed
    Route {
        /// Fragment, with or without the leading `#`
        #[arg(value_name = "FRAGMENT", allow_hyphen_values = true)]
        fragment: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;

    match cli.command {
        Commands::Register { challenge, device } => {
            commands::register::execute(challenge, device, quiet).await
        }
        Commands::Sign {
            key_handle,
            challenge,
            device,
        } => commands::sign::execute(key_handle, challenge, device, quiet).await,
        Commands::Demo { device } => commands::demo::execute(device, quiet).await,
        Commands::Parse { kind, input } => commands::parse::execute(kind, input),
        Commands::Route { fragment, json } => commands::route::execute(&fragment, json),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version are not errors
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(exit_codes::USAGE_ERROR);
        }
    };

    init_tracing(cli.verbose, cli.quiet);

    if let Err(err) = run(cli).await {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = &exit.message {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
        std::process::exit(exit.code);
    }
}
