// nutslink CLI - reconcile NUTS classifications with geometries and a
// name directory

mod directory;
mod exit_codes;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "nutslink")]
#[command(about = "Reconcile region classifications, boundary geometries and name directories")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  nutslink run nuts2016.recon.toml
  nutslink run nuts2016.recon.toml --json
  nutslink run nuts2016.recon.toml --output result.json
  nutslink run nuts2016.recon.toml --strict -v")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Print the JSON result to stdout
        #[arg(long)]
        json: bool,

        /// Write the JSON result to this file (overrides output.json)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit non-zero when any discrepancy is reported
        #[arg(long)]
        strict: bool,
    },

    /// Compare classification codes with geometry codes
    #[command(after_help = "\
Examples:
  nutslink check nuts2016.recon.toml
  nutslink check nuts2016.recon.toml --json")]
    Check {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Output JSON to stdout instead of a listing
        #[arg(long)]
        json: bool,

        /// Exit non-zero when the code sets differ
        #[arg(long)]
        strict: bool,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  nutslink validate nuts2016.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  nutslink-recon ", env!("CARGO_PKG_VERSION"),
    )
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::from(EXIT_SUCCESS)
            };
        }
    };

    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, json, output, strict } => recon::cmd_run(config, json, output, strict),
        Commands::Check { config, json, strict } => recon::cmd_check(config, json, strict),
        Commands::Validate { config } => recon::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
