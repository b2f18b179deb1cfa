// shopsync CLI - stock vs. webshop reconciliation

mod check;
mod exit_codes;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use exit_codes::{io_exit_code, recon_exit_code, EXIT_SUCCESS};

#[derive(Parser)]
#[command(name = "shopsync")]
#[command(about = "Compare the stock report with the webshop and list what to change")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Log more (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a classification pass from a TOML config file
    #[command(after_help = "\
Examples:
  shopsync run weekly.recon.toml
  shopsync run weekly.recon.toml --json
  shopsync run weekly.recon.toml --output result.json --fail-on-action")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Print the JSON report to stdout
        #[arg(long)]
        json: bool,

        /// Write the JSON report to this file (overrides [output].json)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit 1 when any product needs action
        #[arg(long)]
        fail_on_action: bool,
    },

    /// Run a one-off pass without a config file
    #[command(after_help = "\
Examples:
  shopsync check --stock voorraad.xlsx --listing website.csv
  shopsync check --stock voorraad.xlsx --listing website.csv --variants artikeltabel.xlsx \\
      --special Jersey --threshold 'Holstein zwartbont=25' --out-dir out --format csv")]
    Check(check::CheckArgs),

    /// Validate a config and the headers of its reports without classifying
    #[command(after_help = "\
Examples:
  shopsync validate weekly.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\nengine:  shopsync-recon ",
        env!("CARGO_PKG_VERSION"),
        "\nreport:  json v1",
    )
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            json,
            output,
            fail_on_action,
        } => recon::cmd_run(config, json, output, fail_on_action),
        Commands::Check(args) => check::cmd_check(args),
        Commands::Validate { config } => recon::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError {
            code,
            message,
            hint,
        }) => {
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

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<shopsync_recon::ReconError> for CliError {
    fn from(err: shopsync_recon::ReconError) -> Self {
        let code = recon_exit_code(&err);
        let hint = match &err {
            shopsync_recon::ReconError::Schema(_) => {
                Some("check that each report was passed for the right source, or add [sources.<name>.aliases]".to_string())
            }
            _ => None,
        };
        Self {
            code,
            message: err.to_string(),
            hint,
        }
    }
}

impl From<shopsync_io::IoError> for CliError {
    fn from(err: shopsync_io::IoError) -> Self {
        Self::new(io_exit_code(&err), err.to_string())
    }
}
