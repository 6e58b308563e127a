mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use config::Config;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Declarative access-control provisioning scripts.
#[derive(Parser)]
#[command(name = "warden", version, about = "Declarative access-control provisioning scripts")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Configuration file (default: ./warden.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory script identifiers resolve against
    #[arg(long, global = true)]
    scripts_dir: Option<PathBuf>,

    /// Repository state file
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Execution history file
    #[arg(long, global = true)]
    history_file: Option<PathBuf>,

    /// Principal recorded on history records
    #[arg(long, global = true)]
    principal: Option<String>,

    /// Per repository call timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, validate and resolve a script; print its checksum
    Check {
        /// Script identifier, relative to the scripts directory
        script: String,
    },

    /// Print the compiled action list as JSON
    Compile {
        /// Script identifier, relative to the scripts directory
        script: String,
    },

    /// Report what applying a script would change, without changing anything
    DryRun {
        /// Script identifier, relative to the scripts directory
        script: String,
    },

    /// Apply a script to the repository state
    Apply {
        /// Script identifier, relative to the scripts directory
        script: String,
        /// Execute even if this script version already applied successfully
        #[arg(long)]
        rerun: bool,
    },

    /// List recorded executions of a script, newest first
    History {
        /// Script identifier, relative to the scripts directory
        script: String,
        /// Maximum number of records to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

/// Resolved settings shared by every command.
pub(crate) struct Context {
    pub config: Config,
    pub output: OutputFormat,
    pub quiet: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("WARDEN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, cli.output, cli.quiet);
            process::exit(1);
        }
    };
    if let Some(dir) = cli.scripts_dir {
        config.scripts_dir = dir;
    }
    if let Some(file) = cli.state_file {
        config.state_file = file;
    }
    if let Some(file) = cli.history_file {
        config.history_file = file;
    }
    if let Some(principal) = cli.principal {
        config.principal = principal;
    }
    if let Some(ms) = cli.timeout_ms {
        config.call_timeout_ms = ms;
    }
    let ctx = Context {
        config,
        output: cli.output,
        quiet: cli.quiet,
    };

    let code = match cli.command {
        Commands::Check { script } => commands::check::cmd_check(&ctx, &script),
        Commands::Compile { script } => commands::compile::cmd_compile(&ctx, &script),
        Commands::DryRun { script } => {
            commands::run::cmd_run(&ctx, &script, warden_engine::Mode::DryRun, false)
        }
        Commands::Apply { script, rerun } => {
            commands::run::cmd_run(&ctx, &script, warden_engine::Mode::Apply, rerun)
        }
        Commands::History { script, limit } => {
            commands::history::cmd_history(&ctx, &script, limit)
        }
    };
    process::exit(code);
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
