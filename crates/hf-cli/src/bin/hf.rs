//! Hotfix CLI Binary
//!
//! # Usage
//!
//! ```bash
//! # Serve the demo service with the operator shell on TCP
//! hf serve --listen 127.0.0.1:3333
//!
//! # Apply a patch in-process and show its effect
//! hf apply patches/patch_http.rs "patch_test_handler()"
//!
//! # Dry-run a patch
//! hf check patches/patch_recovery.rs "patch_recovery_handler()"
//!
//! # List every symbol scripts can import
//! hf symbols --json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use hf_cli::{
    commands::{
        self, apply::ApplyArgs, check::CheckArgs, serve::ServeArgs, symbols::SymbolsArgs,
    },
    config::HotfixConfig,
    diagnostics::{render_cli_error, setup_error_reporting},
    Result,
};
use std::path::PathBuf;
use tracing::{debug, error};

#[derive(Parser)]
#[command(
    name = "hf",
    version = env!("CARGO_PKG_VERSION"),
    about = "Hotfix: replace method implementations in a running service",
    long_about = r#"
Hotfix loads a patch script written in a Rust syntax subset, evaluates an expression to a
`hotfix::FuncPatch` and redirects the named method of a live service to the replacement.

EXAMPLES:
    hf serve                                              # Operator shell on 127.0.0.1:3333
    hf apply patches/patch_http.rs "patch_test_handler()" # Patch the demo service once
    hf check patches/patch_http.rs "patch_test_handler()" # Dry run
    "#
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use multiple times for increased verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Set log level (overrides --verbose/--quiet)
    #[arg(long, global = true, value_enum)]
    log: Option<LogLevel>,

    /// Set log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    directory: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// `-q` wins over `-v`; an explicit `--log` wins over both.
    fn select(explicit: Option<LogLevel>, verbose: u8, quiet: bool) -> LogLevel {
        match (explicit, quiet, verbose) {
            (Some(level), _, _) => level,
            (None, true, _) => LogLevel::Error,
            (None, false, 0) => LogLevel::Info,
            (None, false, 1) => LogLevel::Debug,
            (None, false, _) => LogLevel::Trace,
        }
    }

    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the demo service and the operator shell
    Serve(ServeArgs),

    /// Apply a patch to the demo service and show its effect
    Apply(ApplyArgs),

    /// Check a patch without installing it
    Check(CheckArgs),

    /// List the symbols visible to patch scripts
    Symbols(SymbolsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_error_reporting()?;
    setup_logging(LogLevel::select(cli.log, cli.verbose, cli.quiet), cli.log_format);

    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir)?;
    }

    let config = HotfixConfig::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Serve(args) => commands::serve_command(args, &config).await,
        Commands::Apply(args) => commands::apply_command(args, &config).await,
        Commands::Check(args) => commands::check_command(args, &config).await,
        Commands::Symbols(args) => commands::symbols_command(args, &config).await,
    };

    if let Err(e) = result {
        if !render_cli_error(&e) {
            error!("{e}");
        }
        debug!(?e, "command failed");
        std::process::exit(1);
    }
    debug!("command completed");
    Ok(())
}

fn setup_logging(level: LogLevel, log_format: LogFormat) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::new(level.directive());

    // stdout is reserved for command output
    let formatter = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_level(true);

    match log_format {
        LogFormat::Pretty => tracing_subscriber::registry().with(formatter).with(filter).init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(formatter.json())
            .with(filter)
            .init(),
    }
}
