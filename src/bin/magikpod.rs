//! magikpod - pod control plane CLI
//!
//! ## Usage
//!
//! ```sh
//! magikpod app exec [--app NAME] <UUID> <CMD> [ARGS...]
//! magikpod app stop [--app NAME] <UUID>
//! magikpod app list [--full] [--no-legend] [PREFIX]
//! ```
//!
//! `exec` and `stop` exit the way the command run inside the pod exited.
//! Resolution failures exit 1.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use magikpod::commands::{self, ListOptions};
use magikpod::constants::{DATA_DIR_ENV, DEFAULT_DATA_DIR, INSECURE_OPTIONS_ENV};
use magikpod::{Config, SecFlags, Stage0Bridge, forward_exit};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{ExitCode, ExitStatus};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI Definition
// =============================================================================

/// Pod runtime control plane
#[derive(Parser)]
#[command(name = "magikpod")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory holding pods and the image store
    #[arg(long = "dir", global = true, env = DATA_DIR_ENV, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Comma-separated security checks to skip (none, image, tls, ondisk, http, pubkey, all)
    #[arg(long, global = true, env = INSECURE_OPTIONS_ENV, default_value = "none")]
    insecure_options: String,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Operate on apps of a pod
    #[command(subcommand)]
    App(AppCommands),
}

#[derive(Subcommand)]
enum AppCommands {
    /// Execute a command inside an app of a running pod
    Exec(ExecArgs),

    /// Stop an app of a running pod
    Stop(StopArgs),

    /// List the apps of all pods
    List(ListArgs),
}

#[derive(Args)]
struct ExecArgs {
    /// Name of the app to enter
    #[arg(long)]
    app: Option<String>,

    /// Pod UUID or unambiguous UUID prefix
    uuid: String,

    /// Command and arguments to run
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Args)]
struct StopArgs {
    /// Name of the app to stop
    #[arg(long)]
    app: Option<String>,

    /// Pod UUID or unambiguous UUID prefix
    uuid: String,
}

#[derive(Args)]
struct ListArgs {
    /// Show image IDs and absolute timestamps
    #[arg(long)]
    full: bool,

    /// Do not print the header line
    #[arg(long)]
    no_legend: bool,

    /// Only list pods whose UUID starts with this prefix
    prefix: Option<String>,
}

// =============================================================================
// Main
// =============================================================================

/// How a successful command wants the process to end.
enum Outcome {
    Success,
    /// Terminate exactly like the helper that ran inside the pod.
    Forward(ExitStatus),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli) {
        Ok(Outcome::Success) => ExitCode::SUCCESS,
        Ok(Outcome::Forward(status)) => forward_exit(status),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug { "magikpod=debug" } else { "magikpod=warn" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();
}

fn run(cli: Cli) -> Result<Outcome> {
    let insecure_options = SecFlags::parse(&cli.insecure_options)
        .context("invalid value for --insecure-options")?;
    let config = Config::new(cli.data_dir).with_insecure_options(insecure_options);
    debug!(
        "Data dir {}, insecure options {}",
        config.data_dir.display(),
        config.insecure_options
    );

    match cli.command {
        Commands::App(AppCommands::Exec(args)) => cmd_exec(config, args),
        Commands::App(AppCommands::Stop(args)) => cmd_stop(config, args),
        Commands::App(AppCommands::List(args)) => cmd_list(config, args),
    }
}

// =============================================================================
// Commands
// =============================================================================

fn with_app(config: Config, app: Option<String>) -> Config {
    match app {
        Some(app) => config.with_app(app),
        None => config,
    }
}

fn cmd_exec(config: Config, args: ExecArgs) -> Result<Outcome> {
    let config = with_app(config, args.app);
    let status = commands::exec(&config, &Stage0Bridge, &args.uuid, &args.command)
        .with_context(|| format!("cannot exec in pod {}", args.uuid))?;
    Ok(Outcome::Forward(status))
}

fn cmd_stop(config: Config, args: StopArgs) -> Result<Outcome> {
    let config = with_app(config, args.app);
    let status = commands::stop(&config, &Stage0Bridge, &args.uuid)
        .with_context(|| format!("cannot stop app in pod {}", args.uuid))?;
    Ok(Outcome::Forward(status))
}

fn cmd_list(config: Config, args: ListArgs) -> Result<Outcome> {
    let opts = ListOptions {
        full: args.full,
        no_legend: args.no_legend,
        prefix: args.prefix,
    };
    let report = commands::list(&config, &opts).context("failed to enumerate pods")?;

    commands::write_errors(&report.errors, &mut io::stderr().lock())?;

    let mut stdout = io::stdout().lock();
    commands::write_report(&report, &opts, &mut stdout)?;
    stdout.flush()?;
    Ok(Outcome::Success)
}
