use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::Context;
use quire_build::goals;

/// Incremental document builds from a single markup source.
///
/// quire converts each source document into one intermediate per profile,
/// then compiles intermediates into final documents. Only stale artifacts
/// are rebuilt, and one failing document never stops the others.
///
/// EXAMPLES:
///     quire                        Build everything, then clean scratch
///     quire build                  Build every profile
///     quire convert slides         Regenerate slide intermediates only
///     quire status                 Show what would be rebuilt
///     quire clean --all            Remove everything derived
///     quire watch                  Rebuild periodically until Ctrl+C
///
/// ENVIRONMENT VARIABLES:
///     QUIRE_JSON        Set to '1' for JSON output by default
///     QUIRE_LOG         Log filter (e.g. 'debug', 'quire_build=trace')
///     QUIRE_JOBS        Worker count; enables parallel builds like --jobs
///     NO_COLOR          Set to disable colored output
#[derive(Parser)]
#[command(name = "quire")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Project directory (defaults to the current directory)
    #[arg(long, short = 'C', global = true)]
    project_dir: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Errors only
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Print the run summary as JSON
    #[arg(long, env = "QUIRE_JSON", global = true)]
    json: bool,

    /// Run the units of each stage on N workers
    #[arg(long, short = 'j', global = true)]
    jobs: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert sources into a profile's intermediates
    ///
    /// EXAMPLES:
    ///     quire convert slides         Regenerate stale slide intermediates
    Convert {
        /// Profile name from quire.toml
        profile: String,
    },

    /// Compile a profile's intermediates into final documents
    ///
    /// Converts first where intermediates are stale.
    ///
    /// EXAMPLES:
    ///     quire compile slides         Produce slide PDFs
    Compile {
        /// Profile name from quire.toml
        profile: String,
    },

    /// Build every profile
    ///
    /// EXAMPLES:
    ///     quire build                  Build stale artifacts
    ///     quire build --jobs 4         Build units in parallel
    #[command(visible_alias = "b")]
    Build,

    /// Remove derived artifacts
    ///
    /// Deletes intermediates, finals and scratch output. Sources are never
    /// touched.
    ///
    /// EXAMPLES:
    ///     quire clean                  Remove derived artifacts
    ///     quire clean --all            Also remove configured caches
    Clean {
        /// Also remove auxiliary caches listed under [clean]
        #[arg(long)]
        all: bool,
    },

    /// Build everything, then clean scratch (same as bare `quire`)
    Default,

    /// Rebuild periodically until interrupted
    ///
    /// Each pass rediscovers sources and rechecks staleness. Errors are
    /// reported and the loop keeps going.
    ///
    /// EXAMPLES:
    ///     quire watch                  Use the configured interval
    ///     quire watch --interval 0.5   Poll twice a second
    #[command(visible_alias = "w")]
    Watch {
        /// Seconds between runs
        #[arg(long, short = 'i')]
        interval: Option<f64>,
        /// Stop after this many runs
        #[arg(long)]
        max_runs: Option<usize>,
    },

    /// Show which artifacts are stale without building anything
    #[command(visible_alias = "st")]
    Status,

    /// List goals, or the execution plan of one goal
    ///
    /// EXAMPLES:
    ///     quire goals                  All goals in dependency order
    ///     quire goals default          What `quire default` runs
    Goals {
        /// Goal to plan
        goal: Option<String>,
    },

    /// Write a starter quire.toml
    ///
    /// EXAMPLES:
    ///     quire init                   Create quire.toml here
    ///     quire init --force           Overwrite an existing one
    Init {
        /// Overwrite an existing quire.toml
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    ///
    /// EXAMPLES:
    ///     quire completions bash > ~/.bash_completions/quire.bash
    ///     quire completions zsh > ~/.zfunc/_quire
    ///     quire completions fish > ~/.config/fish/completions/quire.fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let cli_config = config::Config::from_env();
    init_tracing(&cli_config, cli.verbose, cli.quiet);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(1)
        }
    }
}

/// Dispatch a command; `Ok(false)` means some unit failed
fn run(cli: Cli) -> Result<bool> {
    let ctx = Context {
        project_dir: cli.project_dir.unwrap_or_else(|| PathBuf::from(".")),
        json: cli.json,
        quiet: cli.quiet,
        jobs: cli.jobs,
    };

    match cli.command.unwrap_or(Commands::Default) {
        Commands::Convert { profile } => {
            commands::build::run(&ctx, &goals::convert_goal(&profile))
        }
        Commands::Compile { profile } => {
            commands::build::run(&ctx, &goals::compile_goal(&profile))
        }
        Commands::Build => commands::build::run(&ctx, goals::BUILD_ALL),
        Commands::Clean { all } => {
            let goal = if all {
                goals::CLEAN_ALL
            } else {
                goals::CLEAN_DERIVED
            };
            commands::build::run(&ctx, goal)
        }
        Commands::Default => commands::build::run(&ctx, goals::DEFAULT),
        Commands::Watch { interval, max_runs } => {
            let args = commands::watch::WatchArgs { interval, max_runs };
            commands::watch::run(&ctx, args)?;
            Ok(true)
        }
        Commands::Status => commands::status::run(&ctx),
        Commands::Goals { goal } => {
            commands::goals::run(&ctx, goal.as_deref())?;
            Ok(true)
        }
        Commands::Init { force } => {
            commands::init::run(&ctx, force)?;
            Ok(true)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(true)
        }
    }
}

/// Logs go to stderr so JSON on stdout stays parseable
fn init_tracing(cli_config: &config::Config, verbose: u8, quiet: bool) {
    let filter = cli_config
        .log_filter
        .clone()
        .unwrap_or_else(|| config::default_filter(verbose, quiet).to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(!cli_config.no_color)
        .init();
}
