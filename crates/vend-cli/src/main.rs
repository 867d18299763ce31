#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unnecessary_wraps)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;
use vend_core::Config;

#[derive(Parser, Debug)]
#[command(name = "vend")]
#[command(author, version, about = "Vendor packages and redirect their imports", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Vendor the packages listed in vend.json and write the alias manifest
    Build {
        /// Plan the build and print it without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Resolve a specifier through the alias registry
    Resolve {
        /// The import specifier (e.g. "@my/package-a/bar")
        specifier: String,

        /// Active export condition, highest priority first (repeatable)
        #[arg(short = 'C', long = "condition", value_name = "NAME")]
        conditions: Vec<String>,

        /// Directory of the importing file (defaults to the working directory)
        #[arg(long, value_name = "DIR")]
        parent: Option<PathBuf>,

        /// Maximum chained redirections
        #[arg(long, value_name = "N", env = "VEND_MAX_DEPTH")]
        max_depth: Option<usize>,
    },

    /// List the loaded alias registry
    Aliases,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(config.json_logs),
        Some(Commands::Build { dry_run }) => {
            let span = tracing::info_span!("build", cmd = "build", cwd = %cwd.display());
            let _guard = span.enter();
            commands::build::run(&config.cwd, dry_run, cli.json)
        }
        Some(Commands::Resolve {
            specifier,
            conditions,
            parent,
            max_depth,
        }) => {
            let span = tracing::info_span!("resolve", cmd = "resolve", cwd = %cwd.display());
            let _guard = span.enter();
            let action = commands::resolve::ResolveAction {
                cwd: config.cwd.clone(),
                specifier,
                conditions,
                parent,
                max_depth,
            };
            commands::resolve::run(action, cli.json)
        }
        Some(Commands::Aliases) => commands::aliases::run(&config.cwd, cli.json),
    }
}
