//! `arbor` command-line tool: evaluate XPath 1.0 expressions against XML files.

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

pub mod commands;
mod util;

pub use util::CliResult;

#[derive(Parser, Debug)]
#[command(name = "arbor", version, about = "Query XML documents with XPath 1.0")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate an expression against an XML file and print the result.
    Query(commands::query::QueryArgs),
    /// Compile an expression without evaluating it and report syntax errors.
    Check(commands::check::CheckArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = execute(&cli.command)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

pub fn execute(command: &Commands) -> CliResult<String> {
    match command {
        Commands::Query(args) => commands::query::run(args),
        Commands::Check(args) => commands::check::run(args),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // a subscriber may already be installed when embedded in tests
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}
