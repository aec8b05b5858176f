//! Suite Runner CLI - run declarative test suites through an external
//! execution engine with live, per-step progress.

use clap::Parser;
use suite_runner::{cli, commands::Commands, common::logging};

#[derive(Parser)]
#[command(name = "suite-runner", about = "Declarative test-suite runner")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    logging::init_cli();

    let cli = Cli::parse();

    if let Err(e) = cli::dispatch(cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
