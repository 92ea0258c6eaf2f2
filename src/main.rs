//! autobreak - automatic pattern breakpoints for live pages
//!
//! Start the browser with `--remote-debugging-port=9222`, then run
//! `autobreak "location.search"`.

use autobreak::commands::Options;
use autobreak::common::logging;
use autobreak::cli;
use clap::Parser;

#[derive(Parser)]
#[command(name = "autobreak", about = "Break wherever a pattern appears in a page's scripts")]
#[command(version, long_about = None)]
struct Cli {
    #[command(flatten)]
    options: Options,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_cli(cli.options.verbose);

    // Failures are reported, never signalled through the exit status
    if let Err(e) = cli::dispatch(cli.options).await {
        tracing::error!(error = %e, "Not started");
        eprintln!("Error: {e}");
    }
}
