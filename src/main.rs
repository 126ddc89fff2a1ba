//! wordhunt command-line entrypoint

use clap::Parser;

use wordhunt::cli::Cli;
use wordhunt::output;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.execute() {
        output::error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}
