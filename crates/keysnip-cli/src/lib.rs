pub mod cli;
pub mod commands;
pub mod snippets;
pub mod utils;

use clap::Parser;
use cli::Keysnip;
use commands::handle_command;
use std::process;

/// Run the keysnip CLI application
pub fn run_main() {
    let args = Keysnip::parse();
    utils::init_tracing(args.verbose);

    if let Err(e) = handle_command(args.commands) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
