//! Sealfs CLI binary.

use clap::Parser;
use sealfs::cli::{map_error, Cli, RunContext};
use sealfs::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::error;

fn main() {
    let cli = Cli::parse();

    let context = match RunContext::new(&cli) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };

    let mut logging = context.config().logging.clone();
    if cli.verbose && logging.level == "off" {
        logging.level = "info".to_string();
    }
    if let Err(e) = init_logging(&logging) {
        eprintln!("{}", map_error(&e));
        process::exit(1);
    }

    match context.execute(&cli.command) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("{}", map_error(&e));
            process::exit(if e.is_validation() { 1 } else { 2 });
        }
    }
}
