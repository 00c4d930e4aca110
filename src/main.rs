use std::process::ExitCode;

use clap::Parser;
use slop::cli::{self, CliArgs};
use slop::logger;

fn main() -> ExitCode {
    // Session log (overwrites previous session log)
    logger::init();

    let args = CliArgs::parse();
    slop::log_info!("command: {:?}", args.command);
    cli::run(args)
}
