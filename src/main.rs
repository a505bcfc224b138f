//! Spork CLI entry point

use clap::Parser;
use spork::cli::Cli;
use std::process;

fn main() {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.debug {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.format_timestamp(None).init();

    process::exit(spork::cli::run(&cli));
}
