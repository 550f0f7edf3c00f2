use anyhow::Result;
use clap::Parser;
use dragons_engine::cli::{self, Args};
use log::LevelFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    cli::run(args)
}
