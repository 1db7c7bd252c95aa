use clap::Parser;

mod cli;
mod commands;

use cli::{CliArgs, Commands};

pub type CliResult<T> = outguess_core::Result<T>;

fn main() -> CliResult<()> {
    env_logger::init();

    let args = CliArgs::parse();
    let verbose = args.verbose;

    match args.command {
        Commands::Hide(args) => args.run(verbose),
        Commands::Unveil(args) => args.run(verbose),
        Commands::Check(args) => args.run(),
        Commands::Capacity(args) => args.run(verbose),
        Commands::Resist(args) => args.run(),
    }
}
