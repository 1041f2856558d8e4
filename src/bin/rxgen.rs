use clap::Parser;

use rxgen::cli::{self, CliArgs};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    cli::init_tracing(args.trace);
    cli::run(args)
}
