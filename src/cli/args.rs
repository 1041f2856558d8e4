use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "rxgen",
    about = "Generate a specialized matcher routine from a serialized regex tree"
)]
pub struct CliArgs {
    /// Path to the JSON generation request.
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Override the engine name from the request.
    #[arg(long)]
    pub name: Option<String>,

    /// Write the generated source here instead of stdout.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// Emit timeout checks at backtracking reentry points.
    #[arg(long)]
    pub timeout_checks: bool,

    /// Enable trace logging.
    #[arg(long)]
    pub trace: bool,
}
