use std::fs;

use anyhow::{Context, Result};
use rxgen_emitter::EmitOptions;
use tracing::info;

use crate::GeneratorInput;
use crate::cli::CliArgs;

pub fn run(args: CliArgs) -> Result<()> {
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let mut input: GeneratorInput = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;

    let name = args.name.unwrap_or_else(|| input.name.clone());
    let opts = EmitOptions {
        timeout_checks: args.timeout_checks || input.timeout_checks,
    };

    let source = crate::generate_with_find_optimizations(&name, &mut input.tree, opts)
        .with_context(|| format!("failed to generate matcher for {name}"))?;

    match &args.out {
        Some(path) => {
            fs::write(path, &source)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = source.len(), "wrote generated matcher");
        }
        None => print!("{source}"),
    }
    Ok(())
}
