//! Command-line driver: read a serialized generation request, write the
//! generated routine.

mod args;
mod driver;

pub use args::CliArgs;
pub use driver::run;

use tracing_subscriber::EnvFilter;

/// Sets up logging. `--trace` turns everything up; otherwise `RUST_LOG`
/// decides, defaulting to warnings.
pub fn init_tracing(trace: bool) {
    let filter = if trace {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
