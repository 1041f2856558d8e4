//! rxgen - a regex source generator.
//!
//! Takes a parsed regular-expression tree plus precomputed analysis and
//! emits a straight-line, pattern-specialized matching routine in the
//! target language, replacing a generic interpreter loop with constant
//! offsets, inline character tests, and explicit jumps for backtracking.
//!
//! The crates:
//! - `rxgen-syntax`: the node tree, character classes, and tree analysis
//! - `rxgen-emitter`: the tree-walking emitter and output writer
//!
//! This crate re-exports both and adds the one-call entry point plus the
//! CLI driver.

pub use rxgen_emitter as emitter;
pub use rxgen_syntax as syntax;

pub mod cli;

use rxgen_emitter::{EmitError, EmitOptions, Emitter};
use rxgen_syntax::{FindMode, FindOptimizations, RegexTree, TreeAnalysis};
use serde::{Deserialize, Serialize};

/// A generation request, typically produced by an external parser and
/// handed over as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorInput {
    /// Engine name; the routine is emitted for `<name>_Engine`.
    pub name: String,
    /// Emit timeout checks at backtracking reentry points.
    #[serde(default)]
    pub timeout_checks: bool,
    pub tree: RegexTree,
}

/// Analyzes the tree and emits the matching routine for it.
pub fn generate(name: &str, tree: &RegexTree, opts: EmitOptions) -> Result<String, EmitError> {
    let analysis = TreeAnalysis::analyze(tree);
    Emitter::new(name, tree, &analysis, opts).emit()
}

/// `generate`, with the prefilter coordination computed when the caller
/// didn't supply it.
pub fn generate_with_find_optimizations(
    name: &str,
    tree: &mut RegexTree,
    opts: EmitOptions,
) -> Result<String, EmitError> {
    if tree.find.mode == FindMode::None {
        tree.find = FindOptimizations::compute(tree);
    }
    generate(name, tree, opts)
}
