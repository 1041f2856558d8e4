//! Code emission for the rxgen source generator.
//!
//! This crate provides:
//! - The tree-walking emitter producing one specialized matching routine
//! - The output writer (line buffer, indentation)
//! - Literal rendering for the generated language
//! - Node descriptions used for comments in the generated source

pub mod describe;
mod emitter;
pub mod literals;
pub mod source_writer;

pub use emitter::{EmitError, EmitOptions, Emitter};
pub use source_writer::SourceWriter;
