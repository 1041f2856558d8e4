//! Regex syntax tree model for the rxgen source generator.
//!
//! This crate provides:
//! - The node tree handed to the emitter (arena storage, kinds, options)
//! - Character classes with the queries the emitter specializes on
//! - Capture metadata and group-name lookup
//! - The precomputed tree analysis the emitter consults while walking

pub mod analysis;
pub mod char_class;
pub mod node;
pub mod tree;

pub use analysis::{FindMode, FindOptimizations, TreeAnalysis};
pub use char_class::{CharCategory, CharClass, CharRange};
pub use node::{INFINITE, MAX_UNROLL_SIZE, NodeArena, NodeIndex, NodeKind, RegexNode, node_options};
pub use tree::RegexTree;
