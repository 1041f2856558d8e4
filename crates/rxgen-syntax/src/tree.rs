//! The parsed tree handed to the generator, plus capture metadata.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::analysis::FindOptimizations;
use crate::node::{NodeArena, NodeIndex, NodeKind};

/// A complete expression: the node arena, the implicit group-0 capture at
/// the root, and the capture bookkeeping produced by the parser.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegexTree {
    pub arena: NodeArena,
    /// The implicit whole-expression `Capture`; its first child is the
    /// pattern itself.
    pub root: NodeIndex,
    /// One greater than the highest capture slot in use.
    #[serde(default)]
    pub captop: i32,
    /// Sparse capture numbering: maps declared group numbers to slots.
    #[serde(default)]
    pub caps: Option<FxHashMap<i32, i32>>,
    /// Group names, indexed by slot. Empty when no groups are named.
    #[serde(default)]
    pub cap_list: Vec<String>,
    /// Declared group numbers when numbering is sparse.
    #[serde(default)]
    pub cap_num_list: Option<Vec<i32>>,
    /// Whole-expression options.
    #[serde(default)]
    pub options: u32,
    /// Prefilter decisions the emitter coordinates with.
    #[serde(default)]
    pub find: FindOptimizations,
}

impl RegexTree {
    /// Wraps `pattern` in the implicit group-0 capture and builds the tree.
    pub fn new(mut arena: NodeArena, pattern: NodeIndex, options: u32, captop: i32) -> Self {
        let root = arena.balancing_capture(0, -1, pattern, options);
        Self {
            arena,
            root,
            captop,
            caps: None,
            cap_list: Vec::new(),
            cap_num_list: None,
            options,
            find: FindOptimizations::default(),
        }
    }

    /// The pattern node under the implicit root capture.
    pub fn root_child(&self) -> NodeIndex {
        let root = &self.arena[self.root];
        debug_assert_eq!(root.kind, NodeKind::Capture);
        root.children[0]
    }

    /// Maps a declared group number to its capture slot.
    pub fn map_capture_number(&self, capnum: i32) -> i32 {
        if capnum == -1 {
            return -1;
        }
        match &self.caps {
            Some(caps) => caps.get(&capnum).copied().unwrap_or(capnum),
            None => capnum,
        }
    }

    /// The display name of a capture group, mirroring the public group-name
    /// lookup: numbered groups render as their number, named groups as their
    /// name, anything out of range as the empty string.
    pub fn group_name_from_number(&self, mut i: i32) -> String {
        if self.cap_list.is_empty() {
            let caplen = match &self.cap_num_list {
                Some(list) => list.len() as i32,
                None => self.captop,
            };
            if i >= 0 && i < caplen {
                return i.to_string();
            }
            return String::new();
        }

        if let Some(caps) = &self.caps {
            match caps.get(&i) {
                Some(&mapped) => i = mapped,
                None => return String::new(),
            }
        }

        if i >= 0 && (i as usize) < self.cap_list.len() {
            self.cap_list[i as usize].clone()
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_child_skips_the_implicit_capture() {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let tree = RegexTree::new(arena, a, 0, 1);
        assert_eq!(tree.root_child(), a);
        assert_eq!(tree.arena[tree.root].kind, NodeKind::Capture);
    }

    #[test]
    fn group_names_fall_back_to_numbers() {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let tree = RegexTree::new(arena, a, 0, 3);
        assert_eq!(tree.group_name_from_number(2), "2");
        assert_eq!(tree.group_name_from_number(7), "");
    }

    #[test]
    fn named_groups_resolve_through_the_caps_table() {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let mut tree = RegexTree::new(arena, a, 0, 2);
        tree.cap_list = vec!["0".to_string(), "year".to_string()];
        assert_eq!(tree.group_name_from_number(1), "year");
    }
}
