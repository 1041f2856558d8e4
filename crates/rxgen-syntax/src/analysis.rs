//! Whole-tree analysis computed once before emission.
//!
//! The emitter never re-derives structural facts while walking; it consults
//! the sets produced here. All sets are keyed by `NodeIndex`, so the tree
//! itself stays immutable and shareable.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::node::{INFINITE, NodeIndex, NodeKind};
use crate::tree::RegexTree;

/// How the scan loop finds the next plausible starting position. Only the
/// piece the emitter coordinates with is modeled here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindMode {
    #[default]
    None,
    /// The scan loop already ran the pattern's leading set loop and stored
    /// the loop's end position in the runner's track position.
    LiteralAfterLoop,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindOptimizations {
    pub mode: FindMode,
    /// The loop node whose end position the prefilter precomputed.
    pub literal_after_loop: Option<NodeIndex>,
}

impl FindOptimizations {
    /// Detects the literal-after-loop shape: an upfront unbounded set or
    /// notone star followed by a literal. Anything else gets no assistance.
    pub fn compute(tree: &RegexTree) -> Self {
        use crate::node::node_options::RIGHT_TO_LEFT;
        if tree.options & RIGHT_TO_LEFT != 0 {
            return Self::default();
        }

        let arena = &tree.arena;
        let root = &arena[tree.root_child()];
        if root.kind != NodeKind::Concatenate || root.children.len() < 2 {
            return Self::default();
        }

        let mut loop_idx = root.children[0];
        if arena[loop_idx].kind == NodeKind::Atomic {
            loop_idx = arena[loop_idx].children[0];
        }
        let loop_node = &arena[loop_idx];
        let is_star_loop = matches!(loop_node.kind, NodeKind::Setloop | NodeKind::Notoneloop)
            && loop_node.m == 0
            && loop_node.n == INFINITE;
        if !is_star_loop {
            return Self::default();
        }

        let literal = &arena[root.children[1]];
        if matches!(literal.kind, NodeKind::One | NodeKind::Multi) {
            return Self {
                mode: FindMode::LiteralAfterLoop,
                literal_after_loop: Some(loop_idx),
            };
        }
        Self::default()
    }
}

/// Precomputed per-node facts.
pub struct TreeAnalysis {
    may_backtrack: FxHashSet<NodeIndex>,
    atomic_by_ancestor: FxHashSet<NodeIndex>,
    in_loop: FxHashSet<NodeIndex>,
    contains_capture: FxHashSet<NodeIndex>,
}

impl TreeAnalysis {
    pub fn analyze(tree: &RegexTree) -> Self {
        let mut analysis = Self {
            may_backtrack: FxHashSet::default(),
            atomic_by_ancestor: FxHashSet::default(),
            in_loop: FxHashSet::default(),
            contains_capture: FxHashSet::default(),
        };
        analysis.collect(tree, tree.root);
        // Nothing backtracks into a completed overall match, so the root is
        // effectively wrapped in an atomic.
        analysis.propagate(tree, tree.root, true, false);
        debug!(
            nodes = tree.arena.len(),
            backtracking = analysis.may_backtrack.len(),
            atomic = analysis.atomic_by_ancestor.len(),
            "tree analysis complete"
        );
        analysis
    }

    /// Whether the node, matched in isolation, can give back characters or
    /// retry alternatives after it has matched once.
    pub fn may_backtrack(&self, idx: NodeIndex) -> bool {
        self.may_backtrack.contains(&idx)
    }

    /// Whether some ancestor guarantees that once this node finishes,
    /// nothing ever backtracks into it.
    pub fn is_atomic_by_ancestor(&self, idx: NodeIndex) -> bool {
        self.atomic_by_ancestor.contains(&idx)
    }

    /// Whether the node sits under a general loop, in which case its locals
    /// must live on the backtracking stack.
    pub fn is_in_loop(&self, idx: NodeIndex) -> bool {
        self.in_loop.contains(&idx)
    }

    /// Whether the subtree contains any capture group.
    pub fn may_contain_capture(&self, idx: NodeIndex) -> bool {
        self.contains_capture.contains(&idx)
    }

    fn collect(&mut self, tree: &RegexTree, idx: NodeIndex) -> NodeFacts {
        let node = &tree.arena[idx];
        let mut child_facts = NodeFacts::default();
        for &child in &node.children {
            let facts = self.collect(tree, child);
            child_facts.may_backtrack |= facts.may_backtrack;
            child_facts.contains_capture |= facts.contains_capture;
        }

        let may_backtrack = match node.kind {
            NodeKind::Oneloop
            | NodeKind::Notoneloop
            | NodeKind::Setloop
            | NodeKind::Onelazy
            | NodeKind::Notonelazy
            | NodeKind::Setlazy => node.m != node.n,
            NodeKind::Loop | NodeKind::Lazyloop => node.m != node.n || child_facts.may_backtrack,
            NodeKind::Alternate => node.children.len() > 1,
            NodeKind::Capture | NodeKind::Concatenate => child_facts.may_backtrack,
            NodeKind::BackRefCond => child_facts.may_backtrack,
            NodeKind::ExprCond => node.children[1..]
                .iter()
                .any(|&c| self.may_backtrack.contains(&c)),
            // Atomic groups and lookarounds contain their children's state.
            _ => false,
        };
        let contains_capture = node.kind == NodeKind::Capture || child_facts.contains_capture;

        if may_backtrack {
            self.may_backtrack.insert(idx);
        }
        if contains_capture {
            self.contains_capture.insert(idx);
        }
        NodeFacts {
            may_backtrack,
            contains_capture,
        }
    }

    fn propagate(&mut self, tree: &RegexTree, idx: NodeIndex, atomic: bool, in_loop: bool) {
        let node = &tree.arena[idx];
        if atomic {
            self.atomic_by_ancestor.insert(idx);
        }
        if in_loop {
            self.in_loop.insert(idx);
        }

        let child_in_loop = in_loop || matches!(node.kind, NodeKind::Loop | NodeKind::Lazyloop);
        let last = node.children.len().saturating_sub(1);
        for (i, &child) in node.children.iter().enumerate() {
            let child_atomic = match node.kind {
                // The atomic boundary itself, and the implicitly atomic
                // lookarounds.
                NodeKind::Atomic | NodeKind::PosLook | NodeKind::NegLook => true,
                NodeKind::Capture => atomic,
                // Only the last element of a sequence is protected by an
                // atomic ancestor; earlier elements can be backtracked into
                // by the elements after them.
                NodeKind::Concatenate => atomic && i == last,
                NodeKind::Alternate => atomic,
                // A loop that can run more than once may reenter its child.
                NodeKind::Loop | NodeKind::Lazyloop => atomic && node.n == 1,
                // An expression conditional's test is evaluated atomically.
                NodeKind::ExprCond => i == 0 || atomic,
                NodeKind::BackRefCond => atomic,
                _ => false,
            };
            self.propagate(tree, child, child_atomic, child_in_loop);
        }
    }
}

#[derive(Default)]
struct NodeFacts {
    may_backtrack: bool,
    contains_capture: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{INFINITE, NodeArena};

    #[test]
    fn star_loop_backtracks_but_fixed_repeat_does_not() {
        let mut arena = NodeArena::new();
        let star = arena.one_loop('a', 0, INFINITE, 0);
        let fixed = arena.one_loop('b', 3, 3, 0);
        let concat = arena.concat(vec![star, fixed], 0);
        let tree = RegexTree::new(arena, concat, 0, 1);
        let analysis = TreeAnalysis::analyze(&tree);

        assert!(analysis.may_backtrack(star));
        assert!(!analysis.may_backtrack(fixed));
        assert!(analysis.may_backtrack(concat));
    }

    #[test]
    fn atomic_wrapper_contains_backtracking() {
        let mut arena = NodeArena::new();
        let star = arena.one_loop('a', 0, INFINITE, 0);
        let atomic = arena.atomic(star, 0);
        let tree = RegexTree::new(arena, atomic, 0, 1);
        let analysis = TreeAnalysis::analyze(&tree);

        assert!(!analysis.may_backtrack(atomic));
        assert!(analysis.is_atomic_by_ancestor(star));
    }

    #[test]
    fn only_the_tail_of_a_sequence_inherits_atomicity() {
        let mut arena = NodeArena::new();
        let star = arena.one_loop('a', 0, INFINITE, 0);
        let tail = arena.one('a', 0);
        let concat = arena.concat(vec![star, tail], 0);
        let tree = RegexTree::new(arena, concat, 0, 1);
        let analysis = TreeAnalysis::analyze(&tree);

        // The implicit root is atomic, so the sequence's last element is too,
        // but the star before it must stay backtrackable.
        assert!(analysis.is_atomic_by_ancestor(tail));
        assert!(!analysis.is_atomic_by_ancestor(star));
    }

    #[test]
    fn loop_bodies_are_marked_in_loop() {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let cap = arena.capture(1, a, 0);
        let looped = arena.loop_of(cap, 0, INFINITE, 0);
        let tree = RegexTree::new(arena, looped, 0, 2);
        let analysis = TreeAnalysis::analyze(&tree);

        assert!(analysis.is_in_loop(cap));
        assert!(analysis.is_in_loop(a));
        assert!(!analysis.is_in_loop(looped));
        assert!(analysis.may_contain_capture(looped));
    }

    #[test]
    fn literal_after_loop_shape_is_detected() {
        let mut arena = NodeArena::new();
        let class = crate::char_class::CharClass::from_range('a', 'z').negated();
        let star = arena.set_loop(class, 0, INFINITE, 0);
        let lit = arena.multi("end", 0);
        let concat = arena.concat(vec![star, lit], 0);
        let tree = RegexTree::new(arena, concat, 0, 1);

        let find = FindOptimizations::compute(&tree);
        assert_eq!(find.mode, FindMode::LiteralAfterLoop);
        assert_eq!(find.literal_after_loop, Some(star));
    }

    #[test]
    fn no_find_assistance_without_the_shape() {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let b = arena.one('b', 0);
        let concat = arena.concat(vec![a, b], 0);
        let tree = RegexTree::new(arena, concat, 0, 1);
        assert_eq!(FindOptimizations::compute(&tree).mode, FindMode::None);
    }
}
