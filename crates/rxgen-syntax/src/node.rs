//! Regex nodes and the arena that owns them.
//!
//! Nodes are immutable once handed to the emitter. Children are stored as
//! `NodeIndex` handles into a `NodeArena`, so a tree can be serialized flat
//! and shared by reference without lifetimes threading through every type.

use serde::{Deserialize, Serialize};

use crate::char_class::CharClass;

/// Sentinel for an unbounded repetition upper bound.
pub const INFINITE: i32 = i32::MAX;

/// Limit for unrolling fixed repetitions versus emitting a scan loop.
/// Balances generated-code size against the small overhead of looping.
pub const MAX_UNROLL_SIZE: i32 = 16;

/// Option bits carried on every node. Values match the classic regex
/// option encoding so serialized trees round-trip against other tooling.
pub mod node_options {
    pub const IGNORE_CASE: u32 = 0x0001;
    pub const MULTILINE: u32 = 0x0002;
    pub const EXPLICIT_CAPTURE: u32 = 0x0004;
    pub const SINGLELINE: u32 = 0x0010;
    pub const RIGHT_TO_LEFT: u32 = 0x0040;
    pub const ECMASCRIPT: u32 = 0x0100;
}

/// The kind tag of a regex node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum NodeKind {
    /// Matches the empty string.
    Empty,
    /// Fails unconditionally.
    Nothing,
    /// A single literal character.
    One,
    /// Any single character other than the literal.
    Notone,
    /// A single character drawn from a class.
    Set,
    /// A literal string of two or more characters.
    Multi,
    /// Greedy loop around a `One`.
    Oneloop,
    /// Greedy loop around a `Notone`.
    Notoneloop,
    /// Greedy loop around a `Set`.
    Setloop,
    /// Lazy loop around a `One`.
    Onelazy,
    /// Lazy loop around a `Notone`.
    Notonelazy,
    /// Lazy loop around a `Set`.
    Setlazy,
    /// Greedy loop around an arbitrary child expression.
    Loop,
    /// Lazy loop around an arbitrary child expression.
    Lazyloop,
    /// Ordered sequence of children.
    Concatenate,
    /// Ordered alternation of children.
    Alternate,
    /// Capturing group; `m` is the capture slot, `n` the uncapture slot for
    /// balancing groups (-1 when not balancing).
    Capture,
    /// Atomic (non-backtracking) group.
    Atomic,
    /// Backreference to capture slot `m`.
    Ref,
    /// `(?(n)yes|no)` conditional on whether a group matched.
    BackRefCond,
    /// `(?(expr)yes|no)` conditional on a zero-width expression.
    ExprCond,
    /// Zero-width positive lookaround.
    PosLook,
    /// Zero-width negative lookaround.
    NegLook,
    /// `\A` anchor.
    Beginning,
    /// `\G` anchor (match start position).
    Start,
    /// `^` with multiline.
    Bol,
    /// `$` with multiline.
    Eol,
    /// `\z` anchor.
    End,
    /// `\Z` anchor.
    EndZ,
    /// `\b` word boundary.
    Boundary,
    /// `\B` non-boundary.
    NonBoundary,
    /// `\b` under ECMAScript rules.
    EcmaBoundary,
    /// `\B` under ECMAScript rules.
    NonEcmaBoundary,
    /// Instructs the scan loop to bump from the current position.
    UpdateBumpalong,
}

/// Handle to a node stored in a `NodeArena`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single node in the tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegexNode {
    pub kind: NodeKind,
    #[serde(default)]
    pub options: u32,
    /// Literal character for the one/notone families.
    #[serde(default)]
    pub ch: Option<char>,
    /// Literal string for `Multi`.
    #[serde(default)]
    pub str: Option<String>,
    /// Character class for the set family.
    #[serde(default)]
    pub set: Option<CharClass>,
    /// Minimum repetition count, or the capture slot for `Capture`/`Ref`.
    #[serde(default)]
    pub m: i32,
    /// Maximum repetition count (`INFINITE` when unbounded), or the
    /// uncapture slot for balancing `Capture` nodes (-1 when unused).
    #[serde(default)]
    pub n: i32,
    #[serde(default)]
    pub children: Vec<NodeIndex>,
}

impl RegexNode {
    pub fn new(kind: NodeKind, options: u32) -> Self {
        Self {
            kind,
            options,
            ch: None,
            str: None,
            set: None,
            m: 0,
            n: 0,
            children: Vec::new(),
        }
    }

    pub fn one(ch: char, options: u32) -> Self {
        let mut node = Self::new(NodeKind::One, options);
        node.ch = Some(ch);
        node
    }

    pub fn multi(str: &str, options: u32) -> Self {
        let mut node = Self::new(NodeKind::Multi, options);
        node.str = Some(str.to_string());
        node
    }

    pub fn is_right_to_left(&self) -> bool {
        self.options & node_options::RIGHT_TO_LEFT != 0
    }

    /// `One`, `Oneloop`, or `Onelazy`.
    pub fn is_one_family(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::One | NodeKind::Oneloop | NodeKind::Onelazy
        )
    }

    /// `Notone`, `Notoneloop`, or `Notonelazy`.
    pub fn is_notone_family(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Notone | NodeKind::Notoneloop | NodeKind::Notonelazy
        )
    }

    /// `Set`, `Setloop`, or `Setlazy`.
    pub fn is_set_family(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Set | NodeKind::Setloop | NodeKind::Setlazy
        )
    }

    pub fn is_single_char_loop(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Oneloop
                | NodeKind::Notoneloop
                | NodeKind::Setloop
                | NodeKind::Onelazy
                | NodeKind::Notonelazy
                | NodeKind::Setlazy
        )
    }

    /// The single literal character this node (or its string) starts with.
    pub fn first_char_of_one_or_multi(&self) -> char {
        match self.kind {
            NodeKind::Multi => self
                .str
                .as_ref()
                .and_then(|s| s.chars().next())
                .unwrap_or('\0'),
            _ => self.ch.unwrap_or('\0'),
        }
    }
}

/// Append-only storage for a tree's nodes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeArena {
    nodes: Vec<RegexNode>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: RegexNode) -> NodeIndex {
        let idx = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(node);
        idx
    }

    pub fn get(&self, idx: NodeIndex) -> Option<&RegexNode> {
        self.nodes.get(idx.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &RegexNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeIndex(i as u32), n))
    }

    // =========================================================================
    // Builder helpers
    // =========================================================================

    pub fn empty(&mut self, options: u32) -> NodeIndex {
        self.add(RegexNode::new(NodeKind::Empty, options))
    }

    pub fn nothing(&mut self, options: u32) -> NodeIndex {
        self.add(RegexNode::new(NodeKind::Nothing, options))
    }

    pub fn one(&mut self, ch: char, options: u32) -> NodeIndex {
        self.add(RegexNode::one(ch, options))
    }

    pub fn notone(&mut self, ch: char, options: u32) -> NodeIndex {
        let mut node = RegexNode::new(NodeKind::Notone, options);
        node.ch = Some(ch);
        self.add(node)
    }

    pub fn set(&mut self, class: CharClass, options: u32) -> NodeIndex {
        let mut node = RegexNode::new(NodeKind::Set, options);
        node.set = Some(class);
        self.add(node)
    }

    pub fn multi(&mut self, str: &str, options: u32) -> NodeIndex {
        self.add(RegexNode::multi(str, options))
    }

    pub fn anchor(&mut self, kind: NodeKind, options: u32) -> NodeIndex {
        self.add(RegexNode::new(kind, options))
    }

    pub fn single_char_loop(
        &mut self,
        kind: NodeKind,
        ch: Option<char>,
        set: Option<CharClass>,
        m: i32,
        n: i32,
        options: u32,
    ) -> NodeIndex {
        let mut node = RegexNode::new(kind, options);
        node.ch = ch;
        node.set = set;
        node.m = m;
        node.n = n;
        self.add(node)
    }

    pub fn one_loop(&mut self, ch: char, m: i32, n: i32, options: u32) -> NodeIndex {
        self.single_char_loop(NodeKind::Oneloop, Some(ch), None, m, n, options)
    }

    pub fn one_lazy(&mut self, ch: char, m: i32, n: i32, options: u32) -> NodeIndex {
        self.single_char_loop(NodeKind::Onelazy, Some(ch), None, m, n, options)
    }

    pub fn set_loop(&mut self, class: CharClass, m: i32, n: i32, options: u32) -> NodeIndex {
        self.single_char_loop(NodeKind::Setloop, None, Some(class), m, n, options)
    }

    pub fn set_lazy(&mut self, class: CharClass, m: i32, n: i32, options: u32) -> NodeIndex {
        self.single_char_loop(NodeKind::Setlazy, None, Some(class), m, n, options)
    }

    pub fn loop_of(&mut self, child: NodeIndex, m: i32, n: i32, options: u32) -> NodeIndex {
        let mut node = RegexNode::new(NodeKind::Loop, options);
        node.m = m;
        node.n = n;
        node.children.push(child);
        self.add(node)
    }

    pub fn lazy_loop_of(&mut self, child: NodeIndex, m: i32, n: i32, options: u32) -> NodeIndex {
        let mut node = RegexNode::new(NodeKind::Lazyloop, options);
        node.m = m;
        node.n = n;
        node.children.push(child);
        self.add(node)
    }

    pub fn concat(&mut self, children: Vec<NodeIndex>, options: u32) -> NodeIndex {
        let mut node = RegexNode::new(NodeKind::Concatenate, options);
        node.children = children;
        self.add(node)
    }

    pub fn alternate(&mut self, children: Vec<NodeIndex>, options: u32) -> NodeIndex {
        let mut node = RegexNode::new(NodeKind::Alternate, options);
        node.children = children;
        self.add(node)
    }

    pub fn capture(&mut self, capnum: i32, child: NodeIndex, options: u32) -> NodeIndex {
        self.balancing_capture(capnum, -1, child, options)
    }

    pub fn balancing_capture(
        &mut self,
        capnum: i32,
        uncapnum: i32,
        child: NodeIndex,
        options: u32,
    ) -> NodeIndex {
        let mut node = RegexNode::new(NodeKind::Capture, options);
        node.m = capnum;
        node.n = uncapnum;
        node.children.push(child);
        self.add(node)
    }

    pub fn atomic(&mut self, child: NodeIndex, options: u32) -> NodeIndex {
        let mut node = RegexNode::new(NodeKind::Atomic, options);
        node.children.push(child);
        self.add(node)
    }

    pub fn backref(&mut self, capnum: i32, options: u32) -> NodeIndex {
        let mut node = RegexNode::new(NodeKind::Ref, options);
        node.m = capnum;
        self.add(node)
    }

    pub fn backref_cond(
        &mut self,
        capnum: i32,
        yes: NodeIndex,
        no: Option<NodeIndex>,
        options: u32,
    ) -> NodeIndex {
        let mut node = RegexNode::new(NodeKind::BackRefCond, options);
        node.m = capnum;
        node.children.push(yes);
        if let Some(no) = no {
            node.children.push(no);
        }
        self.add(node)
    }

    pub fn expr_cond(
        &mut self,
        condition: NodeIndex,
        yes: NodeIndex,
        no: Option<NodeIndex>,
        options: u32,
    ) -> NodeIndex {
        let mut node = RegexNode::new(NodeKind::ExprCond, options);
        node.children.push(condition);
        node.children.push(yes);
        if let Some(no) = no {
            node.children.push(no);
        }
        self.add(node)
    }

    pub fn lookaround(&mut self, positive: bool, child: NodeIndex, options: u32) -> NodeIndex {
        let kind = if positive {
            NodeKind::PosLook
        } else {
            NodeKind::NegLook
        };
        let mut node = RegexNode::new(kind, options);
        node.children.push(child);
        self.add(node)
    }

    // =========================================================================
    // Tree queries
    // =========================================================================

    /// Minimum number of characters the subtree must consume to match.
    pub fn compute_min_length(&self, idx: NodeIndex) -> usize {
        let node = &self[idx];
        match node.kind {
            NodeKind::One | NodeKind::Notone | NodeKind::Set => 1,
            NodeKind::Multi => node.str.as_ref().map_or(0, |s| s.chars().count()),
            NodeKind::Oneloop
            | NodeKind::Notoneloop
            | NodeKind::Setloop
            | NodeKind::Onelazy
            | NodeKind::Notonelazy
            | NodeKind::Setlazy => node.m.max(0) as usize,
            NodeKind::Loop | NodeKind::Lazyloop => {
                let child = self.compute_min_length(node.children[0]);
                child.saturating_mul(node.m.max(0) as usize)
            }
            NodeKind::Concatenate => node
                .children
                .iter()
                .map(|&c| self.compute_min_length(c))
                .fold(0usize, usize::saturating_add),
            NodeKind::Alternate => node
                .children
                .iter()
                .map(|&c| self.compute_min_length(c))
                .min()
                .unwrap_or(0),
            NodeKind::BackRefCond => {
                let yes = self.compute_min_length(node.children[0]);
                let no = node
                    .children
                    .get(1)
                    .map_or(0, |&c| self.compute_min_length(c));
                yes.min(no)
            }
            NodeKind::ExprCond => {
                let yes = self.compute_min_length(node.children[1]);
                let no = node
                    .children
                    .get(2)
                    .map_or(0, |&c| self.compute_min_length(c));
                yes.min(no)
            }
            NodeKind::Capture | NodeKind::Atomic => self.compute_min_length(node.children[0]),
            // Zero-width constructs, and backreferences whose length depends
            // on what the group matched.
            _ => 0,
        }
    }

    /// Fixed length this child contributes to a joined length check, if its
    /// consumption is statically known.
    fn joinable_length_contribution(&self, idx: NodeIndex) -> Option<usize> {
        let node = &self[idx];
        if node.is_right_to_left() {
            return None;
        }
        match node.kind {
            NodeKind::One | NodeKind::Notone | NodeKind::Set => Some(1),
            NodeKind::Multi => Some(node.str.as_ref().map_or(0, |s| s.chars().count())),
            _ if node.is_single_char_loop() && node.m == node.n && node.m > 0 => {
                Some(node.m as usize)
            }
            _ => None,
        }
    }

    /// Finds a run of two or more contiguous fixed-length children of a
    /// concatenation starting at `start`, so one length check can cover them
    /// all. Returns the total required length and the exclusive end index.
    pub fn try_get_joinable_length_check_child_range(
        &self,
        concat: NodeIndex,
        start: usize,
    ) -> Option<(usize, usize)> {
        let node = &self[concat];
        let mut required = 0usize;
        let mut end = start;
        while end < node.children.len() {
            match self.joinable_length_contribution(node.children[end]) {
                Some(len) => {
                    required += len;
                    end += 1;
                }
                None => break,
            }
        }
        if end - start >= 2 {
            Some((required, end))
        } else {
            None
        }
    }

    /// Detects a run of children representing an ordinal case-insensitive
    /// string: sets of exactly one case pair contribute their lowercase
    /// letter, and caseless single characters contribute themselves. Returns
    /// the number of nodes consumed and the lowercase string, requiring at
    /// least two characters to be worthwhile.
    pub fn try_get_ordinal_case_insensitive_string(
        &self,
        concat: NodeIndex,
        start: usize,
        exclusive_end: usize,
    ) -> Option<(usize, String)> {
        let node = &self[concat];
        let mut text = String::new();
        let mut i = start;
        while i < exclusive_end.min(node.children.len()) {
            let child = &self[node.children[i]];
            match child.kind {
                NodeKind::One => {
                    let Some(ch) = child.ch else { break };
                    if case_pair(ch).is_some() {
                        break;
                    }
                    text.push(ch);
                }
                NodeKind::Set => {
                    let Some(set) = &child.set else { break };
                    if set.is_negated() {
                        break;
                    }
                    let Some(chars) = set.get_set_chars(2) else { break };
                    let &[a, b] = chars.as_slice() else { break };
                    let Some(pair) = case_pair(a) else { break };
                    if pair != b {
                        break;
                    }
                    text.push(a.to_ascii_lowercase());
                }
                _ => break,
            }
            i += 1;
        }
        if text.chars().count() >= 2 {
            Some((i - start, text))
        } else {
            None
        }
    }

    /// Finds the literal node guaranteed to begin any match of this subtree:
    /// a one/notone/set/multi, or a loop of one with at least one required
    /// iteration. Callers that cannot use negated literals filter the result.
    pub fn find_starting_literal_node(&self, idx: NodeIndex) -> Option<NodeIndex> {
        let node = &self[idx];
        match node.kind {
            NodeKind::One | NodeKind::Notone | NodeKind::Set | NodeKind::Multi => Some(idx),
            _ if node.is_single_char_loop() && node.m > 0 => Some(idx),
            NodeKind::Atomic | NodeKind::Capture => {
                self.find_starting_literal_node(node.children[0])
            }
            NodeKind::Loop | NodeKind::Lazyloop if node.m > 0 => {
                self.find_starting_literal_node(node.children[0])
            }
            NodeKind::Concatenate => node
                .children
                .first()
                .and_then(|&c| self.find_starting_literal_node(c)),
            _ => None,
        }
    }
}

/// The other member of an ASCII case pair, if `ch` is a cased letter.
fn case_pair(ch: char) -> Option<char> {
    if ch.is_ascii_lowercase() {
        Some(ch.to_ascii_uppercase())
    } else if ch.is_ascii_uppercase() {
        Some(ch.to_ascii_lowercase())
    } else {
        None
    }
}

impl std::ops::Index<NodeIndex> for NodeArena {
    type Output = RegexNode;

    fn index(&self, idx: NodeIndex) -> &RegexNode {
        &self.nodes[idx.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::char_class::CharClass;

    #[test]
    fn min_length_of_concat_sums_children() {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let bc = arena.multi("bc", 0);
        let star = arena.one_loop('x', 0, INFINITE, 0);
        let concat = arena.concat(vec![a, bc, star], 0);
        assert_eq!(arena.compute_min_length(concat), 3);
    }

    #[test]
    fn min_length_of_alternation_is_shortest_branch() {
        let mut arena = NodeArena::new();
        let cat = arena.multi("cat", 0);
        let hippo = arena.multi("hippo", 0);
        let alt = arena.alternate(vec![cat, hippo], 0);
        assert_eq!(arena.compute_min_length(alt), 3);
    }

    #[test]
    fn joinable_range_covers_fixed_length_run() {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let bc = arena.multi("bc", 0);
        let rep = arena.one_loop('d', 3, 3, 0);
        let star = arena.one_loop('e', 0, INFINITE, 0);
        let concat = arena.concat(vec![a, bc, rep, star], 0);

        let (required, end) = arena
            .try_get_joinable_length_check_child_range(concat, 0)
            .unwrap();
        assert_eq!(required, 6);
        assert_eq!(end, 3);
    }

    #[test]
    fn joinable_range_requires_two_children() {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let star = arena.one_loop('e', 0, INFINITE, 0);
        let concat = arena.concat(vec![a, star], 0);
        assert!(
            arena
                .try_get_joinable_length_check_child_range(concat, 0)
                .is_none()
        );
    }

    #[test]
    fn ordinal_case_insensitive_run_from_case_pair_sets() {
        let mut arena = NodeArena::new();
        let ab = arena.set(CharClass::from_chars(&['a', 'A']), 0);
        let cd = arena.set(CharClass::from_chars(&['b', 'B']), 0);
        let digit = arena.one('1', 0);
        let concat = arena.concat(vec![ab, cd, digit], 0);

        let (consumed, text) = arena
            .try_get_ordinal_case_insensitive_string(concat, 0, 3)
            .unwrap();
        assert_eq!(consumed, 3);
        assert_eq!(text, "ab1");
    }

    #[test]
    fn starting_literal_looks_through_wrappers() {
        let mut arena = NodeArena::new();
        let m = arena.multi("dog", 0);
        let cap = arena.capture(1, m, 0);
        let atomic = arena.atomic(cap, 0);
        assert_eq!(arena.find_starting_literal_node(atomic), Some(m));

        let star = arena.one_loop('x', 0, INFINITE, 0);
        assert_eq!(arena.find_starting_literal_node(star), None);

        let plus = arena.one_loop('x', 1, INFINITE, 0);
        assert_eq!(arena.find_starting_literal_node(plus), Some(plus));
    }
}
