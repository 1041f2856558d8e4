//! Human-readable node descriptions, rendered into comments in the
//! generated source. Pure over the tree and analysis: the same node always
//! yields the same text. Never affects match semantics; tests use the
//! descriptions to assert emission shape.

use rxgen_syntax::{INFINITE, NodeIndex, NodeKind, RegexTree, TreeAnalysis};

use crate::literals::{rune_literal, string_literal};

/// A textual description of the node, fit for a source comment.
pub fn describe_node(tree: &RegexTree, analysis: &TreeAnalysis, idx: NodeIndex) -> String {
    let node = &tree.arena[idx];
    let rtl = node.is_right_to_left();
    let direction = if rtl { " right-to-left" } else { "" };
    let ch = || rune_literal(node.ch.unwrap_or('\0'));
    let set = || node.set.as_ref().map(|s| s.to_string()).unwrap_or_default();

    match node.kind {
        NodeKind::Alternate => {
            let atomic = if analysis.is_atomic_by_ancestor(idx) {
                ", atomically"
            } else {
                ""
            };
            format!(
                "Match with {} alternative expressions{atomic}.",
                node.children.len()
            )
        }
        NodeKind::Atomic => "Atomic group.".to_string(),
        NodeKind::Beginning => "Match if at the beginning of the string.".to_string(),
        NodeKind::Bol => "Match if at the beginning of a line.".to_string(),
        NodeKind::Boundary => "Match if at a word boundary.".to_string(),
        NodeKind::Capture => {
            if node.m == -1 && node.n != -1 {
                format!(
                    "Non-capturing balancing group. Uncaptures the {}.",
                    describe_capture(tree, node.n)
                )
            } else if node.n != -1 {
                format!(
                    "Balancing group. Captures the {} and uncaptures the {}.",
                    describe_capture(tree, node.m),
                    describe_capture(tree, node.n)
                )
            } else {
                describe_capture(tree, node.m)
            }
        }
        NodeKind::Concatenate => "Match a sequence of expressions.".to_string(),
        NodeKind::EcmaBoundary => {
            "Match if at a word boundary (according to ECMAScript rules).".to_string()
        }
        NodeKind::Empty => "Match an empty string.".to_string(),
        NodeKind::End => "Match if at the end of the string.".to_string(),
        NodeKind::EndZ => {
            "Match if at the end of the string or if before an ending newline.".to_string()
        }
        NodeKind::Eol => "Match if at the end of a line.".to_string(),
        NodeKind::Loop | NodeKind::Lazyloop => {
            if node.m == 0 && node.n == 1 {
                let style = if node.kind == NodeKind::Loop {
                    "greedy"
                } else {
                    "lazy"
                };
                format!("Optional ({style}).")
            } else {
                format!(
                    "Loop {}{direction}.",
                    describe_loop(tree, analysis, idx)
                )
            }
        }
        NodeKind::Multi => format!(
            "Match the string {}{direction}.",
            string_literal(node.str.as_deref().unwrap_or_default())
        ),
        NodeKind::NonBoundary => "Match if at anything other than a word boundary.".to_string(),
        NodeKind::NonEcmaBoundary => {
            "Match if at anything other than a word boundary (according to ECMAScript rules)."
                .to_string()
        }
        NodeKind::Nothing => "Fail to match.".to_string(),
        NodeKind::Notone => format!("Match any character other than {}{direction}.", ch()),
        NodeKind::Notoneloop | NodeKind::Notonelazy => format!(
            "Match a character other than {} {}{direction}.",
            ch(),
            describe_loop(tree, analysis, idx)
        ),
        NodeKind::One => format!("Match {}{direction}.", ch()),
        NodeKind::Oneloop | NodeKind::Onelazy => format!(
            "Match {} {}{direction}.",
            ch(),
            describe_loop(tree, analysis, idx)
        ),
        NodeKind::NegLook => if rtl {
            "Zero-width negative lookbehind assertion."
        } else {
            "Zero-width negative lookahead assertion."
        }
        .to_string(),
        NodeKind::Ref => format!(
            "Match the same text as matched by the {}{direction}.",
            describe_capture(tree, node.m)
        ),
        NodeKind::PosLook => if rtl {
            "Zero-width positive lookbehind assertion."
        } else {
            "Zero-width positive lookahead assertion."
        }
        .to_string(),
        NodeKind::Set => format!("Match {}{direction}.", set()),
        NodeKind::Setloop | NodeKind::Setlazy => format!(
            "Match {} {}{direction}.",
            set(),
            describe_loop(tree, analysis, idx)
        ),
        NodeKind::Start => "Match if at the start position.".to_string(),
        NodeKind::ExprCond => {
            "Conditionally match one of two expressions depending on whether an initial expression matches."
                .to_string()
        }
        NodeKind::BackRefCond => format!(
            "Conditionally match one of two expressions depending on whether the {} matched.",
            describe_capture(tree, node.m)
        ),
        NodeKind::UpdateBumpalong => "Advance the next matching position.".to_string(),
    }
}

/// An identifier for a capture group: its name when it has a real one, an
/// English ordinal otherwise.
fn describe_capture(tree: &RegexTree, capnum: i32) -> String {
    let name = tree.group_name_from_number(capnum);
    if !name.is_empty() && name.parse::<i32>() != Ok(capnum) {
        return format!("{} capture group", string_literal(&name));
    }

    let tens = capnum % 10;
    let suffix = if (1..=3).contains(&tens) && !(11..=13).contains(&(capnum % 100)) {
        match tens {
            1 => "st",
            2 => "nd",
            _ => "rd",
        }
    } else {
        "th"
    };
    format!("{capnum}{suffix} capture group")
}

/// A textual description of a loop's style and bounds.
fn describe_loop(tree: &RegexTree, analysis: &TreeAnalysis, idx: NodeIndex) -> String {
    let node = &tree.arena[idx];
    if node.m == node.n {
        return format!("exactly {} times", node.m);
    }

    let atomic = analysis.is_atomic_by_ancestor(idx);
    let style = match node.kind {
        NodeKind::Oneloop | NodeKind::Notoneloop | NodeKind::Setloop => "greedily",
        NodeKind::Onelazy | NodeKind::Notonelazy | NodeKind::Setlazy => "lazily",
        NodeKind::Loop => {
            if atomic {
                "greedily and atomically"
            } else {
                "greedily"
            }
        }
        _ => {
            if atomic {
                "lazily and atomically"
            } else {
                "lazily"
            }
        }
    };

    let bounds = if node.n == INFINITE {
        match node.m {
            0 => " any number of times".to_string(),
            1 => " at least once".to_string(),
            2 => " at least twice".to_string(),
            m => format!(" at least {m} times"),
        }
    } else if node.m == 0 {
        if node.n == 1 {
            ", optionally".to_string()
        } else {
            format!(" at most {} times", node.n)
        }
    } else {
        format!(" at least {} and at most {} times", node.m, node.n)
    };

    format!("{style}{bounds}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxgen_syntax::{CharClass, NodeArena, RegexTree, TreeAnalysis};

    fn tree_of(build: impl FnOnce(&mut NodeArena) -> NodeIndex) -> RegexTree {
        let mut arena = NodeArena::new();
        let pattern = build(&mut arena);
        RegexTree::new(arena, pattern, 0, 1)
    }

    #[test]
    fn loop_bounds_render_english_phrases() {
        let tree = tree_of(|a| a.one_loop('a', 0, INFINITE, 0));
        let analysis = TreeAnalysis::analyze(&tree);
        let star = tree.root_child();
        assert_eq!(
            describe_node(&tree, &analysis, star),
            "Match 'a' greedily any number of times."
        );

        let tree = tree_of(|a| a.one_lazy('x', 2, 5, 0));
        let analysis = TreeAnalysis::analyze(&tree);
        assert_eq!(
            describe_node(&tree, &analysis, tree.root_child()),
            "Match 'x' lazily at least 2 and at most 5 times."
        );

        let tree = tree_of(|a| a.one_loop('y', 3, 3, 0));
        let analysis = TreeAnalysis::analyze(&tree);
        assert_eq!(
            describe_node(&tree, &analysis, tree.root_child()),
            "Match 'y' exactly 3 times."
        );
    }

    #[test]
    fn capture_ordinals_have_english_exceptions() {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let tree = RegexTree::new(arena, a, 0, 25);
        assert_eq!(describe_capture(&tree, 1), "1st capture group");
        assert_eq!(describe_capture(&tree, 2), "2nd capture group");
        assert_eq!(describe_capture(&tree, 3), "3rd capture group");
        assert_eq!(describe_capture(&tree, 4), "4th capture group");
        assert_eq!(describe_capture(&tree, 11), "11th capture group");
        assert_eq!(describe_capture(&tree, 12), "12th capture group");
        assert_eq!(describe_capture(&tree, 13), "13th capture group");
        assert_eq!(describe_capture(&tree, 21), "21st capture group");
    }

    #[test]
    fn named_groups_render_by_name() {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let mut tree = RegexTree::new(arena, a, 0, 2);
        tree.cap_list = vec!["0".to_string(), "year".to_string()];
        assert_eq!(describe_capture(&tree, 1), "\"year\" capture group");
    }

    #[test]
    fn descriptions_are_stable_across_calls() {
        let tree = tree_of(|a| {
            let class = CharClass::from_range('a', 'z');
            a.set_loop(class, 1, INFINITE, 0)
        });
        let analysis = TreeAnalysis::analyze(&tree);
        let idx = tree.root_child();
        let first = describe_node(&tree, &analysis, idx);
        let second = describe_node(&tree, &analysis, idx);
        assert_eq!(first, second);
        assert_eq!(first, "Match [a-z] greedily at least once.");
    }
}
