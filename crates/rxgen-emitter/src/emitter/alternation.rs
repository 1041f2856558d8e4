//! Alternation emission.
//!
//! Two strategies. When no backtracking can reenter the alternation and
//! every branch is known to start with a distinct character, the whole
//! construct becomes a switch on the next input character. Otherwise each
//! branch is emitted in order with reset-and-retry glue between them and a
//! branch table that backtracking uses to reenter the right branch.

use rustc_hash::FxHashSet;
use tracing::debug;

use rxgen_syntax::{NodeIndex, NodeKind, RegexNode};

use super::{EmitError, Emitter, SET_CHARS_SIZE};
use crate::literals::{rune_literal, rune_literal_list, string_literal};

/// A branch's guaranteed first characters, for the switched strategy.
struct BranchLiteral {
    literal: NodeIndex,
    chars: Vec<char>,
}

impl Emitter<'_> {
    pub(crate) fn emit_alternation(&mut self, idx: NodeIndex) -> Result<(), EmitError> {
        let node = &self.tree.arena[idx];
        let original_done = self.done_label.clone();
        let is_atomic = self.analysis.is_atomic_by_ancestor(idx);

        // The switched strategy jumps into branch bodies from a switch, so
        // it's only usable when nothing ever backtracks into the alternation.
        let mut use_switched_branches = false;
        if !node.is_right_to_left() {
            use_switched_branches = is_atomic
                || node
                    .children
                    .iter()
                    .all(|&child| !self.analysis.may_backtrack(child));
        }

        let branch_literals = if use_switched_branches {
            self.collect_disjoint_branch_literals(node)
        } else {
            None
        };
        debug!(
            branches = node.children.len(),
            switched = branch_literals.is_some(),
            "alternation strategy"
        );

        match branch_literals {
            Some(literals) => self.emit_switched_branches(idx, &literals, &original_done),
            None => self.emit_all_branches(idx, &original_done, is_atomic),
        }
    }

    /// Every branch must begin with one or more guaranteed characters, all
    /// distinct across all branches, with negated literals excluded.
    fn collect_disjoint_branch_literals(&self, node: &RegexNode) -> Option<Vec<BranchLiteral>> {
        let mut seen: FxHashSet<char> = FxHashSet::default();
        let mut literals = Vec::with_capacity(node.children.len());

        for &branch in &node.children {
            let literal = self.tree.arena.find_starting_literal_node(branch)?;
            let lit_node = &self.tree.arena[literal];
            if lit_node.is_notone_family() {
                return None;
            }

            let chars = if lit_node.is_one_family() || lit_node.kind == NodeKind::Multi {
                vec![lit_node.first_char_of_one_or_multi()]
            } else {
                let set = lit_node.set.as_ref()?;
                if set.is_negated() {
                    return None;
                }
                set.get_set_chars(SET_CHARS_SIZE)?
            };

            for &ch in &chars {
                if !seen.insert(ch) {
                    return None;
                }
            }
            literals.push(BranchLiteral { literal, chars });
        }
        Some(literals)
    }

    /// One switch on the next character; each case handles a branch with
    /// that first character already consumed.
    fn emit_switched_branches(
        &mut self,
        idx: NodeIndex,
        literals: &[BranchLiteral],
        original_done: &str,
    ) -> Result<(), EmitError> {
        // We need at least one character in the span to switch on.
        self.emit_span_length_check(1, None);
        self.blank_line();

        self.write_line(&format!(
            "switch {}[{}] {{",
            self.slice_span, self.slice_static_pos
        ));
        let starting_slice_static_pos = self.slice_static_pos;

        let children: Vec<NodeIndex> = self.tree.arena[idx].children.clone();
        for (i, &child_idx) in children.iter().enumerate() {
            self.slice_static_pos = starting_slice_static_pos;
            let branch = &literals[i];

            self.write_line(&format!("case {}:", rune_literal_list(&branch.chars)));
            self.w.increase_indent();

            // Matching the character in the switch may have fully handled
            // the branch's first node; emit whatever remains.
            let child = &self.tree.arena[child_idx];
            match child.kind {
                NodeKind::One | NodeKind::Set => {
                    self.slice_static_pos += 1;
                }
                NodeKind::Multi => {
                    self.slice_static_pos += 1;
                    self.emit_multi_tail(child);
                }
                NodeKind::Concatenate
                    if child.children[0] == branch.literal
                        && matches!(
                            self.tree.arena[branch.literal].kind,
                            NodeKind::One | NodeKind::Set | NodeKind::Multi
                        ) =>
                {
                    // The sequence starts with the literal the switch just
                    // matched; consume it virtually and emit the rest of the
                    // sequence from its second element.
                    let first = &self.tree.arena[branch.literal];
                    self.slice_static_pos += 1;
                    if first.kind == NodeKind::Multi {
                        self.emit_multi_tail(first);
                    }
                    self.emit_concatenation(child_idx, None, true, 1)?;
                    self.blank_line();
                }
                _ => {
                    self.emit_node(child_idx, None, true)?;
                    self.blank_line();
                }
            }

            // Only atomic alternations get here, so nothing backtracks into
            // the branch; every branch starts from the original done label.
            self.done_label = original_done.to_string();

            // Zero the static position so whatever follows the alternation
            // sees the same value no matter which branch ran.
            self.transfer_slice_static_pos_to_pos(false);
            self.w.decrease_indent();
        }

        self.write_line("default:");
        self.w.increase_indent();
        let done = self.done_label.clone();
        self.emit_goto(&done);
        self.w.decrease_indent();
        self.write_line("}");
        Ok(())
    }

    /// Emits the remainder of a literal string whose first character the
    /// surrounding switch already matched.
    fn emit_multi_tail(&mut self, node: &RegexNode) {
        let str = node.str.clone().unwrap_or_default();
        let mut chars = str.chars();
        chars.next();
        let rest: String = chars.collect();
        match rest.chars().count() {
            0 => {}
            1 => {
                let ch = rest.chars().next().unwrap_or('\0');
                let tail = RegexNode::one(ch, node.options);
                self.write_line(&format!("// Match {}.", rune_literal(ch)));
                self.emit_single_char(&tail, true, None);
            }
            _ => {
                self.write_line(&format!("// Match the string {}.", string_literal(&rest)));
                self.emit_multi_char_string(&rest, false);
            }
        }
    }

    /// The general strategy: try each branch in order, resetting state
    /// between branches, with a dispatch table for backtracking reentry.
    fn emit_all_branches(
        &mut self,
        idx: NodeIndex,
        original_done: &str,
        is_atomic: bool,
    ) -> Result<(), EmitError> {
        let children: Vec<NodeIndex> = self.tree.arena[idx].children.clone();
        let count = children.len();

        // Label reached when any branch completes successfully.
        let match_label = self.reserve_name("AlternationMatch");

        // The position to reset to each time a branch fails.
        let starting_pos = self.reserve_name("alternation_starting_pos");
        let can_use_locals = !is_atomic && !self.analysis.is_in_loop(idx);
        if can_use_locals {
            self.add_local_dec(format!("{starting_pos} := 0"));
            self.write_line(&format!("{starting_pos} = pos"));
        } else {
            self.write_line(&format!("{starting_pos} := pos"));
        }
        let starting_slice_static_pos = self.slice_static_pos;

        // Captures need unwinding both when a branch with captures fails and
        // when post-alternation code backtracks into the alternation, so
        // grab the crawl position whenever either can happen.
        let mut starting_capture_pos = String::new();
        if self.expression_has_captures
            && (self.analysis.may_contain_capture(idx) || !is_atomic)
        {
            starting_capture_pos = self.reserve_name("alternation_starting_capturepos");
            if can_use_locals {
                self.add_local_dec(format!("{starting_capture_pos} := 0"));
                self.write_line(&format!("{starting_capture_pos} = r.Crawlpos()"));
            } else {
                self.write_line(&format!("{starting_capture_pos} := r.Crawlpos()"));
            }
        }
        self.blank_line();

        // Backtracking reenters through a branch table populated with, per
        // branch, either the label of the last backtracking construct inside
        // the branch or the label of the next branch.
        let backtrack_label = self.reserve_name("AlternationBacktrack");
        let mut label_map: Vec<String> = Vec::with_capacity(count);

        // Outside of a loop the branch index can live in a local; inside a
        // loop it has to go on the stack.
        let mut current_branch = String::new();
        if can_use_locals {
            current_branch = self.reserve_name("alternation_branch");
            self.add_local_dec(format!("{current_branch} := 0"));
        }

        for (i, &child_idx) in children.iter().enumerate() {
            self.write_line(&format!("// Branch {i}"));
            let is_last = i == count - 1;

            let next_branch = if !is_last {
                let label = self.reserve_name("AlternationBranch");
                self.done_label = label.clone();
                Some(label)
            } else {
                self.done_label = original_done.to_string();
                None
            };

            self.emit_node(child_idx, None, true)?;
            self.blank_line();

            if !is_atomic {
                if current_branch.is_empty() {
                    let branch_index = i.to_string();
                    if !starting_capture_pos.is_empty() {
                        self.emit_stack_push(&[
                            &branch_index,
                            &starting_pos,
                            &starting_capture_pos,
                        ]);
                    } else {
                        self.emit_stack_push(&[&branch_index, &starting_pos]);
                    }
                } else {
                    self.write_line(&format!("{current_branch} = {i}"));
                }
            }
            label_map.push(self.done_label.clone());

            self.transfer_slice_static_pos_to_pos(false);
            if !is_last || !is_atomic {
                self.emit_goto(&match_label);
            }

            // Reset state for the next branch: the position back to the
            // start of the alternation, the slice to its full length, and
            // any captures from the failed branch unwound.
            if let Some(next_branch) = next_branch {
                self.blank_line();
                self.mark_label(&next_branch);
                self.write_line(&format!("pos = {starting_pos}"));
                self.slice_input_span(false);
                self.slice_static_pos = starting_slice_static_pos;
                if !starting_capture_pos.is_empty() {
                    self.emit_uncapture_until(&starting_capture_pos);
                }
            }
            self.blank_line();
        }

        if is_atomic {
            self.done_label = original_done.to_string();
        } else {
            // Only reachable by explicit jump when something after the
            // alternation backtracks.
            self.done_label = backtrack_label.clone();
            self.mark_label(&backtrack_label);
            self.emit_timeout_check_if_needed();

            let switch_on = if current_branch.is_empty() {
                if !starting_capture_pos.is_empty() {
                    self.emit_stack_pop(&[&starting_capture_pos, &starting_pos]);
                } else {
                    self.emit_stack_pop(&[&starting_pos]);
                }
                "r.StackPop()".to_string()
            } else {
                current_branch.clone()
            };
            self.write_line(&format!("switch {switch_on} {{"));
            for (i, label) in label_map.iter().enumerate() {
                self.write_line(&format!("case {i}:"));
                self.w.increase_indent();
                let target = label.clone();
                self.emit_goto(&target);
                self.w.decrease_indent();
            }
            self.write_line("}");
            self.blank_line();
        }

        self.mark_label(&match_label);
        Ok(())
    }
}
