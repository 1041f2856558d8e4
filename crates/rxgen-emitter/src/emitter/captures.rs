//! Captures, backreferences, and conditionals.

use rxgen_syntax::{NodeIndex, node_options};

use super::{EmitError, Emitter};

impl Emitter<'_> {
    // =========================================================================
    // Capture groups
    // =========================================================================

    pub(crate) fn emit_capture(
        &mut self,
        idx: NodeIndex,
        subsequent: Option<NodeIndex>,
    ) -> Result<(), EmitError> {
        let node = &self.tree.arena[idx];
        let capnum = self.tree.map_capture_number(node.m);
        let uncapnum = self.tree.map_capture_number(node.n);
        let is_atomic = self.analysis.is_atomic_by_ancestor(idx);
        let is_in_loop = self.analysis.is_in_loop(idx);

        self.transfer_slice_static_pos_to_pos(false);
        let starting_pos = self.reserve_name("capture_starting_pos");
        if is_in_loop {
            self.write_line(&format!("{starting_pos} := pos"));
        } else {
            self.add_local_dec(format!("{starting_pos} := 0"));
            self.write_line(&format!("{starting_pos} = pos"));
        }
        self.blank_line();

        if uncapnum != -1 {
            // A balancing group requires the group it balances against to
            // have something to uncapture.
            self.emit_fail_if(&format!("!r.IsMatched({uncapnum})"));
            self.blank_line();
        }

        let original_done = self.done_label.clone();
        self.emit_node(node.children[0], subsequent, true)?;
        let child_backtracks = self.done_label != original_done;

        self.blank_line();
        self.transfer_slice_static_pos_to_pos(false);
        if uncapnum == -1 {
            self.write_line(&format!("r.Capture({capnum}, {starting_pos}, pos)"));
        } else {
            self.write_line(&format!(
                "r.TransferCapture({capnum}, {uncapnum}, {starting_pos}, pos)"
            ));
        }

        if is_atomic || !child_backtracks {
            // Nothing can reenter the capture, so there's no starting
            // position to restore.
            self.done_label = original_done;
        } else {
            // When the child backtracks, the capture's starting position
            // must be restored on the way back through, since an enclosing
            // loop may have overwritten it.
            self.blank_line();
            if is_in_loop {
                self.emit_stack_push(&[&starting_pos]);
            }

            let skip_backtrack = self.reserve_name("CaptureSkipBacktrack");
            self.emit_goto(&skip_backtrack);
            self.blank_line();

            let backtrack = self.reserve_name("CaptureBacktrack");
            self.mark_label(&backtrack);
            if is_in_loop {
                self.emit_stack_pop(&[&starting_pos]);
            }
            let prior = self.done_label.clone();
            self.emit_goto(&prior);
            self.blank_line();

            self.done_label = backtrack;
            self.mark_label(&skip_backtrack);
        }
        Ok(())
    }

    // =========================================================================
    // Backreferences
    // =========================================================================

    /// Emits a backreference: compare the group's last match, character by
    /// character, against the input at the current position.
    pub(crate) fn emit_backreference(&mut self, idx: NodeIndex) {
        let node = &self.tree.arena[idx];
        let capnum = self.tree.map_capture_number(node.m);
        let rtl = node.is_right_to_left();
        let ecma = node.options & node_options::ECMASCRIPT != 0;

        self.transfer_slice_static_pos_to_pos(false);

        if ecma {
            // Under ECMAScript rules a backreference to an unmatched group
            // matches the empty string.
            self.write_line(&format!("if r.IsMatched({capnum}) {{"));
            self.w.increase_indent();
        } else {
            self.emit_fail_if(&format!("!r.IsMatched({capnum})"));
            self.blank_line();
        }

        let match_length = self.reserve_name("matchLength");
        let match_index = self.reserve_name("matchIndex");
        let i = self.reserve_name("i");

        self.write_line(&format!("{match_length} := r.MatchLength({capnum})"));
        if rtl {
            self.emit_fail_if(&format!("pos < {match_length}"));
        } else {
            self.emit_fail_if(&format!("len({}) < {match_length}", self.slice_span));
        }
        self.blank_line();

        self.write_line(&format!("{match_index} := r.MatchIndex({capnum})"));
        self.write_line(&format!("for {i} := 0; {i} < {match_length}; {i}++ {{"));
        self.w.increase_indent();
        if rtl {
            self.emit_fail_if(&format!(
                "r.Runtext[{match_index}+{match_length}-{i}-1] != r.Runtext[pos-{i}-1]"
            ));
        } else {
            self.emit_fail_if(&format!(
                "r.Runtext[{match_index}+{i}] != {}[{i}]",
                self.slice_span
            ));
        }
        self.w.decrease_indent();
        self.write_line("}");
        self.blank_line();

        if rtl {
            self.write_line(&format!("pos -= {match_length}"));
        } else {
            self.write_line(&format!("pos += {match_length}"));
            self.slice_input_span(false);
        }

        if ecma {
            self.w.decrease_indent();
            self.write_line("}");
        }
    }

    // =========================================================================
    // Conditionals
    // =========================================================================

    /// Emits `(?(n)yes|no)`: whether the referenced group matched selects
    /// the branch; a resume marker records which branch ran so backtracking
    /// can reenter the right one.
    pub(crate) fn emit_backreference_conditional(
        &mut self,
        idx: NodeIndex,
    ) -> Result<(), EmitError> {
        let node = &self.tree.arena[idx];
        let capnum = self.tree.map_capture_number(node.m);
        let yes_idx = node.children[0];
        let no_idx = node.children.get(1).copied();
        let is_in_loop = self.analysis.is_in_loop(idx);

        self.transfer_slice_static_pos_to_pos(false);

        let original_done = self.done_label.clone();
        let ref_not_matched = self.reserve_name("ConditionalBackreferenceNotMatched");
        let end_conditional = self.reserve_name("ConditionalBackreferenceEnd");

        let needs_backtracking = self.analysis.may_backtrack(yes_idx)
            || no_idx.is_some_and(|no| self.analysis.may_backtrack(no));
        let mut resume_at = String::new();
        if needs_backtracking {
            resume_at = self.reserve_name("conditionalbackreference_branch");
            self.add_local_dec(format!("{resume_at} := 0"));
        }

        self.emit_goto_block(
            &format!("if !r.IsMatched({capnum}) {{"),
            &ref_not_matched,
        );
        self.blank_line();

        // The "yes" branch.
        self.emit_node(yes_idx, None, true)?;
        self.transfer_slice_static_pos_to_pos(false);
        let post_yes_done = self.done_label.clone();
        if needs_backtracking {
            self.write_line(&format!("{resume_at} = 0"));
        }
        self.emit_goto(&end_conditional);
        self.blank_line();

        // The "no" branch, if any.
        self.mark_label(&ref_not_matched);
        let mut post_no_done = original_done.clone();
        if let Some(no_idx) = no_idx {
            self.done_label = original_done.clone();
            self.emit_node(no_idx, None, true)?;
            self.transfer_slice_static_pos_to_pos(false);
            post_no_done = self.done_label.clone();
        }
        if needs_backtracking {
            self.write_line(&format!("{resume_at} = 1"));
        }

        self.emit_conditional_ending(
            needs_backtracking,
            is_in_loop,
            &resume_at,
            &end_conditional,
            &post_yes_done,
            &post_no_done,
            &original_done,
            "ConditionalBackreferenceBacktrack",
        );
        Ok(())
    }

    /// Emits `(?(expr)yes|no)`: the condition runs as an implicitly atomic
    /// zero-width assertion whose outcome selects the branch.
    pub(crate) fn emit_expression_conditional(&mut self, idx: NodeIndex) -> Result<(), EmitError> {
        let node = &self.tree.arena[idx];
        let condition_idx = node.children[0];
        let yes_idx = node.children[1];
        let no_idx = node.children.get(2).copied();
        let is_in_loop = self.analysis.is_in_loop(idx);

        self.transfer_slice_static_pos_to_pos(false);

        let original_done = self.done_label.clone();
        let condition_failed = self.reserve_name("ConditionalExpressionNotMatched");
        let end_conditional = self.reserve_name("ConditionalExpressionEnd");

        let needs_backtracking = self.analysis.may_backtrack(yes_idx)
            || no_idx.is_some_and(|no| self.analysis.may_backtrack(no));
        let mut resume_at = String::new();
        if needs_backtracking {
            resume_at = self.reserve_name("conditionalexpression_branch");
            self.add_local_dec(format!("{resume_at} := 0"));
        }

        // The condition is zero-width: snapshot everything it can disturb.
        let starting_pos = self.reserve_name("conditionalexpression_starting_pos");
        if is_in_loop {
            self.write_line(&format!("{starting_pos} := pos"));
        } else {
            self.add_local_dec(format!("{starting_pos} := 0"));
            self.write_line(&format!("{starting_pos} = pos"));
        }
        let starting_stackpos = self.reserve_name("conditionalexpression_stackpos");
        self.add_local_dec(format!("{starting_stackpos} := 0"));
        self.write_line(&format!("{starting_stackpos} = r.Runstackpos"));
        let mut starting_capture_pos = String::new();
        if self.expression_has_captures {
            starting_capture_pos = self.reserve_name("conditionalexpression_capturepos");
            self.add_local_dec(format!("{starting_capture_pos} := 0"));
            self.write_line(&format!("{starting_capture_pos} = r.Crawlpos()"));
        }
        self.blank_line();

        self.done_label = condition_failed.clone();
        self.emit_node(condition_idx, None, true)?;
        self.transfer_slice_static_pos_to_pos(false);
        self.done_label = original_done.clone();

        // Condition matched; restore position and discard any backtracking
        // state it pushed. Captures it made are kept.
        self.write_line(&format!("pos = {starting_pos}"));
        self.slice_input_span(false);
        self.write_line(&format!("r.Runstackpos = {starting_stackpos}"));
        self.blank_line();

        // The "yes" branch.
        self.emit_node(yes_idx, None, true)?;
        self.transfer_slice_static_pos_to_pos(false);
        let post_yes_done = self.done_label.clone();
        if needs_backtracking {
            self.write_line(&format!("{resume_at} = 0"));
        }
        self.emit_goto(&end_conditional);
        self.blank_line();

        // Condition failed: restore state, undo its captures, and run the
        // "no" branch.
        self.mark_label(&condition_failed);
        self.write_line(&format!("pos = {starting_pos}"));
        self.slice_input_span(false);
        self.write_line(&format!("r.Runstackpos = {starting_stackpos}"));
        if !starting_capture_pos.is_empty() {
            self.emit_uncapture_until(&starting_capture_pos);
        }
        self.blank_line();

        let mut post_no_done = original_done.clone();
        if let Some(no_idx) = no_idx {
            self.done_label = original_done.clone();
            self.emit_node(no_idx, None, true)?;
            self.transfer_slice_static_pos_to_pos(false);
            post_no_done = self.done_label.clone();
        }
        if needs_backtracking {
            self.write_line(&format!("{resume_at} = 1"));
        }

        self.emit_conditional_ending(
            needs_backtracking,
            is_in_loop,
            &resume_at,
            &end_conditional,
            &post_yes_done,
            &post_no_done,
            &original_done,
            "ConditionalExpressionBacktrack",
        );
        Ok(())
    }

    /// The shared tail of both conditionals: either a plain end label, or a
    /// backtracking dispatcher that reenters whichever branch ran.
    #[allow(clippy::too_many_arguments)]
    fn emit_conditional_ending(
        &mut self,
        needs_backtracking: bool,
        is_in_loop: bool,
        resume_at: &str,
        end_conditional: &str,
        post_yes_done: &str,
        post_no_done: &str,
        original_done: &str,
        backtrack_name: &str,
    ) {
        if !needs_backtracking {
            self.done_label = original_done.to_string();
            self.mark_label(end_conditional);
            return;
        }

        self.emit_goto(end_conditional);
        self.blank_line();

        let backtrack = self.reserve_name(backtrack_name);
        self.mark_label(&backtrack);
        if is_in_loop {
            self.emit_stack_pop(&[resume_at]);
        }
        self.emit_timeout_check_if_needed();
        self.write_line(&format!("switch {resume_at} {{"));
        self.write_line("case 0:");
        self.w.increase_indent();
        self.emit_goto(post_yes_done);
        self.w.decrease_indent();
        self.write_line("case 1:");
        self.w.increase_indent();
        self.emit_goto(post_no_done);
        self.w.decrease_indent();
        self.write_line("}");
        self.blank_line();

        self.done_label = backtrack;
        self.mark_label(end_conditional);
        if is_in_loop {
            self.emit_stack_push(&[resume_at]);
        }
    }
}
