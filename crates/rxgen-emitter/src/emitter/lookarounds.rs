//! Atomic groups, lookarounds, anchors, and word boundaries.

use rxgen_syntax::{NodeIndex, NodeKind};

use super::{EmitError, Emitter};

impl Emitter<'_> {
    // =========================================================================
    // Atomic groups
    // =========================================================================

    /// Emits an atomic group around a backtracking child. Once the child has
    /// matched, its backtracking state is discarded and the failure target
    /// is restored, so nothing after the group can reenter it.
    pub(crate) fn emit_atomic(
        &mut self,
        idx: NodeIndex,
        subsequent: Option<NodeIndex>,
    ) -> Result<(), EmitError> {
        let node = &self.tree.arena[idx];
        let original_done = self.done_label.clone();

        let starting_stackpos = self.reserve_name("atomic_stackpos");
        self.add_local_dec(format!("{starting_stackpos} := 0"));
        self.write_line(&format!("{starting_stackpos} = r.Runstackpos"));
        self.blank_line();

        self.emit_node(node.children[0], subsequent, true)?;

        self.blank_line();
        self.write_line(&format!("r.Runstackpos = {starting_stackpos}"));
        self.done_label = original_done;
        Ok(())
    }

    /// Tells the scan loop to bump from the current position rather than
    /// from where this attempt started.
    pub(crate) fn emit_update_bumpalong(&mut self) {
        self.transfer_slice_static_pos_to_pos(false);
        self.write_line("if r.Runtextpos < pos {");
        self.indented(|e| e.write_line("r.Runtextpos = pos"));
        self.write_line("}");
    }

    // =========================================================================
    // Anchors
    // =========================================================================

    pub(crate) fn emit_anchors(&mut self, idx: NodeIndex) {
        let node = &self.tree.arena[idx];
        let k = self.slice_static_pos;
        let slice = self.slice_span;

        match node.kind {
            NodeKind::Beginning | NodeKind::Start => {
                if k > 0 {
                    // Having already matched part of the pattern, we can't
                    // possibly be at the start; the anchor always fails.
                    let done = self.done_label.clone();
                    self.emit_goto(&done);
                } else if node.kind == NodeKind::Beginning {
                    self.emit_fail_if("pos != 0");
                } else {
                    self.emit_fail_if("pos != r.Runtextstart");
                }
            }

            NodeKind::Bol => {
                if k > 0 {
                    self.emit_fail_if(&format!("{slice}[{}] != '\\n'", k - 1));
                } else {
                    self.emit_fail_if("pos > 0 && r.Runtext[pos-1] != '\\n'");
                }
            }

            NodeKind::End => {
                if k > 0 {
                    self.emit_fail_if(&format!("{k} < len({slice})"));
                } else {
                    self.emit_fail_if("pos < r.Runtextend");
                }
            }

            NodeKind::EndZ => {
                if k > 0 {
                    self.emit_fail_if(&format!(
                        "len({slice}) > {} || (len({slice}) > {k} && {slice}[{k}] != '\\n')",
                        k + 1
                    ));
                } else {
                    self.emit_fail_if(
                        "pos < r.Runtextend-1 || (pos < r.Runtextend && r.Runtext[pos] != '\\n')",
                    );
                }
            }

            NodeKind::Eol => {
                if k > 0 {
                    self.emit_fail_if(&format!("{k} < len({slice}) && {slice}[{k}] != '\\n'"));
                } else {
                    self.emit_fail_if("pos < r.Runtextend && r.Runtext[pos] != '\\n'");
                }
            }

            _ => {}
        }
    }

    // =========================================================================
    // Word boundaries
    // =========================================================================

    /// Each boundary is a single condition at the current position; no
    /// characters are consumed.
    pub(crate) fn emit_boundary(&mut self, idx: NodeIndex) {
        let node = &self.tree.arena[idx];
        let at = if self.slice_static_pos > 0 {
            format!("pos+{}", self.slice_static_pos)
        } else {
            "pos".to_string()
        };

        let cond = match node.kind {
            NodeKind::Boundary => format!("!helpers.IsBoundary(r.Runtext, {at})"),
            NodeKind::NonBoundary => format!("helpers.IsBoundary(r.Runtext, {at})"),
            NodeKind::EcmaBoundary => format!("!helpers.IsECMABoundary(r.Runtext, {at})"),
            _ => format!("helpers.IsECMABoundary(r.Runtext, {at})"),
        };
        self.emit_fail_if(&cond);
    }

    // =========================================================================
    // Lookarounds
    // =========================================================================

    /// Positive lookarounds are implicitly atomic and zero-width: run the
    /// child, then put the position, the static offset, and the backtracking
    /// stack back the way they were. Captures made inside are kept.
    pub(crate) fn emit_positive_lookaround(&mut self, idx: NodeIndex) -> Result<(), EmitError> {
        let node = &self.tree.arena[idx];
        let child_idx = node.children[0];
        let rtl = node.is_right_to_left();

        let starting_pos = self.reserve_name(if rtl {
            "positivelookbehind_starting_pos"
        } else {
            "positivelookahead_starting_pos"
        });
        if self.analysis.is_in_loop(idx) {
            self.write_line(&format!("{starting_pos} := pos"));
        } else {
            self.add_local_dec(format!("{starting_pos} := 0"));
            self.write_line(&format!("{starting_pos} = pos"));
        }
        let starting_slice_static_pos = self.slice_static_pos;

        let mut starting_stackpos = String::new();
        if self.analysis.may_backtrack(child_idx) {
            starting_stackpos = self.reserve_name("lookaround_stackpos");
            self.add_local_dec(format!("{starting_stackpos} := 0"));
            self.write_line(&format!("{starting_stackpos} = r.Runstackpos"));
        }
        self.blank_line();

        let original_done = self.done_label.clone();
        self.emit_node(child_idx, None, true)?;
        self.done_label = original_done;

        self.blank_line();
        self.write_line("// The assertion is zero-width; restore the input position.");
        self.write_line(&format!("pos = {starting_pos}"));
        self.slice_input_span(false);
        self.slice_static_pos = starting_slice_static_pos;
        if !starting_stackpos.is_empty() {
            self.write_line(&format!("r.Runstackpos = {starting_stackpos}"));
        }
        Ok(())
    }

    /// Negative lookarounds invert the child: the child matching fails the
    /// construct, and the child failing lets matching continue from the
    /// original position with any of the child's captures undone.
    pub(crate) fn emit_negative_lookaround(&mut self, idx: NodeIndex) -> Result<(), EmitError> {
        let node = &self.tree.arena[idx];
        let child_idx = node.children[0];
        let rtl = node.is_right_to_left();

        let original_done = self.done_label.clone();
        let lookaround_failed = self.reserve_name(if rtl {
            "NegativeLookbehindMatch"
        } else {
            "NegativeLookaroundMatch"
        });

        let starting_pos = self.reserve_name(if rtl {
            "negativelookbehind_starting_pos"
        } else {
            "negativelookahead_starting_pos"
        });
        if self.analysis.is_in_loop(idx) {
            self.write_line(&format!("{starting_pos} := pos"));
        } else {
            self.add_local_dec(format!("{starting_pos} := 0"));
            self.write_line(&format!("{starting_pos} = pos"));
        }
        let starting_slice_static_pos = self.slice_static_pos;

        let mut starting_stackpos = String::new();
        if self.analysis.may_backtrack(child_idx) {
            starting_stackpos = self.reserve_name("lookaround_stackpos");
            self.add_local_dec(format!("{starting_stackpos} := 0"));
            self.write_line(&format!("{starting_stackpos} = r.Runstackpos"));
        }
        let mut starting_capture_pos = String::new();
        if self.expression_has_captures && self.analysis.may_contain_capture(child_idx) {
            starting_capture_pos = self.reserve_name("negativelookaround_capturepos");
            self.add_local_dec(format!("{starting_capture_pos} := 0"));
            self.write_line(&format!("{starting_capture_pos} = r.Crawlpos()"));
        }
        self.blank_line();

        self.done_label = lookaround_failed.clone();
        self.emit_node(child_idx, None, true)?;

        self.blank_line();
        self.write_line("// The child expression matched, so the negative assertion fails.");
        self.emit_goto(&original_done);
        self.blank_line();

        self.mark_label(&lookaround_failed);
        self.write_line(&format!("pos = {starting_pos}"));
        self.slice_input_span(false);
        self.slice_static_pos = starting_slice_static_pos;
        if !starting_stackpos.is_empty() {
            self.write_line(&format!("r.Runstackpos = {starting_stackpos}"));
        }
        if !starting_capture_pos.is_empty() {
            self.emit_uncapture_until(&starting_capture_pos);
        }
        self.done_label = original_done;
        Ok(())
    }
}
