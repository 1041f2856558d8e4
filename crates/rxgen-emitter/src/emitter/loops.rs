//! Loop emission: backtracking single-character loops, their lazy duals,
//! and general loops around arbitrary subexpressions.

use rxgen_syntax::{INFINITE, NodeIndex};

use super::{EmitError, Emitter, END_PLACEHOLDER, count_is_at_least, count_is_less_than};

impl Emitter<'_> {
    // =========================================================================
    // Single-character loops
    // =========================================================================

    /// Emits a greedy single-character loop. The loop body itself is emitted
    /// atomically; backtracking is layered on top by walking `pos` back one
    /// character at a time, which works because every iteration consumes
    /// exactly one character and captures nothing.
    pub(crate) fn emit_single_char_loop(
        &mut self,
        idx: NodeIndex,
        subsequent: Option<NodeIndex>,
        emit_length_checks: bool,
    ) -> Result<(), EmitError> {
        let node = &self.tree.arena[idx];

        // Atomic by ancestor: no backtracking necessary.
        if self.analysis.is_atomic_by_ancestor(idx) {
            self.emit_single_char_atomic_loop(node);
            return Ok(());
        }

        // A fixed repetition: no backtracking necessary either.
        if node.m == node.n {
            self.emit_single_char_repeater(node, emit_length_checks);
            return Ok(());
        }

        let backtracking_label = self.reserve_name("CharLoopBacktrack");
        let end_loop = self.reserve_name("CharLoopEnd");
        let starting_pos = self.reserve_name("charloop_starting_pos");
        let ending_pos = self.reserve_name("charloop_ending_pos");
        self.add_local_dec(format!("var {starting_pos}, {ending_pos} = 0, 0"));
        let rtl = node.is_right_to_left();
        let is_in_loop = self.analysis.is_in_loop(idx);

        // We're about to enter a loop; the static position must be 0.
        self.transfer_slice_static_pos_to_pos(false);

        // Grab the position, run the loop to its greedy end, and grab the
        // position again. `starting_pos` is then adjusted by the minimum so
        // it names the earliest acceptable ending position.
        self.write_line(&format!("{starting_pos} = pos"));
        self.blank_line();
        self.emit_single_char_atomic_loop(node);
        self.blank_line();

        self.transfer_slice_static_pos_to_pos(false);
        self.write_line(&format!("{ending_pos} = pos"));
        let min = node.m as i64;
        self.emit_add_stmt(&starting_pos, if rtl { -min } else { min });
        self.emit_goto(&end_loop);
        self.blank_line();

        // Backtracking section. Subsequent failures jump here; each entry
        // gives back one character (or skips to the next feasible ending
        // position) and then falls through to whatever follows the loop.
        self.mark_label(&backtracking_label);
        let mut capture_pos = String::new();
        if is_in_loop {
            // Inside another loop the locals could have been overwritten by
            // a later iteration, so the state lives on the stack.
            if self.expression_has_captures {
                self.emit_uncapture_until("r.StackPop()");
            }
            self.emit_stack_pop(&[&ending_pos, &starting_pos]);
        } else if self.expression_has_captures {
            capture_pos = self.reserve_name("charloop_capture_pos");
            self.add_local_dec(format!("{capture_pos} := 0"));
            self.emit_uncapture_until(&capture_pos);
        }
        self.blank_line();

        self.emit_timeout_check_if_needed();

        // If what follows starts with a searchable literal, skip straight to
        // positions where that literal could begin.
        let literal = subsequent.and_then(|s| self.tree.arena.find_starting_literal_node(s));
        let index_of = if !rtl && node.n > 1 {
            literal.and_then(|lit| {
                let span = format!("r.Runtext[{starting_pos}:{END_PLACEHOLDER}]");
                self.try_index_of(&self.tree.arena[lit], &span, true, false)
            })
        } else {
            None
        };

        if let Some((literal_length, template)) = index_of {
            self.emit_fail_if(&format!("{starting_pos} >= {ending_pos}"));
            let end_bound = if literal_length > 1 {
                format!(
                    "helpers.Min(r.Runtextend, {ending_pos}+{})",
                    literal_length - 1
                )
            } else {
                ending_pos.clone()
            };
            let expr = template.replace(END_PLACEHOLDER, &end_bound);
            self.write_line(&format!("{ending_pos} = {expr}"));
            self.emit_fail_if(&format!("{ending_pos} < 0"));
            self.write_line(&format!("{ending_pos} += {starting_pos}"));
            self.write_line(&format!("pos = {ending_pos}"));
        } else {
            let op = if rtl { "<=" } else { ">=" };
            self.emit_fail_if(&format!("{starting_pos} {op} {ending_pos}"));
            self.emit_add_stmt(&ending_pos, if rtl { 1 } else { -1 });
            self.write_line(&format!("pos = {ending_pos}"));
        }
        if !rtl {
            self.slice_input_span(false);
        }
        self.blank_line();

        self.mark_label(&end_loop);
        if is_in_loop {
            if self.expression_has_captures {
                self.emit_stack_push(&[&starting_pos, &ending_pos, "r.Crawlpos()"]);
            } else {
                self.emit_stack_push(&[&starting_pos, &ending_pos]);
            }
        } else if !capture_pos.is_empty() {
            self.write_line(&format!("{capture_pos} = r.Crawlpos()"));
        }

        // All subsequent failures now enter this loop's unwinder.
        self.done_label = backtracking_label;
        Ok(())
    }

    /// Emits a lazy single-character loop: match the minimum, and add one
    /// character per backtracking entry.
    pub(crate) fn emit_single_char_lazy(
        &mut self,
        idx: NodeIndex,
        emit_length_checks: bool,
    ) -> Result<(), EmitError> {
        let node = &self.tree.arena[idx];

        if node.m > 0 {
            self.emit_single_char_repeater(node, emit_length_checks);
        }
        if node.m == node.n || self.analysis.is_atomic_by_ancestor(idx) {
            // Nothing will ever ask the loop for more than its minimum.
            return Ok(());
        }

        let original_done = self.done_label.clone();
        let backtracking_label = self.reserve_name("LazyLoopBacktrack");
        let end_loop = self.reserve_name("LazyLoopEnd");
        let rtl = node.is_right_to_left();
        let is_in_loop = self.analysis.is_in_loop(idx);
        let max_extensions = if node.n == INFINITE {
            None
        } else {
            Some(node.n - node.m)
        };

        self.transfer_slice_static_pos_to_pos(false);

        let iteration_count = max_extensions.map(|_| {
            let name = self.reserve_name("lazyloop_iteration");
            self.add_local_dec(format!("{name} := 0"));
            self.write_line(&format!("{name} = 0"));
            name
        });

        // The loop's current end position, so backtracking can resume from
        // it after subsequent code moved `pos`.
        let loop_pos = self.reserve_name("lazyloop_pos");
        let mut capture_pos = String::new();
        if !is_in_loop {
            self.add_local_dec(format!("{loop_pos} := 0"));
            if self.expression_has_captures {
                capture_pos = self.reserve_name("lazyloop_capture_pos");
                self.add_local_dec(format!("{capture_pos} := 0"));
            }
        }

        // The minimum is already matched; continue with what follows until
        // something backtracks in.
        self.emit_goto(&end_loop);
        self.blank_line();

        self.mark_label(&backtracking_label);
        if is_in_loop {
            if self.expression_has_captures {
                self.emit_uncapture_until("r.StackPop()");
            }
            if let Some(ic) = &iteration_count {
                self.emit_stack_pop(&[ic]);
            }
            self.emit_stack_pop(&["pos"]);
        } else {
            if !capture_pos.is_empty() {
                self.emit_uncapture_until(&capture_pos);
            }
            self.write_line(&format!("pos = {loop_pos}"));
        }
        if !rtl {
            self.slice_input_span(false);
        }
        self.blank_line();

        self.emit_timeout_check_if_needed();

        if let (Some(ic), Some(max)) = (&iteration_count, max_extensions) {
            self.emit_goto_block(
                &format!("if {} {{", count_is_at_least(ic, max)),
                &original_done,
            );
        }

        // Consume exactly one more character; running out of input or
        // hitting a non-matching character exhausts the loop.
        self.emit_single_char(node, true, None);
        self.transfer_slice_static_pos_to_pos(false);
        if let Some(ic) = &iteration_count {
            self.write_line(&format!("{ic}++"));
        }
        self.blank_line();

        self.mark_label(&end_loop);
        if is_in_loop {
            match (&iteration_count, self.expression_has_captures) {
                (Some(ic), true) => self.emit_stack_push(&["pos", ic, "r.Crawlpos()"]),
                (Some(ic), false) => self.emit_stack_push(&["pos", ic]),
                (None, true) => self.emit_stack_push(&["pos", "r.Crawlpos()"]),
                (None, false) => self.emit_stack_push(&["pos"]),
            }
        } else {
            self.write_line(&format!("{loop_pos} = pos"));
            if !capture_pos.is_empty() {
                self.write_line(&format!("{capture_pos} = r.Crawlpos()"));
            }
        }

        self.done_label = backtracking_label;
        Ok(())
    }

    // =========================================================================
    // General loops
    // =========================================================================

    /// Emits a fixed-count loop whose child cannot backtrack.
    fn emit_non_backtracking_repeater(
        &mut self,
        idx: NodeIndex,
        iterations: i32,
    ) -> Result<(), EmitError> {
        // Every iteration of the loop must see a consistent static position.
        self.transfer_slice_static_pos_to_pos(false);

        let child = self.tree.arena[idx].children[0];
        let i = self.reserve_name("loop_iteration");
        self.write_line(&format!("for {i} := 0; {i} < {iterations}; {i}++ {{"));
        self.w.increase_indent();
        self.emit_node(child, None, true)?;
        self.transfer_slice_static_pos_to_pos(false);
        self.w.decrease_indent();
        self.write_line("}");
        Ok(())
    }

    pub(crate) fn emit_loop(&mut self, idx: NodeIndex) -> Result<(), EmitError> {
        let node = &self.tree.arena[idx];
        self.emit_loop_bounded(idx, node.m, node.n)
    }

    /// The general greedy loop. Also serves fixed-count lazy loops, whose
    /// observable behavior is the same.
    fn emit_loop_bounded(
        &mut self,
        idx: NodeIndex,
        min_iterations: i32,
        max_iterations: i32,
    ) -> Result<(), EmitError> {
        let node = &self.tree.arena[idx];
        let child_idx = node.children[0];

        if min_iterations == max_iterations {
            if min_iterations == 0 {
                return Ok(());
            }
            if min_iterations == 1 {
                return self.emit_node(child_idx, None, true);
            }
            if !self.analysis.may_backtrack(child_idx) {
                return self.emit_non_backtracking_repeater(idx, min_iterations);
            }
            // A backtracking child needs the general machinery so its
            // iterations can be unwound.
        }

        self.transfer_slice_static_pos_to_pos(false);

        let is_atomic = self.analysis.is_atomic_by_ancestor(idx);
        let mut starting_stackpos = String::new();
        if is_atomic || min_iterations > 1 {
            // State pushed by iterations may need to be discarded wholesale:
            // for atomic loops on the way out, and for under-minimum failures
            // after at least one successful iteration.
            starting_stackpos = self.reserve_name("startingStackpos");
            self.add_local_dec(format!("{starting_stackpos} := 0"));
            self.write_line(&format!("{starting_stackpos} = r.Runstackpos"));
        }

        let original_done = self.done_label.clone();
        let body = self.reserve_name("LoopBody");
        let end_loop = self.reserve_name("LoopEnd");
        let iteration_count = self.reserve_name("loop_iteration");

        // Loops whose iterations can match empty need extra checks to avoid
        // looping forever at one position.
        let iteration_may_be_empty = self.tree.arena.compute_min_length(child_idx) == 0;
        let mut starting_pos = String::new();
        if iteration_may_be_empty {
            starting_pos = self.reserve_name("loop_starting_pos");
            self.add_local_dec(format!("var {iteration_count}, {starting_pos} = 0, 0"));
            self.write_line(&format!("{starting_pos} = pos"));
        } else {
            self.add_local_dec(format!("{iteration_count} := 0"));
        }
        self.write_line(&format!("{iteration_count} = 0"));
        self.blank_line();

        self.mark_label(&body);

        // Each iteration gets its own saved state, even when the loop is
        // atomic, because matching the minimum may require unwinding within
        // the loop itself.
        match (self.expression_has_captures, iteration_may_be_empty) {
            (true, true) => self.emit_stack_push(&["r.Crawlpos()", &starting_pos, "pos"]),
            (true, false) => self.emit_stack_push(&["r.Crawlpos()", "pos"]),
            (false, true) => self.emit_stack_push(&[&starting_pos, "pos"]),
            (false, false) => self.emit_stack_push(&["pos"]),
        }
        self.blank_line();

        if iteration_may_be_empty {
            self.write_line(&format!("{starting_pos} = pos"));
        }

        // Incremented before the match so a failed match can always
        // decrement it, whether the failure came during the initial greedy
        // pass or while backtracking.
        self.write_line(&format!("{iteration_count}++"));
        self.blank_line();

        let iteration_failed = self.reserve_name("LoopIterationNoMatch");
        self.done_label = iteration_failed.clone();

        self.emit_node(child_idx, None, true)?;
        self.blank_line();
        self.transfer_slice_static_pos_to_pos(false);
        let child_backtracks = self.done_label != iteration_failed;

        // Loop condition.
        self.blank_line();
        if max_iterations == INFINITE && !iteration_may_be_empty {
            self.write_line("// The loop has no upper bound. Continue iterating greedily.");
            self.emit_goto(&body);
        } else {
            let head = if !iteration_may_be_empty {
                self.write_line(&format!(
                    "// The loop has an upper bound of {max_iterations}. Continue iterating greedily if it hasn't yet been reached."
                ));
                format!("if {} {{", count_is_less_than(&iteration_count, max_iterations))
            } else if min_iterations > 0 && max_iterations == INFINITE {
                self.write_line(&format!(
                    "// The loop has a lower bound of {min_iterations} but no upper bound. Continue iterating greedily"
                ));
                self.write_line(
                    "// if the last iteration wasn't empty (or if it was, if the lower bound hasn't yet been reached).",
                );
                format!(
                    "if pos != {starting_pos} || {} {{",
                    count_is_less_than(&iteration_count, min_iterations)
                )
            } else if min_iterations > 0 {
                self.write_line(&format!(
                    "// The loop has a lower bound of {min_iterations} and an upper bound of {max_iterations}. Continue iterating"
                ));
                self.write_line(
                    "// greedily if the upper bound hasn't yet been reached and either the last iteration was non-empty or the",
                );
                self.write_line("// lower bound hasn't yet been reached.");
                format!(
                    "if (pos != {starting_pos} || {}) && {} {{",
                    count_is_less_than(&iteration_count, min_iterations),
                    count_is_less_than(&iteration_count, max_iterations)
                )
            } else if max_iterations == INFINITE {
                self.write_line(
                    "// The loop is unbounded. Continue iterating greedily as long as the last iteration wasn't empty.",
                );
                format!("if pos != {starting_pos} {{")
            } else {
                self.write_line(&format!(
                    "// The loop has an upper bound of {max_iterations}. Continue iterating greedily if the upper bound hasn't"
                ));
                self.write_line("// yet been reached (as long as the last iteration wasn't empty).");
                format!(
                    "if pos != {starting_pos} && {} {{",
                    count_is_less_than(&iteration_count, max_iterations)
                )
            };
            self.emit_goto_block(&head, &body);
            self.emit_goto(&end_loop);
        }
        self.blank_line();

        // An iteration failed, either on the initial pass or during
        // backtracking. Reset state to what it was before that iteration.
        self.write_line("// The loop iteration failed. Put state back to the way it was before the iteration.");
        self.mark_label(&iteration_failed);
        self.write_line(&format!("{iteration_count}--"));
        self.write_line(&format!("if {iteration_count} < 0 {{"));
        self.indented(|e| {
            e.write_line("// Unable to match the remainder of the expression after exhausting the loop.");
        });
        self.w.increase_indent();
        self.emit_goto(&original_done);
        self.w.decrease_indent();
        self.write_line("}");
        if iteration_may_be_empty {
            self.emit_stack_pop(&["pos", &starting_pos]);
        } else {
            self.emit_stack_pop(&["pos"]);
        }
        if self.expression_has_captures {
            self.emit_uncapture_until("r.StackPop()");
        }
        self.slice_input_span(false);

        if min_iterations > 0 {
            if child_backtracks {
                self.write_line(&format!("if {iteration_count} == 0 {{"));
                self.indented(|e| {
                    e.write_line("// No iterations have been matched to backtrack into. Fail the loop.");
                });
                self.w.increase_indent();
                self.emit_goto(&original_done);
                self.w.decrease_indent();
                self.write_line("}");
                self.blank_line();

                if min_iterations > 1 {
                    // One successful iteration exists but it's under the
                    // minimum; backtrack into the prior iteration.
                    let into_child = self.done_label.clone();
                    self.write_line(&format!(
                        "if {} {{",
                        count_is_less_than(&iteration_count, min_iterations)
                    ));
                    self.indented(|e| {
                        e.write_line(&format!(
                            "// All possible iterations have matched, but it's below the required minimum of {min_iterations}."
                        ));
                        e.write_line("// Backtrack into the prior iteration.");
                    });
                    self.w.increase_indent();
                    self.emit_goto(&into_child);
                    self.w.decrease_indent();
                    self.write_line("}");
                    self.blank_line();
                }
            } else {
                // The child can't match differently, so an under-minimum
                // count is unrecoverable.
                self.write_line(&format!(
                    "if {} {{",
                    count_is_less_than(&iteration_count, min_iterations)
                ));
                self.w.increase_indent();
                self.write_line(&format!(
                    "// All possible iterations have matched, but it's below the required minimum of {min_iterations}. Fail the loop."
                ));
                if min_iterations > 1 {
                    self.write_line(&format!("if {iteration_count} != 0 {{"));
                    self.indented(|e| {
                        e.write_line("// Ensure any stale backtracking state is removed.");
                        e.write_line(&format!("r.Runstackpos = {starting_stackpos}"));
                    });
                    self.write_line("}");
                }
                self.emit_goto(&original_done);
                self.w.decrease_indent();
                self.write_line("}");
                self.blank_line();
            }
        }

        if is_atomic {
            self.done_label = original_done;
            self.mark_label(&end_loop);

            // Backtracking goes around an atomic loop, so the stack can't be
            // left holding state from successful iterations.
            if !starting_stackpos.is_empty() {
                self.write_line(&format!(
                    "r.Runstackpos = {starting_stackpos} // Ensure any remaining backtracking state is removed."
                ));
            }
        } else {
            if child_backtracks {
                self.emit_goto(&end_loop);
                self.blank_line();

                let backtrack = self.reserve_name("LoopBacktrack");
                self.mark_label(&backtrack);
                self.emit_timeout_check_if_needed();
                self.write_line(&format!("if {iteration_count} == 0 {{"));
                self.indented(|e| {
                    e.write_line("// No iterations of the loop remain to backtrack into. Fail the loop.");
                });
                self.w.increase_indent();
                self.emit_goto(&original_done);
                self.w.decrease_indent();
                self.write_line("}");
                let into_child = self.done_label.clone();
                self.emit_goto(&into_child);
                self.done_label = backtrack;
            }

            let is_in_loop = self.analysis.is_in_loop(idx);
            self.mark_label(&end_loop);

            // When this loop is itself inside a loop, each outer iteration
            // needs its own copy of this loop's locals, so they go on the
            // stack with a dedicated section to restore them.
            if is_in_loop {
                self.blank_line();
                match (!starting_pos.is_empty(), !starting_stackpos.is_empty()) {
                    (true, true) => {
                        self.emit_stack_push(&[&starting_pos, &starting_stackpos, &iteration_count])
                    }
                    (true, false) => self.emit_stack_push(&[&starting_pos, &iteration_count]),
                    (false, true) => self.emit_stack_push(&[&starting_stackpos, &iteration_count]),
                    (false, false) => self.emit_stack_push(&[&iteration_count]),
                }

                let skip_backtrack = self.reserve_name("LoopSkipBacktrack");
                self.emit_goto(&skip_backtrack);
                self.blank_line();

                let backtrack = self.reserve_name("LoopBacktrack");
                self.mark_label(&backtrack);
                match (!starting_pos.is_empty(), !starting_stackpos.is_empty()) {
                    (true, true) => {
                        self.emit_stack_pop(&[&iteration_count, &starting_stackpos, &starting_pos])
                    }
                    (true, false) => self.emit_stack_pop(&[&iteration_count, &starting_pos]),
                    (false, true) => self.emit_stack_pop(&[&iteration_count, &starting_stackpos]),
                    (false, false) => self.emit_stack_pop(&[&iteration_count]),
                }
                self.emit_timeout_check_if_needed();
                let prior = self.done_label.clone();
                self.emit_goto(&prior);
                self.blank_line();

                self.done_label = backtrack;
                self.mark_label(&skip_backtrack);
            }
        }
        Ok(())
    }

    /// The general lazy loop: match the minimum eagerly, then grow one
    /// iteration at a time as backtracking demands.
    pub(crate) fn emit_lazy(&mut self, idx: NodeIndex) -> Result<(), EmitError> {
        let node = &self.tree.arena[idx];
        let child_idx = node.children[0];
        let min_iterations = node.m;
        let max_iterations = node.n;

        if min_iterations == max_iterations || self.analysis.is_atomic_by_ancestor(idx) {
            // A fixed-count lazy loop is indistinguishable from a greedy
            // one, and an atomic lazy loop never matches more than its
            // minimum.
            return self.emit_loop_bounded(idx, min_iterations, min_iterations);
        }

        self.transfer_slice_static_pos_to_pos(false);

        let original_done = self.done_label.clone();
        let body = self.reserve_name("LazyLoopBody");
        let end_loop = self.reserve_name("LazyLoopEnd");
        let backtrack = self.reserve_name("LazyLoopBacktrack");
        let iteration_count = self.reserve_name("lazyloop_iteration");
        let iteration_may_be_empty = self.tree.arena.compute_min_length(child_idx) == 0;
        let is_in_loop = self.analysis.is_in_loop(idx);

        let (starting_pos, saw_empty) = if iteration_may_be_empty {
            let sp = self.reserve_name("lazyloop_starting_pos");
            let se = self.reserve_name("lazyloop_empty_seen");
            self.add_local_dec(format!("var {sp}, {se} = 0, 0"));
            (sp, se)
        } else {
            (String::new(), String::new())
        };
        self.add_local_dec(format!("{iteration_count} := 0"));
        self.write_line(&format!("{iteration_count} = 0"));
        if iteration_may_be_empty {
            self.write_line(&format!("{saw_empty} = 0"));
        }

        if min_iterations == 0 {
            self.write_line("// The lazy loop prefers as few iterations as possible; start with none.");
            self.emit_goto(&end_loop);
        }
        self.blank_line();

        self.mark_label(&body);
        match (self.expression_has_captures, iteration_may_be_empty) {
            (true, true) => self.emit_stack_push(&["r.Crawlpos()", &starting_pos, "pos"]),
            (true, false) => self.emit_stack_push(&["r.Crawlpos()", "pos"]),
            (false, true) => self.emit_stack_push(&[&starting_pos, "pos"]),
            (false, false) => self.emit_stack_push(&["pos"]),
        }
        if iteration_may_be_empty {
            self.write_line(&format!("{starting_pos} = pos"));
        }
        self.write_line(&format!("{iteration_count}++"));
        self.blank_line();

        let iteration_failed = self.reserve_name("LazyLoopIterationNoMatch");
        self.done_label = iteration_failed.clone();

        self.emit_node(child_idx, None, true)?;
        self.blank_line();
        self.transfer_slice_static_pos_to_pos(false);
        let child_backtracks = self.done_label != iteration_failed;
        let into_child = self.done_label.clone();

        if iteration_may_be_empty {
            self.write_line(&format!("if pos == {starting_pos} {{"));
            self.indented(|e| e.write_line(&format!("{saw_empty} = 1")));
            self.write_line("}");
        }
        if min_iterations > 0 {
            self.write_line(&format!(
                "// Keep iterating until the lower bound of {min_iterations} is satisfied."
            ));
            self.emit_goto_block(
                &format!(
                    "if {} {{",
                    count_is_less_than(&iteration_count, min_iterations)
                ),
                &body,
            );
        }
        self.emit_goto(&end_loop);
        self.blank_line();

        self.write_line("// The loop iteration failed. Put state back to the way it was before the iteration.");
        self.mark_label(&iteration_failed);
        self.write_line(&format!("{iteration_count}--"));
        self.write_line(&format!("if {iteration_count} < 0 {{"));
        self.indented(|e| {
            e.write_line("// Unable to match the remainder of the expression after exhausting the loop.");
        });
        self.w.increase_indent();
        self.emit_goto(&original_done);
        self.w.decrease_indent();
        self.write_line("}");
        if iteration_may_be_empty {
            self.emit_stack_pop(&["pos", &starting_pos]);
        } else {
            self.emit_stack_pop(&["pos"]);
        }
        if self.expression_has_captures {
            self.emit_uncapture_until("r.StackPop()");
        }
        self.slice_input_span(false);
        if child_backtracks {
            // A previous iteration may still be able to match differently.
            self.emit_goto_block(&format!("if {iteration_count} == 0 {{"), &original_done);
            self.emit_goto(&into_child);
        } else {
            self.emit_goto(&original_done);
        }
        self.blank_line();

        // Backtracking into the lazy loop from subsequent code: run one more
        // iteration, unless the loop is already as long as it may get or the
        // last iteration didn't advance.
        self.mark_label(&backtrack);
        if is_in_loop {
            if iteration_may_be_empty {
                self.emit_stack_pop(&[&iteration_count, &saw_empty, &starting_pos]);
            } else {
                self.emit_stack_pop(&[&iteration_count]);
            }
        }
        self.emit_timeout_check_if_needed();
        if iteration_may_be_empty {
            let refuse = if child_backtracks {
                into_child.clone()
            } else {
                original_done.clone()
            };
            self.emit_goto_block(&format!("if {saw_empty} != 0 {{"), &refuse);
        }
        if max_iterations != INFINITE {
            let refuse = if child_backtracks {
                into_child.clone()
            } else {
                original_done.clone()
            };
            self.emit_goto_block(
                &format!("if {} {{", count_is_at_least(&iteration_count, max_iterations)),
                &refuse,
            );
        }
        self.write_line("// Match one more iteration.");
        self.emit_goto(&body);
        self.blank_line();

        self.mark_label(&end_loop);
        if is_in_loop {
            if iteration_may_be_empty {
                self.emit_stack_push(&[&starting_pos, &saw_empty, &iteration_count]);
            } else {
                self.emit_stack_push(&[&iteration_count]);
            }
        }
        self.done_label = backtrack;
        Ok(())
    }
}
