//! Character and string matching: single characters, literal strings,
//! fixed repeaters, non-backtracking single-character loops, and the
//! concatenation walk that fuses their length checks.

use rxgen_syntax::{INFINITE, MAX_UNROLL_SIZE, NodeIndex, NodeKind, RegexNode};

use super::{EmitError, Emitter, SET_CHARS_SIZE, count_is_less_than, sum};
use crate::describe::describe_node;
use crate::literals::{rune_literal, rune_literal_list, rune_slice_literal, string_literal};

/// Placeholder for the span an IndexOf template searches, filled in by the
/// caller once the search shape is known.
const SPAN_PLACEHOLDER: &str = "{span}";

impl Emitter<'_> {
    // =========================================================================
    // Concatenation
    // =========================================================================

    /// Emits each child in order, starting at `start`. Runs of fixed-length
    /// children get one shared length check, with each child contributing
    /// only its body condition to a single OR-chained conditional.
    pub(crate) fn emit_concatenation(
        &mut self,
        idx: NodeIndex,
        subsequent: Option<NodeIndex>,
        emit_length_checks: bool,
        start: usize,
    ) -> Result<(), EmitError> {
        let node = &self.tree.arena[idx];
        let rtl = node.is_right_to_left();
        let count = node.children.len();

        let mut i = start;
        while i < count {
            if !rtl
                && emit_length_checks
                && let Some((required, exclusive_end)) = self
                    .tree
                    .arena
                    .try_get_joinable_length_check_child_range(idx, i)
            {
                self.emit_joined_run(idx, i, exclusive_end, required, subsequent)?;
                i = exclusive_end;
                continue;
            }

            let sub = self.subsequent_or_default(i, idx, subsequent);
            self.emit_node(node.children[i], sub, emit_length_checks)?;
            if i < count - 1 {
                self.blank_line();
            }
            i += 1;
        }
        Ok(())
    }

    /// Emits children `[start, exclusive_end)` of a concatenation under one
    /// length check covering `required` characters.
    fn emit_joined_run(
        &mut self,
        concat: NodeIndex,
        start: usize,
        exclusive_end: usize,
        required: usize,
        subsequent: Option<NodeIndex>,
    ) -> Result<(), EmitError> {
        let node = &self.tree.arena[concat];
        let count = node.children.len();
        let mut first_group = true;
        let mut i = start;

        while i < exclusive_end {
            let mut clauses: Vec<(String, Option<String>)> = Vec::new();
            if first_group {
                clauses.push((self.span_length_check(required, None), None));
            }

            // Fold as many children as possible into the one conditional.
            while i < exclusive_end {
                if let Some((consumed, text)) = self
                    .tree
                    .arena
                    .try_get_ordinal_case_insensitive_string(concat, i, exclusive_end)
                {
                    let span = self.slice_at_static_pos();
                    clauses.push((
                        format!(
                            "!helpers.StartsWithIgnoreCase({span}, {})",
                            rune_slice_literal(&text)
                        ),
                        Some(format!(
                            "Match the string {} (ordinal case-insensitive)",
                            string_literal(&text)
                        )),
                    ));
                    self.slice_static_pos += text.chars().count();
                    i += consumed;
                    continue;
                }

                let child_idx = node.children[i];
                let child = &self.tree.arena[child_idx];
                match child.kind {
                    NodeKind::Multi => {
                        let str = child.str.clone().unwrap_or_default();
                        let description = describe_node(self.tree, self.analysis, child_idx);
                        let clause = self.multi_clause(&str);
                        clauses.push((clause, Some(description)));
                        i += 1;
                    }
                    _ if (child.is_one_family()
                        || child.is_notone_family()
                        || child.is_set_family())
                        && child.m == child.n
                        && child.m <= MAX_UNROLL_SIZE =>
                    {
                        let repeat = match child.kind {
                            NodeKind::One | NodeKind::Notone | NodeKind::Set => 1,
                            _ => child.m as usize,
                        };
                        for x in 0..repeat {
                            let description = (x == 0)
                                .then(|| describe_node(self.tree, self.analysis, child_idx));
                            let clause = self.single_char_clause(child, None);
                            clauses.push((clause, description));
                        }
                        i += 1;
                    }
                    _ => break,
                }
            }

            if !clauses.is_empty() {
                self.emit_fail_clause_chain(&clauses);
                if i < count {
                    self.blank_line();
                }
            }

            // A fixed-length child too large to unroll still sits inside the
            // shared length check; it just keeps its own emission.
            if i < exclusive_end {
                let sub = self.subsequent_or_default(i, concat, subsequent);
                self.emit_node(node.children[i], sub, false)?;
                if i < count - 1 {
                    self.blank_line();
                }
                i += 1;
            }

            first_group = false;
        }
        Ok(())
    }

    // =========================================================================
    // Single characters and strings
    // =========================================================================

    /// A condition that's true when `expr` fails to match this node's
    /// character or class.
    pub(crate) fn single_char_fail_condition(&self, node: &RegexNode, expr: &str) -> String {
        if let Some(set) = &node.set {
            self.emit_match_character_class(set, true, expr)
        } else {
            let ch = rune_literal(node.ch.unwrap_or('\0'));
            if node.is_notone_family() {
                format!("{expr} == {ch}")
            } else {
                format!("{expr} != {ch}")
            }
        }
    }

    /// A condition that's true when `expr` matches this node's character or
    /// class.
    pub(crate) fn single_char_match_condition(&self, node: &RegexNode, expr: &str) -> String {
        if let Some(set) = &node.set {
            self.emit_match_character_class(set, false, expr)
        } else {
            let ch = rune_literal(node.ch.unwrap_or('\0'));
            if node.is_notone_family() {
                format!("{expr} != {ch}")
            } else {
                format!("{expr} == {ch}")
            }
        }
    }

    /// Fail-condition over the next static slice position, consuming it.
    pub(crate) fn single_char_clause(&mut self, node: &RegexNode, offset: Option<&str>) -> String {
        let expr = format!(
            "{}[{}]",
            self.slice_span,
            sum(self.slice_static_pos, offset)
        );
        let clause = self.single_char_fail_condition(node, &expr);
        self.slice_static_pos += 1;
        clause
    }

    /// Emits a single-character match, including the length guard when
    /// requested, and advances the static position (or `pos`, right-to-left).
    pub(crate) fn emit_single_char(
        &mut self,
        node: &RegexNode,
        emit_length_check: bool,
        offset: Option<&str>,
    ) {
        if node.is_right_to_left() {
            let cond = self.single_char_fail_condition(node, "r.Runtext[pos-1]");
            let cond = if emit_length_check {
                format!("pos == 0 || {cond}")
            } else {
                cond
            };
            self.emit_fail_if(&cond);
            self.write_line("pos--");
            return;
        }

        let length_check = emit_length_check.then(|| self.span_length_check(1, offset));
        let clause = self.single_char_clause(node, offset);
        let cond = match length_check {
            Some(check) => format!("{check} || {clause}"),
            None => clause,
        };
        self.emit_fail_if(&cond);
    }

    /// `StartsWith` clause for a literal string, consuming its length.
    pub(crate) fn multi_clause(&mut self, str: &str) -> String {
        let span = self.slice_at_static_pos();
        let clause = format!("!helpers.StartsWith({span}, {})", rune_slice_literal(str));
        self.slice_static_pos += str.chars().count();
        clause
    }

    /// Emits a literal string match. The left-to-right case is one
    /// conditional; right-to-left walks the string backwards explicitly.
    pub(crate) fn emit_multi_char_string(&mut self, str: &str, right_to_left: bool) {
        if right_to_left {
            let len = str.chars().count();
            self.emit_fail_if(&format!("pos < {len}"));
            self.blank_line();

            let i = self.reserve_name("i");
            self.write_line(&format!("for {i} := 0; {i} < {len}; {i}++ {{"));
            self.w.increase_indent();
            self.write_line("pos--");
            self.emit_fail_if(&format!(
                "r.Runtext[pos] != {}[{}-{i}]",
                rune_slice_literal(str),
                len - 1
            ));
            self.w.decrease_indent();
            self.write_line("}");
            return;
        }

        let clause = self.multi_clause(str);
        self.emit_fail_if(&clause);
    }

    // =========================================================================
    // Fixed repeaters and atomic single-character loops
    // =========================================================================

    /// Emits a single-character repetition with `m == n`: unrolled into one
    /// chained conditional when small, a bounded scan loop otherwise.
    pub(crate) fn emit_single_char_repeater(&mut self, node: &RegexNode, emit_length_check: bool) {
        let reps = node.m;
        if reps == 0 {
            return;
        }

        if node.is_right_to_left() {
            self.transfer_slice_static_pos_to_pos(false);
            self.emit_fail_if(&format!("pos < {reps}"));
            let i = self.reserve_name("i");
            self.write_line(&format!("for {i} := 0; {i} < {reps}; {i}++ {{"));
            self.w.increase_indent();
            self.emit_single_char(node, false, None);
            self.w.decrease_indent();
            self.write_line("}");
            return;
        }

        if reps <= MAX_UNROLL_SIZE {
            let mut clauses: Vec<(String, Option<String>)> = Vec::new();
            if emit_length_check {
                clauses.push((self.span_length_check(reps as usize, None), None));
            }
            for _ in 0..reps {
                let clause = self.single_char_clause(node, None);
                clauses.push((clause, None));
            }
            self.emit_fail_clause_chain(&clauses);
            return;
        }

        // Too many characters to unroll; scan the repeated region instead.
        if emit_length_check {
            self.emit_span_length_check(reps as usize, None);
        }
        let i = self.reserve_name("i");
        let from = self.slice_static_pos;
        let to = from + reps as usize;
        self.write_line(&format!("for {i} := {from}; {i} < {to}; {i}++ {{"));
        self.w.increase_indent();
        let cond = self.single_char_fail_condition(node, &format!("{}[{i}]", self.slice_span));
        self.emit_fail_if(&cond);
        self.w.decrease_indent();
        self.write_line("}");
        self.slice_static_pos += reps as usize;
    }

    /// Emits a non-backtracking, variable-length loop around a single
    /// character comparison, preferring a vectorizable search when the
    /// predicate supports one.
    pub(crate) fn emit_single_char_atomic_loop(&mut self, node: &RegexNode) {
        if node.m == node.n {
            self.emit_single_char_repeater(node, true);
            return;
        }
        if node.m == 0 && node.n == 1 {
            self.emit_atomic_single_char_zero_or_one(node);
            return;
        }

        let min_iterations = node.m;
        let max_iterations = node.n;
        let rtl = node.is_right_to_left();
        let iteration = self.reserve_name("iteration");
        let set_is_anything = node.set.as_ref().is_some_and(|set| set.is_anything());

        if rtl {
            self.transfer_slice_static_pos_to_pos(false);

            if set_is_anything && max_iterations == INFINITE {
                // The loop consumes the remainder of the input; no need to
                // walk there one character at a time.
                self.write_line(&format!("{iteration} := pos"));
            } else {
                self.write_line(&format!("{iteration} := 0"));
                let cond = self.single_char_match_condition(
                    node,
                    &format!("r.Runtext[pos-{iteration}-1]"),
                );
                let max_clause = if max_iterations != INFINITE {
                    format!("{} && ", count_is_less_than(&iteration, max_iterations))
                } else {
                    String::new()
                };
                self.write_line(&format!("for {max_clause}pos > {iteration} && {cond} {{"));
                self.indented(|e| e.write_line(&format!("{iteration}++")));
                self.write_line("}");
            }
        } else if set_is_anything && max_iterations == INFINITE {
            // A `.*` under the option that makes dot match everything will
            // consume the rest of the input. Just jump to the end.
            self.transfer_slice_static_pos_to_pos(false);
            self.write_line(&format!("{iteration} := r.Runtextend - pos"));
        } else if let Some((_, template)) = self.try_index_of(node, SPAN_PLACEHOLDER, false, true) {
            // Search for the first character the loop will not consume. A
            // bounded loop only needs to search the bounded prefix.
            self.transfer_slice_static_pos_to_pos(false);

            let span = if max_iterations != INFINITE {
                format!(
                    "{s}[:helpers.Min(len({s}), {max_iterations})]",
                    s = self.slice_span
                )
            } else {
                self.slice_span.to_string()
            };
            let expr = template.replace(SPAN_PLACEHOLDER, &span);
            self.write_line(&format!("{iteration} := {expr}"));

            let all = if max_iterations != INFINITE {
                format!(
                    "helpers.Min(len({s}), {max_iterations})",
                    s = self.slice_span
                )
            } else {
                format!("len({})", self.slice_span)
            };
            self.write_line(&format!("if {iteration} < 0 {{"));
            self.indented(|e| e.write_line(&format!("{iteration} = {all}")));
            self.write_line("}");
        } else {
            // A plain scan loop for everything else.
            if min_iterations != 0 || max_iterations != INFINITE {
                // Zero the static position so one variable can serve as both
                // the iteration count and the indexer.
                self.transfer_slice_static_pos_to_pos(false);
            }
            let start = self.slice_static_pos;
            self.slice_static_pos = 0;
            self.write_line(&format!("{iteration} := {start}"));

            let cond = self
                .single_char_match_condition(node, &format!("{}[{iteration}]", self.slice_span));
            let max_clause = if max_iterations != INFINITE {
                format!("{} && ", count_is_less_than(&iteration, max_iterations))
            } else {
                String::new()
            };
            self.write_line(&format!(
                "for {max_clause}{iteration} < len({}) && {cond} {{",
                self.slice_span
            ));
            self.indented(|e| e.write_line(&format!("{iteration}++")));
            self.write_line("}");
        }

        if min_iterations > 0 {
            let check = count_is_less_than(&iteration, min_iterations);
            self.emit_fail_if(&check);
            self.blank_line();
        }

        // Advance the view and pos by the number of iterations completed.
        if !rtl {
            self.write_line(&format!(
                "{s} = {s}[{iteration}:]",
                s = self.slice_span
            ));
            self.write_line(&format!("pos += {iteration}"));
        } else {
            self.write_line(&format!("pos -= {iteration}"));
        }
    }

    /// Emits a non-backtracking optional single character.
    pub(crate) fn emit_atomic_single_char_zero_or_one(&mut self, node: &RegexNode) {
        let rtl = node.is_right_to_left();
        if rtl {
            self.transfer_slice_static_pos_to_pos(false);
        }

        let expr = if rtl {
            "r.Runtext[pos-1]".to_string()
        } else {
            format!("{}[{}]", self.slice_span, self.slice_static_pos)
        };
        let cond = self.single_char_match_condition(node, &expr);

        let space_available = if rtl {
            "pos > 0".to_string()
        } else if self.slice_static_pos != 0 {
            format!("len({}) > {}", self.slice_span, self.slice_static_pos)
        } else {
            format!("len({}) > 0", self.slice_span)
        };

        self.write_line(&format!("if {space_available} && {cond} {{"));
        self.w.increase_indent();
        if rtl {
            self.write_line("pos--");
        } else {
            // Advancing dynamically keeps every later static index valid.
            self.write_line(&format!("{s} = {s}[1:]", s = self.slice_span));
            self.write_line("pos++");
        }
        self.w.decrease_indent();
        self.write_line("}");
    }

    // =========================================================================
    // IndexOf selection
    // =========================================================================

    /// Picks a search primitive able to find (or, negated, find the first
    /// character outside of) this node's literal. Returns the literal's
    /// length and the call expression with `span` embedded.
    pub(crate) fn try_index_of(
        &self,
        node: &RegexNode,
        span: &str,
        use_last: bool,
        negate: bool,
    ) -> Option<(usize, String)> {
        let last = if use_last { "Last" } else { "" };

        if node.kind == NodeKind::Multi {
            let str = node.str.as_deref().unwrap_or_default();
            return Some((
                str.chars().count(),
                format!("helpers.{last}IndexOf({span}, {})", rune_slice_literal(str)),
            ));
        }

        if node.is_one_family() || node.is_notone_family() {
            let ch = rune_literal(node.ch.unwrap_or('\0'));
            // A negated search for a one is a search for anything-but, and
            // the other way around for a notone.
            let except = node.is_one_family() == negate;
            let helper = if except {
                "IndexOfAnyExcept1"
            } else {
                "IndexOfAny1"
            };
            return Some((1, format!("helpers.{last}{helper}({span}, {ch})")));
        }

        if let Some(set) = &node.set {
            let negated = set.is_negated() != negate;

            // Prefer the range search, except for tiny ranges that the char
            // list search handles better.
            if let Some(ranges) = set.get_if_n_ranges(1)
                && ranges[0].last as u32 - ranges[0].first as u32 > 1
            {
                let helper = if negated {
                    "IndexOfAnyExceptInRange"
                } else {
                    "IndexOfAnyInRange"
                };
                return Some((
                    1,
                    format!(
                        "helpers.{last}{helper}({span}, {}, {})",
                        rune_literal(ranges[0].first),
                        rune_literal(ranges[0].last)
                    ),
                ));
            }

            if let Some(chars) = set.get_set_chars(SET_CHARS_SIZE)
                && !chars.is_empty()
            {
                return Some((1, self.index_of_chars(&chars, negated, last, span)));
            }
        }

        None
    }

    /// A search call over an explicit character list.
    fn index_of_chars(&self, chars: &[char], negated: bool, last: &str, span: &str) -> String {
        if chars.len() == 1 {
            let helper = if negated {
                "IndexOfAnyExcept1"
            } else {
                "IndexOfAny1"
            };
            return format!(
                "helpers.{last}{helper}({span}, {})",
                rune_literal(chars[0])
            );
        }
        let helper = if negated { "IndexOfAnyExcept" } else { "IndexOfAny" };
        format!(
            "helpers.{last}{helper}({span}, []rune{{{}}})",
            rune_literal_list(chars)
        )
    }
}
