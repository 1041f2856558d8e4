//! The tree-walking emitter.
//!
//! One `Emitter` produces one matching routine from one tree. The walk is a
//! single pass: each node kind has a dedicated `emit_*` method that writes
//! the code for that node, recursing for children. Backtracking is wired up
//! not through a dispatch table but through direct jumps: every match
//! failure in the generated code jumps to `doneLabel`, and any construct
//! that can be backtracked into rewrites `done_label` before returning so
//! that subsequent failures land on its own unwinding code. Before any
//! backtracking construct has been emitted, `done_label` is the routine's
//! final no-match exit.
//!
//! The generated code leans on constant indexes into the current input view
//! wherever possible. For fixed-length constructs we know statically how far
//! into the pattern we are, tracked by `slice_static_pos`. On reaching a
//! variable-length construct the static offset is transferred into `pos`,
//! the view is resliced, and the offset is zeroed.

mod alternation;
mod captures;
mod char_class_emit;
mod chars;
mod lookarounds;
mod loops;

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use rxgen_syntax::{FindMode, NodeIndex, NodeKind, RegexTree, TreeAnalysis, node_options};

use crate::describe::describe_node;
use crate::source_writer::SourceWriter;

/// Most characters a class may enumerate before the emitter stops trying to
/// special-case it. Large enough for common sets like hex digits or the
/// latin alphabet.
pub(crate) const SET_CHARS_SIZE: usize = 64;

/// Placeholder inside an IndexOf template for the bound the caller computes
/// after choosing the search expression.
pub(crate) const END_PLACEHOLDER: &str = "{end}";

/// Knobs that change what the generated routine contains without changing
/// what it matches.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmitOptions {
    /// Emit timeout checks at backtracking reentry points.
    pub timeout_checks: bool,
}

/// The emitter's single fatal condition: a node kind reached a dispatch
/// position that cannot handle it. Always an internal bug, never an input
/// error; no partial output is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitError {
    UnhandledNode { kind: NodeKind },
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitError::UnhandledNode { kind } => {
                write!(f, "unhandled node kind in emission: {kind:?}")
            }
        }
    }
}

impl std::error::Error for EmitError {}

/// State for one emission.
pub struct Emitter<'a> {
    name: String,
    tree: &'a RegexTree,
    analysis: &'a TreeAnalysis,
    opts: EmitOptions,

    /// Body text. The routine header and deferred declarations are spliced
    /// in front of it by `finish`.
    w: SourceWriter,
    /// Declarations discovered mid-emission that must precede the body.
    additional_declarations: Vec<String>,

    /// Name counters. Names start unadorned; reuse gets a numeric suffix.
    used_names: FxHashMap<String, u32>,
    emitted_labels: FxHashSet<String>,
    used_labels: FxHashSet<String>,

    /// Identifier of the current input view in emitted code.
    slice_span: &'static str,
    /// Constant offset into `slice_span` known at the current emission
    /// point. Zeroed whenever `pos` advances.
    slice_static_pos: usize,

    /// Where a match failure jumps right now.
    done_label: String,
    /// The ultimate no-match exit, constant for the emission.
    top_level_done_label: String,

    /// When false, all uncapture boilerplate is suppressed.
    expression_has_captures: bool,
}

impl<'a> Emitter<'a> {
    pub fn new(name: &str, tree: &'a RegexTree, analysis: &'a TreeAnalysis, opts: EmitOptions) -> Self {
        Self {
            name: name.to_string(),
            tree,
            analysis,
            opts,
            w: SourceWriter::with_capacity(4096),
            additional_declarations: Vec::new(),
            used_names: FxHashMap::default(),
            emitted_labels: FxHashSet::default(),
            used_labels: FxHashSet::default(),
            slice_span: "slice",
            slice_static_pos: 0,
            done_label: String::new(),
            top_level_done_label: String::new(),
            expression_has_captures: false,
        }
    }

    /// Emits the routine that attempts a match at the current position.
    pub fn emit(mut self) -> Result<String, EmitError> {
        let tree = self.tree;
        let rtl = tree.options & node_options::RIGHT_TO_LEFT != 0;
        let root_child = tree.root_child();
        let root = &tree.arena[root_child];
        debug!(name = %self.name, root = ?root.kind, "generating matcher routine");

        self.w.increase_indent();

        match root.kind {
            NodeKind::Empty => {
                // Rare in real patterns, but it's what an empty pattern
                // produces: a zero-length capture at the current position.
                self.write_line("// The pattern matches the empty string.");
                self.write_line("var pos = r.Runtextpos");
                self.write_line("r.Capture(0, pos, pos)");
                self.write_line("return nil");
                return Ok(self.finish());
            }
            NodeKind::Nothing => {
                self.write_line("// The pattern never matches.");
                self.write_line("return nil");
                return Ok(self.finish());
            }
            NodeKind::One | NodeKind::Notone | NodeKind::Set | NodeKind::Multi => {
                // The whole expression is a fixed-length atom, so the search
                // for the next possible starting position already did the
                // entire match.
                let jump = if root.kind == NodeKind::Multi {
                    root.str.as_deref().map_or(0, |s| s.chars().count())
                } else {
                    1
                };
                let op = if rtl { "-" } else { "+" };
                self.write_line("// The search for the next possible start found the entire match.");
                self.write_line("var start = r.Runtextpos");
                self.write_line(&format!("var end = r.Runtextpos {op} {jump}"));
                self.write_line("r.Runtextpos = end");
                self.write_line("r.Capture(0, start, end)");
                self.write_line("return nil");
                return Ok(self.finish());
            }
            _ => {}
        }

        self.write_line("pos := r.Runtextpos");
        self.write_line("matchStart := pos");
        self.slice_static_pos = 0;
        self.slice_input_span(true);
        self.blank_line();

        self.done_label = self.reserve_name("NoMatch");
        self.top_level_done_label = self.done_label.clone();
        self.expression_has_captures = self.analysis.may_contain_capture(root_child);

        self.emit_node(root_child, None, true)?;

        self.blank_line();
        self.write_line("// The input matched.");
        if self.slice_static_pos > 0 {
            // A transfer would also reslice, which isn't needed here.
            let advance = self.slice_static_pos as i64;
            self.emit_add_stmt("pos", advance);
            self.slice_static_pos = 0;
        }
        self.write_line("r.Runtextpos = pos");
        self.write_line("r.Capture(0, matchStart, pos)");
        self.write_line("return nil");

        Ok(self.finish())
    }

    /// Composes the final routine: header, deferred declarations, then the
    /// body with never-referenced labels stripped.
    fn finish(self) -> String {
        let Emitter {
            name,
            w,
            additional_declarations,
            emitted_labels,
            used_labels,
            ..
        } = self;

        let mut out = SourceWriter::with_capacity(w.len() + 256);
        out.write(&format!("func ({name}_Engine) Execute(r *regexp2.Runner) error {{"));
        out.write_line();
        out.increase_indent();
        for dec in &additional_declarations {
            out.write(dec);
            out.write_line();
        }
        if !additional_declarations.is_empty() {
            out.write_line();
        }
        out.decrease_indent();

        // Labels nothing jumps to would be rejected by the target compiler,
        // so drop their lines on the way out.
        for line in w.get_output().lines() {
            let trimmed = line.trim();
            if let Some(label) = trimmed.strip_suffix(':')
                && emitted_labels.contains(label)
                && !used_labels.contains(label)
            {
                continue;
            }
            out.write(line);
            out.write_line();
        }

        out.write("}");
        out.write_line();
        out.take_output()
    }

    // =========================================================================
    // Node dispatch
    // =========================================================================

    /// Emits the code for one node. `subsequent` is the next node in
    /// evaluation order, used to prime IndexOf-based skipping in loops.
    pub(crate) fn emit_node(
        &mut self,
        idx: NodeIndex,
        subsequent: Option<NodeIndex>,
        emit_length_checks: bool,
    ) -> Result<(), EmitError> {
        let tree = self.tree;

        // The starting-position search may have already run the pattern's
        // leading loop, storing the loop's end in the runner's track
        // position; all that's left is to pick that up.
        if tree.find.mode == FindMode::LiteralAfterLoop && tree.find.literal_after_loop == Some(idx)
        {
            self.write_line("// Skip loop already matched during the starting-position search.");
            self.write_line("pos = r.Runtrackpos");
            self.slice_input_span(false);
            return Ok(());
        }

        let node = &tree.arena[idx];
        trace!(kind = ?node.kind, slice_static_pos = self.slice_static_pos, "emit node");

        if node.is_right_to_left() {
            // Right-to-left matching doesn't use the static offset, but a
            // previous construct may have left a non-zero one behind.
            self.transfer_slice_static_pos_to_pos(false);
        }

        // Node types that evaporate or only exist for their children don't
        // get a comment of their own.
        match node.kind {
            NodeKind::Empty => return Ok(()),
            NodeKind::Nothing => {
                let done = self.done_label.clone();
                self.emit_goto(&done);
                return Ok(());
            }
            NodeKind::Atomic if !self.analysis.may_backtrack(node.children[0]) => {
                // Nothing to be made atomic.
                return self.emit_node(node.children[0], subsequent, true);
            }
            NodeKind::Concatenate => {
                return self.emit_concatenation(idx, subsequent, emit_length_checks, 0);
            }
            _ => {}
        }

        let description = describe_node(tree, self.analysis, idx);
        self.write_line(&format!("// {description}"));

        match node.kind {
            NodeKind::Beginning
            | NodeKind::Start
            | NodeKind::Bol
            | NodeKind::Eol
            | NodeKind::End
            | NodeKind::EndZ => {
                self.emit_anchors(idx);
                Ok(())
            }

            NodeKind::Boundary
            | NodeKind::NonBoundary
            | NodeKind::EcmaBoundary
            | NodeKind::NonEcmaBoundary => {
                self.emit_boundary(idx);
                Ok(())
            }

            NodeKind::One | NodeKind::Notone | NodeKind::Set => {
                self.emit_single_char(node, emit_length_checks, None);
                Ok(())
            }

            NodeKind::Multi => {
                let str = node.str.clone().unwrap_or_default();
                self.emit_multi_char_string(&str, node.is_right_to_left());
                Ok(())
            }

            NodeKind::UpdateBumpalong => {
                self.emit_update_bumpalong();
                Ok(())
            }

            NodeKind::Oneloop | NodeKind::Notoneloop | NodeKind::Setloop => {
                self.emit_single_char_loop(idx, subsequent, emit_length_checks)
            }

            NodeKind::Onelazy | NodeKind::Notonelazy | NodeKind::Setlazy => {
                self.emit_single_char_lazy(idx, emit_length_checks)
            }

            NodeKind::Loop => self.emit_loop(idx),
            NodeKind::Lazyloop => self.emit_lazy(idx),

            NodeKind::Alternate => self.emit_alternation(idx),

            NodeKind::Ref => {
                self.emit_backreference(idx);
                Ok(())
            }
            NodeKind::BackRefCond => self.emit_backreference_conditional(idx),
            NodeKind::ExprCond => self.emit_expression_conditional(idx),

            NodeKind::Atomic => self.emit_atomic(idx, subsequent),
            NodeKind::Capture => self.emit_capture(idx, subsequent),

            NodeKind::PosLook => self.emit_positive_lookaround(idx),
            NodeKind::NegLook => self.emit_negative_lookaround(idx),

            kind => Err(EmitError::UnhandledNode { kind }),
        }
    }

    /// The node to treat as following `node.children[index]`, skipping node
    /// types with no semantic impact on what comes next.
    pub(crate) fn subsequent_or_default(
        &self,
        index: usize,
        node_idx: NodeIndex,
        default: Option<NodeIndex>,
    ) -> Option<NodeIndex> {
        let node = &self.tree.arena[node_idx];
        for &next in &node.children[index + 1..] {
            if self.tree.arena[next].kind != NodeKind::UpdateBumpalong {
                return Some(next);
            }
        }
        default
    }

    // =========================================================================
    // Writing helpers
    // =========================================================================

    pub(crate) fn write(&mut self, text: &str) {
        self.w.write(text);
    }

    pub(crate) fn write_line(&mut self, text: &str) {
        for part in text.split('\n') {
            self.w.write(part);
            self.w.write_line();
        }
    }

    pub(crate) fn blank_line(&mut self) {
        self.w.write_line();
    }

    pub(crate) fn indented<F: FnOnce(&mut Self)>(&mut self, f: F) {
        self.w.increase_indent();
        f(self);
        self.w.decrease_indent();
    }

    /// Defines a fresh name. Names start unadorned; as soon as there's
    /// repetition they get a numbered suffix.
    pub(crate) fn reserve_name(&mut self, prefix: &str) -> String {
        let count = self.used_names.entry(prefix.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            prefix.to_string()
        } else {
            format!("{prefix}{}", *count)
        }
    }

    pub(crate) fn add_local_dec(&mut self, dec: String) {
        self.additional_declarations.push(dec);
    }

    pub(crate) fn mark_label(&mut self, label: &str) {
        self.emitted_labels.insert(label.to_string());
        self.write_line(&format!("{label}:"));
    }

    /// Whether a jump to `label` exits the routine rather than landing on an
    /// emitted label.
    fn goto_will_exit_match(&self, label: &str) -> bool {
        label == self.top_level_done_label
    }

    /// Emits a jump to `label`. A jump to the top-level done label is the
    /// whole expression failing, so it becomes the no-match epilogue
    /// instead: undo all captures and return.
    pub(crate) fn emit_goto(&mut self, label: &str) {
        if self.goto_will_exit_match(label) {
            if self.expression_has_captures {
                self.emit_uncapture_until("0");
            }
            self.write_line("return nil // The input didn't match.");
        } else {
            self.used_labels.insert(label.to_string());
            self.write_line(&format!("goto {label}"));
        }
    }

    /// `if cond { goto done_label }`
    pub(crate) fn emit_fail_if(&mut self, cond: &str) {
        let done = self.done_label.clone();
        self.emit_goto_block(&format!("if {cond} {{"), &done);
    }

    /// Writes `head`, a jump to `label` in an indented block, and `}`.
    pub(crate) fn emit_goto_block(&mut self, head: &str, label: &str) {
        self.write_line(head);
        self.w.increase_indent();
        self.emit_goto(label);
        self.w.decrease_indent();
        self.write_line("}");
    }

    /// One `if` whose condition is `clauses` joined by short-circuit OR,
    /// with a jump to the failure target as the body.
    pub(crate) fn emit_fail_clause_chain(&mut self, clauses: &[(String, Option<String>)]) {
        self.write("if ");
        for (i, (clause, comment)) in clauses.iter().enumerate() {
            if i > 0 {
                self.write(" ||");
                self.w.write_line();
                self.write("\t");
            }
            self.write(clause);
            if let Some(comment) = comment {
                self.write(&format!(" /* {comment} */"));
            }
        }
        self.write(" {");
        self.w.write_line();
        self.w.increase_indent();
        let done = self.done_label.clone();
        self.emit_goto(&done);
        self.w.decrease_indent();
        self.write_line("}");
    }

    // =========================================================================
    // Runner ABI helpers
    // =========================================================================

    pub(crate) fn emit_stack_push(&mut self, args: &[&str]) {
        match args {
            [a] => self.write_line(&format!("r.StackPush({a})")),
            [a, b] => self.write_line(&format!("r.StackPush2({a}, {b})")),
            [a, b, c] => self.write_line(&format!("r.StackPush3({a}, {b}, {c})")),
            _ => self.write_line(&format!("r.StackPushN({})", args.join(", "))),
        }
    }

    /// Pops into each argument in order; callers list arguments in the
    /// reverse of the order they were pushed.
    pub(crate) fn emit_stack_pop(&mut self, args: &[&str]) {
        for arg in args {
            self.write_line(&format!("{arg} = r.StackPop()"));
        }
    }

    /// Unwinds the capture stack to the crawl position in `capture_pos`.
    pub(crate) fn emit_uncapture_until(&mut self, capture_pos: &str) {
        self.write_line(&format!("r.UncaptureUntil({capture_pos})"));
    }

    pub(crate) fn emit_timeout_check_if_needed(&mut self) {
        if self.opts.timeout_checks {
            self.write_line("if err := r.CheckTimeout(); err != nil {");
            self.indented(|e| e.write_line("return err"));
            self.write_line("}");
        }
    }

    // =========================================================================
    // Position plumbing
    // =========================================================================

    /// Slices the input starting at `pos` into the slice local.
    pub(crate) fn slice_input_span(&mut self, declare: bool) {
        let prefix = if declare { "var " } else { "" };
        self.write_line(&format!("{prefix}{} = r.Runtext[pos:]", self.slice_span));
    }

    /// Adds `slice_static_pos` into `pos`, reslices, and zeroes the static
    /// offset.
    pub(crate) fn transfer_slice_static_pos_to_pos(&mut self, force_slice_reload: bool) {
        if self.slice_static_pos > 0 {
            let advance = self.slice_static_pos as i64;
            self.emit_add_stmt("pos", advance);
            self.slice_static_pos = 0;
            self.slice_input_span(false);
        } else if force_slice_reload {
            self.slice_input_span(false);
        }
    }

    pub(crate) fn emit_add_stmt(&mut self, variable: &str, value: i64) {
        match value {
            0 => {}
            1 => self.write_line(&format!("{variable}++")),
            -1 => self.write_line(&format!("{variable}--")),
            v if v > 0 => self.write_line(&format!("{variable} += {v}")),
            v => self.write_line(&format!("{variable} -= {}", -v)),
        }
    }

    /// The slice expression offset by the current static position.
    pub(crate) fn slice_at_static_pos(&self) -> String {
        if self.slice_static_pos > 0 {
            format!("{}[{}:]", self.slice_span, self.slice_static_pos)
        } else {
            self.slice_span.to_string()
        }
    }

    /// A condition that's true when the slice is too short for
    /// `required_length` more characters at the current static position.
    pub(crate) fn span_length_check(
        &self,
        required_length: usize,
        dynamic_required_length: Option<&str>,
    ) -> String {
        if dynamic_required_length.is_none() && self.slice_static_pos + required_length == 1 {
            format!("len({}) == 0", self.slice_span)
        } else {
            format!(
                "len({}) < {}",
                self.slice_span,
                sum(self.slice_static_pos + required_length, dynamic_required_length)
            )
        }
    }

    pub(crate) fn emit_span_length_check(
        &mut self,
        required_length: usize,
        dynamic_required_length: Option<&str>,
    ) {
        let check = self.span_length_check(required_length, dynamic_required_length);
        self.emit_fail_if(&check);
    }
}

/// The sum of a constant and an optional local, rendered for the target.
pub(crate) fn sum(constant: usize, local: Option<&str>) -> String {
    match local {
        None => constant.to_string(),
        Some(local) if constant == 0 => local.to_string(),
        Some(local) => format!("{constant} + {local}"),
    }
}

/// A comparison for whether the iteration count is below the bound.
pub(crate) fn count_is_less_than(count: &str, exclusive_upper: i32) -> String {
    if exclusive_upper == 1 {
        format!("{count} == 0")
    } else {
        format!("{count} < {exclusive_upper}")
    }
}

/// The negation of `count_is_less_than`.
pub(crate) fn count_is_at_least(count: &str, bound: i32) -> String {
    if bound == 1 {
        format!("{count} != 0")
    } else {
        format!("{count} >= {bound}")
    }
}
