//! Shape tests over the generated routine text.

use rxgen_emitter::{EmitOptions, Emitter};
use rxgen_syntax::{
    CharClass, FindMode, FindOptimizations, INFINITE, NodeArena, NodeIndex, RegexTree,
    TreeAnalysis, node_options,
};

fn tree_of(build: impl FnOnce(&mut NodeArena) -> NodeIndex) -> RegexTree {
    let mut arena = NodeArena::new();
    let pattern = build(&mut arena);
    RegexTree::new(arena, pattern, 0, 1)
}

fn emit(tree: &RegexTree) -> String {
    emit_with(tree, EmitOptions::default())
}

fn emit_with(tree: &RegexTree, opts: EmitOptions) -> String {
    let analysis = TreeAnalysis::analyze(tree);
    Emitter::new("Test", tree, &analysis, opts)
        .emit()
        .expect("emission should succeed")
}

// =============================================================================
// Degenerate shortcuts
// =============================================================================

#[test]
fn empty_pattern_is_a_zero_length_capture() {
    let tree = tree_of(|a| a.empty(0));
    let out = emit(&tree);
    assert!(out.contains("r.Capture(0, pos, pos)"), "{out}");
    assert!(out.contains("return nil"));
    assert!(!out.contains("goto"));
    assert!(!out.contains("slice"));
}

#[test]
fn nothing_pattern_is_a_bare_failure_return() {
    let tree = tree_of(|a| a.nothing(0));
    let out = emit(&tree);
    assert!(out.contains("return nil"));
    assert!(!out.contains("Capture"));
}

#[test]
fn fixed_atom_root_relies_on_the_prefilter() {
    let tree = tree_of(|a| a.multi("dog", 0));
    let out = emit(&tree);
    assert!(out.contains("var end = r.Runtextpos + 3"), "{out}");
    assert!(out.contains("r.Capture(0, start, end)"));
    assert!(!out.contains("StartsWith"));
}

#[test]
fn fixed_atom_root_right_to_left_subtracts() {
    let mut arena = NodeArena::new();
    let m = arena.multi("dog", node_options::RIGHT_TO_LEFT);
    let tree = RegexTree::new(arena, m, node_options::RIGHT_TO_LEFT, 1);
    let out = emit(&tree);
    assert!(out.contains("var end = r.Runtextpos - 3"), "{out}");
}

// =============================================================================
// Single characters and strings
// =============================================================================

#[test]
fn sequence_of_fixed_atoms_shares_one_length_check() {
    let tree = tree_of(|a| {
        let x = a.one('x', 0);
        let yz = a.multi("yz", 0);
        a.concat(vec![x, yz], 0)
    });
    let out = emit(&tree);
    assert_eq!(out.matches("len(slice) <").count(), 1, "{out}");
    assert!(out.contains("slice[0] != 'x'"));
    assert!(out.contains("!helpers.StartsWith(slice[1:], []rune(\"yz\"))"));
}

#[test]
fn static_offset_transfers_before_variable_length_code() {
    let tree = tree_of(|a| {
        let ab = a.multi("ab", 0);
        let star = a.one_loop('c', 0, INFINITE, 0);
        let d = a.one('d', 0);
        a.concat(vec![ab, star, d], 0)
    });
    let out = emit(&tree);
    let transfer = out.find("pos += 2").expect("static offset must transfer");
    let reslice = out[transfer..]
        .find("slice = r.Runtext[pos:]")
        .expect("transfer must reslice");
    assert!(reslice < out.len());
}

// =============================================================================
// Unroll bounds
// =============================================================================

#[test]
fn small_fixed_repetition_unrolls_into_one_conditional() {
    let tree = tree_of(|a| a.one_loop('a', 8, 8, 0));
    let out = emit(&tree);
    assert_eq!(out.matches("!= 'a'").count(), 8, "{out}");
    assert!(!out.contains("for "), "unrolled repeater must not loop: {out}");
}

#[test]
fn large_fixed_repetition_uses_a_bounded_loop() {
    let tree = tree_of(|a| a.one_loop('a', 20, 20, 0));
    let out = emit(&tree);
    assert!(out.contains("for i := 0; i < 20; i++ {"), "{out}");
    assert_eq!(out.matches("!= 'a'").count(), 1, "{out}");
}

// =============================================================================
// Loops
// =============================================================================

#[test]
fn backtracking_char_loop_has_an_unwinder_label() {
    let tree = tree_of(|a| {
        let star = a.one_loop('a', 0, INFINITE, 0);
        let b = a.one('b', 0);
        a.concat(vec![star, b], 0)
    });
    let out = emit(&tree);
    assert!(out.contains("CharLoopBacktrack:"), "{out}");
    assert!(out.contains("goto CharLoopEnd"));
    // The subsequent literal primes a backwards search for feasible ends.
    assert!(
        out.contains("helpers.LastIndexOfAny1(r.Runtext[charloop_starting_pos:charloop_ending_pos], 'b')"),
        "{out}"
    );
}

#[test]
fn atomic_char_loop_uses_a_search_primitive() {
    let tree = tree_of(|a| {
        let star = a.one_loop('a', 0, INFINITE, 0);
        let atomic = a.atomic(star, 0);
        let tail = a.one('a', 0);
        a.concat(vec![atomic, tail], 0)
    });
    let out = emit(&tree);
    assert!(out.contains("helpers.IndexOfAnyExcept1(slice, 'a')"), "{out}");
    assert!(out.contains("r.Runstackpos = atomic_stackpos"));
}

#[test]
fn lazy_char_loop_extends_one_character_per_backtrack() {
    let tree = tree_of(|a| {
        let lazy = a.one_lazy('a', 0, INFINITE, 0);
        let b = a.one('b', 0);
        a.concat(vec![lazy, b], 0)
    });
    let out = emit(&tree);
    assert!(out.contains("LazyLoopBacktrack:"), "{out}");
    assert!(out.contains("pos = lazyloop_pos"));
    assert!(out.contains("goto LazyLoopEnd"));
}

#[test]
fn atomic_lazy_loop_matches_only_the_minimum() {
    // With nothing after it to backtrack in, a lazy loop is just its
    // minimum number of iterations.
    let tree = tree_of(|a| {
        let ab = a.multi("ab", 0);
        a.lazy_loop_of(ab, 2, 4, 0)
    });
    let out = emit(&tree);
    assert!(out.contains("loop_iteration < 2"), "{out}");
    assert!(!out.contains("LazyLoopBacktrack"), "{out}");
}

#[test]
fn general_lazy_loop_grows_on_demand() {
    let tree = tree_of(|a| {
        let ab = a.multi("ab", 0);
        let lazy = a.lazy_loop_of(ab, 2, 4, 0);
        let x = a.one('X', 0);
        a.concat(vec![lazy, x], 0)
    });
    let out = emit(&tree);
    assert!(out.contains("LazyLoopBody:"), "{out}");
    assert!(out.contains("LazyLoopBacktrack:"));
    assert!(out.contains("lazyloop_iteration >= 4"), "{out}");
    assert!(out.contains("// Match one more iteration."));
}

#[test]
fn empty_capable_loop_guards_against_spinning() {
    let tree = tree_of(|a| {
        let opt = a.one_loop('a', 0, 1, 0);
        let inner = a.loop_of(opt, 0, INFINITE, 0);
        let b = a.one('b', 0);
        a.concat(vec![inner, b], 0)
    });
    let out = emit(&tree);
    assert!(out.contains("pos != loop_starting_pos"), "{out}");
}

// =============================================================================
// Alternation
// =============================================================================

#[test]
fn disjoint_atomic_alternation_becomes_a_switch() {
    let tree = tree_of(|a| {
        let cat = a.multi("cat", 0);
        let dog = a.multi("dog", 0);
        let fish = a.multi("fish", 0);
        let alt = a.alternate(vec![cat, dog, fish], 0);
        a.atomic(alt, 0)
    });
    let out = emit(&tree);
    assert!(out.contains("switch slice[0] {"), "{out}");
    assert!(out.contains("case 'c':"));
    assert!(out.contains("case 'd':"));
    assert!(out.contains("case 'f':"));
    assert!(out.contains("default:"));
    assert!(!out.contains("AlternationBranch"), "{out}");
}

#[test]
fn overlapping_branches_fall_back_to_general_alternation() {
    let tree = tree_of(|a| {
        let cat = a.multi("cat", 0);
        let car = a.multi("car", 0);
        let alt = a.alternate(vec![cat, car], 0);
        let x = a.one('x', 0);
        a.concat(vec![alt, x], 0)
    });
    let out = emit(&tree);
    assert!(!out.contains("switch slice[0]"), "{out}");
    assert!(out.contains("AlternationBranch:"), "{out}");
    assert!(out.contains("AlternationMatch:"));
    assert!(out.contains("AlternationBacktrack:"));
    assert!(out.contains("case 0:"));
    assert!(out.contains("case 1:"));
}

// =============================================================================
// Captures and backreferences
// =============================================================================

#[test]
fn capture_group_emission_wraps_its_child() {
    // a(b|c)d
    let tree = {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let b = arena.one('b', 0);
        let c = arena.one('c', 0);
        let alt = arena.alternate(vec![b, c], 0);
        let cap = arena.capture(1, alt, 0);
        let d = arena.one('d', 0);
        let concat = arena.concat(vec![a, cap, d], 0);
        RegexTree::new(arena, concat, 0, 2)
    };
    let out = emit(&tree);
    assert!(out.contains("capture_starting_pos = pos"), "{out}");
    assert!(out.contains("r.Capture(1, capture_starting_pos, pos)"));
    // The alternation's branches are disjoint and don't backtrack, so the
    // branch selection is a switch.
    assert!(out.contains("switch slice[0] {"), "{out}");
}

#[test]
fn uncapture_boilerplate_is_suppressed_without_captures() {
    let tree = tree_of(|a| {
        let star = a.one_loop('a', 0, INFINITE, 0);
        let b = a.one('b', 0);
        a.concat(vec![star, b], 0)
    });
    let out = emit(&tree);
    assert!(!out.contains("Uncapture"), "{out}");
    assert!(!out.contains("Crawlpos"), "{out}");
}

#[test]
fn failing_with_captures_unwinds_them() {
    let tree = {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let cap = arena.capture(1, a, 0);
        RegexTree::new(arena, cap, 0, 2)
    };
    let out = emit(&tree);
    assert!(out.contains("r.UncaptureUntil(0)"), "{out}");
}

#[test]
fn backreference_compares_the_previous_match() {
    let tree = {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let cap = arena.capture(1, a, 0);
        let backref = arena.backref(1, 0);
        let concat = arena.concat(vec![cap, backref], 0);
        RegexTree::new(arena, concat, 0, 2)
    };
    let out = emit(&tree);
    assert!(out.contains("if !r.IsMatched(1) {"), "{out}");
    assert!(out.contains("matchLength := r.MatchLength(1)"));
    assert!(out.contains("matchIndex := r.MatchIndex(1)"));
    assert!(out.contains("pos += matchLength"));
}

#[test]
fn backreference_conditional_selects_a_branch() {
    let tree = {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let cap = arena.capture(1, a, 0);
        let yes = arena.multi("yes", 0);
        let no = arena.multi("no", 0);
        let cond = arena.backref_cond(1, yes, Some(no), 0);
        let concat = arena.concat(vec![cap, cond], 0);
        RegexTree::new(arena, concat, 0, 2)
    };
    let out = emit(&tree);
    assert!(out.contains("if !r.IsMatched(1) {"), "{out}");
    assert!(out.contains("ConditionalBackreferenceNotMatched:"));
    assert!(out.contains("ConditionalBackreferenceEnd:"));
}

#[test]
fn expression_conditional_restores_state_around_the_test() {
    let tree = tree_of(|a| {
        let probe = a.multi("ab", 0);
        let yes = a.one('x', 0);
        let no = a.one('y', 0);
        a.expr_cond(probe, yes, Some(no), 0)
    });
    let out = emit(&tree);
    assert!(out.contains("conditionalexpression_stackpos = r.Runstackpos"), "{out}");
    assert!(out.contains("r.Runstackpos = conditionalexpression_stackpos"));
    assert!(out.contains("pos = conditionalexpression_starting_pos"));
    assert!(out.contains("ConditionalExpressionNotMatched:"));
}

// =============================================================================
// Lookarounds and boundaries
// =============================================================================

#[test]
fn positive_lookahead_is_zero_width() {
    let tree = tree_of(|a| {
        let probe = a.multi("abc", 0);
        let look = a.lookaround(true, probe, 0);
        let x = a.one('x', 0);
        a.concat(vec![look, x], 0)
    });
    let out = emit(&tree);
    assert!(out.contains("positivelookahead_starting_pos = pos"), "{out}");
    assert!(out.contains("pos = positivelookahead_starting_pos"));
}

#[test]
fn negative_lookahead_succeeds_when_the_child_fails() {
    let tree = tree_of(|a| {
        let probe = a.one('a', 0);
        let look = a.lookaround(false, probe, 0);
        let x = a.one('x', 0);
        a.concat(vec![look, x], 0)
    });
    let out = emit(&tree);
    assert!(out.contains("goto NegativeLookaroundMatch"), "{out}");
    assert!(out.contains("NegativeLookaroundMatch:"));
    assert!(out.contains("pos = negativelookahead_starting_pos"));
}

#[test]
fn word_boundaries_test_the_current_position() {
    let tree = tree_of(|a| {
        let open = a.anchor(rxgen_syntax::NodeKind::Boundary, 0);
        let word = a.multi("word", 0);
        let close = a.anchor(rxgen_syntax::NodeKind::Boundary, 0);
        a.concat(vec![open, word, close], 0)
    });
    let out = emit(&tree);
    assert!(out.contains("!helpers.IsBoundary(r.Runtext, pos)"), "{out}");
    assert!(out.contains("!helpers.IsBoundary(r.Runtext, pos+4)"), "{out}");
}

#[test]
fn anchors_fail_fast_when_statically_past_the_start() {
    let tree = tree_of(|a| {
        let x = a.one('x', 0);
        let beginning = a.anchor(rxgen_syntax::NodeKind::Beginning, 0);
        a.concat(vec![x, beginning], 0)
    });
    let out = emit(&tree);
    // With a character already statically matched, the anchor cannot hold,
    // so the failure is unconditional rather than a position test.
    assert!(out.contains("return nil // The input didn't match."), "{out}");
    assert!(!out.contains("pos != 0"), "{out}");
}

#[test]
fn multiline_anchors_check_for_newlines() {
    let tree = tree_of(|a| {
        let bol = a.anchor(rxgen_syntax::NodeKind::Bol, node_options::MULTILINE);
        let foo = a.multi("foo", node_options::MULTILINE);
        let eol = a.anchor(rxgen_syntax::NodeKind::Eol, node_options::MULTILINE);
        a.concat(vec![bol, foo, eol], 0)
    });
    let out = emit(&tree);
    assert!(out.contains("pos > 0 && r.Runtext[pos-1] != '\\n'"), "{out}");
    assert!(out.contains("slice[3] != '\\n'"), "{out}");
}

// =============================================================================
// Backtracking state discipline
// =============================================================================

fn stack_value_balance(out: &str) -> (usize, usize) {
    let pushes = out.matches("r.StackPush(").count()
        + 2 * out.matches("r.StackPush2(").count()
        + 3 * out.matches("r.StackPush3(").count();
    let pops = out.matches("r.StackPop()").count();
    (pushes, pops)
}

#[test]
fn nested_loops_balance_their_stack_traffic() {
    let tree = tree_of(|a| {
        let plus = a.one_loop('a', 1, INFINITE, 0);
        let b = a.one('b', 0);
        let inner = a.concat(vec![plus, b], 0);
        a.loop_of(inner, 0, INFINITE, 0)
    });
    let out = emit(&tree);
    let (pushes, pops) = stack_value_balance(&out);
    assert_eq!(pushes, pops, "{out}");
}

#[test]
fn captures_in_loops_balance_their_stack_traffic() {
    let tree = {
        let mut arena = NodeArena::new();
        let a = arena.one('a', 0);
        let cap = arena.capture(1, a, 0);
        let b = arena.one('b', 0);
        let inner = arena.concat(vec![cap, b], 0);
        let looped = arena.loop_of(inner, 0, INFINITE, 0);
        RegexTree::new(arena, looped, 0, 2)
    };
    let out = emit(&tree);
    let (pushes, pops) = stack_value_balance(&out);
    assert_eq!(pushes, pops, "{out}");
}

#[test]
fn every_jump_lands_on_an_emitted_label() {
    let tree = tree_of(|a| {
        let star = a.one_loop('a', 0, INFINITE, 0);
        let b = a.one('b', 0);
        let cd = a.multi("cd", 0);
        let alt = a.alternate(vec![b, cd], 0);
        let plus = a.loop_of(alt, 1, INFINITE, 0);
        let e = a.one('e', 0);
        a.concat(vec![star, plus, e], 0)
    });
    let out = emit(&tree);

    let mut labels = std::collections::HashSet::new();
    let mut targets = std::collections::HashSet::new();
    for line in out.lines() {
        let trimmed = line.trim();
        if let Some(label) = trimmed.strip_suffix(':')
            && !label.contains(' ')
            && !label.starts_with("case")
            && label != "default"
        {
            labels.insert(label.to_string());
        }
        if let Some(target) = trimmed.strip_prefix("goto ") {
            targets.insert(target.to_string());
        }
    }
    for target in &targets {
        assert!(labels.contains(target), "goto {target} has no label:\n{out}");
    }
    // The top-level failure exit is inlined as a return, never a label.
    assert!(!targets.contains("NoMatch"), "{out}");
    assert!(!labels.contains("NoMatch"), "{out}");
}

// =============================================================================
// Prefilter coordination and options
// =============================================================================

#[test]
fn literal_after_loop_skips_the_leading_loop() {
    let mut arena = NodeArena::new();
    let class = CharClass::from_range('a', 'z').negated();
    let star = arena.set_loop(class, 0, INFINITE, 0);
    let lit = arena.multi("end", 0);
    let concat = arena.concat(vec![star, lit], 0);
    let mut tree = RegexTree::new(arena, concat, 0, 1);
    tree.find = FindOptimizations::compute(&tree);
    assert_eq!(tree.find.mode, FindMode::LiteralAfterLoop);

    let out = emit(&tree);
    assert!(out.contains("pos = r.Runtrackpos"), "{out}");
}

#[test]
fn timeout_checks_appear_at_backtracking_reentries() {
    let tree = tree_of(|a| {
        let star = a.one_loop('a', 0, INFINITE, 0);
        let b = a.one('b', 0);
        a.concat(vec![star, b], 0)
    });
    let out = emit_with(
        &tree,
        EmitOptions {
            timeout_checks: true,
        },
    );
    assert!(out.contains("if err := r.CheckTimeout(); err != nil {"), "{out}");
    let without = emit(&tree);
    assert!(!without.contains("CheckTimeout"));
}

#[test]
fn routine_header_names_the_engine() {
    let tree = tree_of(|a| a.multi("hi", 0));
    let analysis = TreeAnalysis::analyze(&tree);
    let out = Emitter::new("Greeting", &tree, &analysis, EmitOptions::default())
        .emit()
        .expect("emission should succeed");
    assert!(out.starts_with("func (Greeting_Engine) Execute(r *regexp2.Runner) error {"));
    assert!(out.trim_end().ends_with('}'));
}
