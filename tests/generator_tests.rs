//! End-to-end tests through the facade, including the JSON interchange the
//! CLI consumes.

use rxgen::GeneratorInput;
use rxgen::cli::{self, CliArgs};
use rxgen::emitter::EmitOptions;
use rxgen::syntax::{NodeArena, NodeIndex, RegexTree};

fn sample_tree() -> RegexTree {
    // a(b|c)d
    let mut arena = NodeArena::new();
    let a = arena.one('a', 0);
    let b = arena.one('b', 0);
    let c = arena.one('c', 0);
    let alt = arena.alternate(vec![b, c], 0);
    let cap = arena.capture(1, alt, 0);
    let d = arena.one('d', 0);
    let concat = arena.concat(vec![a, cap, d], 0);
    RegexTree::new(arena, concat, 0, 2)
}

fn tree_of(build: impl FnOnce(&mut NodeArena) -> NodeIndex) -> RegexTree {
    let mut arena = NodeArena::new();
    let pattern = build(&mut arena);
    RegexTree::new(arena, pattern, 0, 1)
}

#[test]
fn generates_through_the_facade() {
    let tree = sample_tree();
    let out = rxgen::generate("Sample", &tree, EmitOptions::default())
        .expect("generation should succeed");
    assert!(out.starts_with("func (Sample_Engine) Execute(r *regexp2.Runner) error {"));
    assert!(out.contains("r.Capture(1, capture_starting_pos, pos)"));
    assert!(out.contains("r.Capture(0, matchStart, pos)"));
}

#[test]
fn generation_is_deterministic() {
    let tree = sample_tree();
    let first = rxgen::generate("Sample", &tree, EmitOptions::default()).unwrap();
    let second = rxgen::generate("Sample", &tree, EmitOptions::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn json_round_trip_preserves_the_generated_output() {
    let tree = sample_tree();
    let direct = rxgen::generate("Sample", &tree, EmitOptions::default()).unwrap();

    let input = GeneratorInput {
        name: "Sample".to_string(),
        timeout_checks: false,
        tree,
    };
    let json = serde_json::to_string(&input).expect("input should serialize");
    let parsed: GeneratorInput = serde_json::from_str(&json).expect("input should parse");
    let round_tripped =
        rxgen::generate(&parsed.name, &parsed.tree, EmitOptions::default()).unwrap();
    assert_eq!(direct, round_tripped);
}

#[test]
fn find_optimizations_are_computed_when_missing() {
    use rxgen::syntax::{CharClass, FindMode, INFINITE};

    let mut tree = tree_of(|a| {
        let class = CharClass::from_range('a', 'z').negated();
        let star = a.set_loop(class, 0, INFINITE, 0);
        let lit = a.multi("end", 0);
        a.concat(vec![star, lit], 0)
    });
    assert_eq!(tree.find.mode, FindMode::None);
    let out = rxgen::generate_with_find_optimizations("Skip", &mut tree, EmitOptions::default())
        .unwrap();
    assert_eq!(tree.find.mode, FindMode::LiteralAfterLoop);
    assert!(out.contains("pos = r.Runtrackpos"), "{out}");
}

#[test]
fn cli_driver_writes_the_output_file() {
    let dir = std::env::temp_dir();
    let input_path = dir.join(format!("rxgen-request-{}.json", std::process::id()));
    let out_path = dir.join(format!("rxgen-out-{}.go", std::process::id()));

    let input = GeneratorInput {
        name: "FromCli".to_string(),
        timeout_checks: true,
        tree: sample_tree(),
    };
    std::fs::write(&input_path, serde_json::to_string(&input).unwrap()).unwrap();

    let args = CliArgs {
        input: input_path.clone(),
        name: None,
        out: Some(out_path.clone()),
        timeout_checks: false,
        trace: false,
    };
    cli::run(args).expect("driver should succeed");

    let written = std::fs::read_to_string(&out_path).unwrap();
    assert!(written.starts_with("func (FromCli_Engine) Execute"));

    let _ = std::fs::remove_file(&input_path);
    let _ = std::fs::remove_file(&out_path);
}
