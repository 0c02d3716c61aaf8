//! Dependency checks on a kernel with local barriers
//!
//! The kernel is loaded from a JSON description with a text linearization,
//! the way the CLI reads it. Dependencies target the pair `1 -> i0`:
//! statement `1` runs once per lane before the `i` loop, `i0` runs at the
//! top of every `i` iteration, and the only local barrier between them is
//! `ib0` at the end of each iteration.

use isl_rs::Context;
use linchk::{
    check_dependencies, CheckerConfig, CheckerError, ConcurrencyScope, DependencyCheck,
    KernelDescription, SioComposer, StatementDependency,
};
use std::io::Write;

// ============================================================================
// Fixture
// ============================================================================

const BARRIER_KERNEL_JSON: &str = r#"{
    "name": "lbarrier_nest",
    "domains": {
        "0":   "[p2] -> { [l0, l1, g0] : 0 <= l0, l1, g0 < p2 }",
        "b0":  "[p2] -> { [l0, l1, g0] : 0 <= l0, l1, g0 < p2 }",
        "1":   "[p2] -> { [l0, l1, g0] : 0 <= l0, l1, g0 < p2 }",
        "2":   "[p2] -> { [l0, l1, g0] : 0 <= l0, l1, g0 < p2 }",
        "i0":  "[p1, p2] -> { [i, j, l0, l1, g0] : 0 <= i, j < p1 and 0 <= l0, l1, g0 < p2 }",
        "ib0": "[p1, p2] -> { [i, j, l0, l1, g0] : 0 <= i, j < p1 and 0 <= l0, l1, g0 < p2 }",
        "i1":  "[p1, p2] -> { [i, j, l0, l1, g0] : 0 <= i, j < p1 and 0 <= l0, l1, g0 < p2 }",
        "i2":  "[p1, p2] -> { [i, j, l0, l1, g0] : 0 <= i, j < p1 and 0 <= l0, l1, g0 < p2 }",
        "j0":  "[p1, p2] -> { [i, j, l0, l1, g0] : 0 <= i, j < p1 and 0 <= l0, l1, g0 < p2 }",
        "jb0": "[p1, p2] -> { [i, j, l0, l1, g0] : 0 <= i, j < p1 and 0 <= l0, l1, g0 < p2 }",
        "j1":  "[p1, p2] -> { [i, j, l0, l1, g0] : 0 <= i, j < p1 and 0 <= l0, l1, g0 < p2 }"
    },
    "iname_tags": { "l0": ["l.0"], "l1": ["l.1"], "g0": ["g.0"] },
    "linearization": "0\nlbarrier b0\n1\nfor i\n  i0\n  lbarrier ib0\n  i1\n  i2\n  for j\n    j0\n    lbarrier jb0 // end of j body\n    j1\n  end j\nend i\n2\n",
    "dependencies": [
        {
            "before": "1",
            "after": "i0",
            "relation": "[p1, p2] -> { [l0', l1', g0'] -> [i, j, l0, l1, g0] : g0 = g0' and i >= 1 }"
        },
        {
            "before": "1",
            "after": "i0",
            "relation": "[p1, p2] -> { [l0', l1', g0'] -> [i, j, l0, l1, g0] : g0 = g0' and i >= 0 }"
        },
        {
            "before": "1",
            "after": "i0",
            "relation": "[p1, p2] -> { [l0', l1', g0'] -> [i, j, l0, l1, g0] : l0 = l0' and l1 = l1' and g0 = g0' }"
        },
        {
            "before": "1",
            "after": "i0",
            "relation": "[p1, p2] -> { [l0', l1', g0'] -> [i, j, l0, l1, g0] : g0 > g0' and i >= 1 }"
        }
    ]
}"#;

fn check_all(kernel: &KernelDescription, config: &CheckerConfig) -> Vec<DependencyCheck> {
    let ctx = Context::alloc();
    let items = kernel.linearization_items().unwrap();
    let composer = SioComposer::new(&ctx, kernel, &items, config).unwrap();
    check_dependencies(&composer, &ctx, &kernel.dependencies).unwrap()
}

// ============================================================================
// Coverage by scope
// ============================================================================

#[test]
fn test_barrier_separated_dependency_is_covered_locally() {
    let kernel = KernelDescription::from_json_str(BARRIER_KERNEL_JSON).unwrap();
    let checks = check_all(&kernel, &CheckerConfig::default());
    assert_eq!(checks.len(), 4);

    // From the second iteration on, ib0 sits between 1 and i0 for every lane
    assert!(checks[0].satisfied);
    assert_eq!(checks[0].covered_by, vec![ConcurrencyScope::LocalConcurrent]);
}

#[test]
fn test_first_iteration_across_lanes_is_violated() {
    let kernel = KernelDescription::from_json_str(BARRIER_KERNEL_JSON).unwrap();
    let checks = check_all(&kernel, &CheckerConfig::default());

    // In iteration 0 no barrier follows 1, so other lanes may still be running it
    assert!(!checks[1].satisfied);
    assert!(checks[1].covered_by.is_empty());
    assert!(!checks[1].violations.is_empty());
}

#[test]
fn test_same_lane_dependency_is_covered_sequentially() {
    let kernel = KernelDescription::from_json_str(BARRIER_KERNEL_JSON).unwrap();
    let checks = check_all(&kernel, &CheckerConfig::default());

    assert!(checks[2].satisfied);
    assert_eq!(checks[2].covered_by, vec![ConcurrencyScope::Sequential]);
}

#[test]
fn test_cross_group_dependency_needs_global_barrier() {
    let kernel = KernelDescription::from_json_str(BARRIER_KERNEL_JSON).unwrap();
    let checks = check_all(&kernel, &CheckerConfig::default());
    assert!(!checks[3].satisfied);

    // Local barriers never order different groups
    let config = CheckerConfig {
        global_barriers_sync_locally: true,
        ..Default::default()
    };
    let checks = check_all(&kernel, &config);
    assert!(!checks[3].satisfied);
}

#[test]
fn test_uncoalesced_relations_give_same_verdicts() {
    let kernel = KernelDescription::from_json_str(BARRIER_KERNEL_JSON).unwrap();
    let coalesced = check_all(&kernel, &CheckerConfig::default());
    let config = CheckerConfig {
        coalesce: false,
        ..Default::default()
    };
    let raw = check_all(&kernel, &config);
    for (a, b) in coalesced.iter().zip(&raw) {
        assert_eq!(a.satisfied, b.satisfied);
        assert_eq!(a.covered_by, b.covered_by);
    }
}

// ============================================================================
// Loading and reporting
// ============================================================================

#[test]
fn test_kernel_loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(BARRIER_KERNEL_JSON.as_bytes()).unwrap();
    let kernel = KernelDescription::from_file(file.path()).unwrap();
    assert_eq!(kernel.name, "lbarrier_nest");
    assert_eq!(kernel.dependencies.len(), 4);
    // 11 statements plus 2 loops entered and left
    assert_eq!(kernel.linearization_items().unwrap().len(), 15);
}

#[test]
fn test_report_serializes_scopes_by_name() {
    let kernel = KernelDescription::from_json_str(BARRIER_KERNEL_JSON).unwrap();
    let checks = check_all(&kernel, &CheckerConfig::default());
    let json = serde_json::to_value(&checks[0]).unwrap();
    assert_eq!(json["satisfied"], serde_json::json!(true));
    assert_eq!(json["covered_by"], serde_json::json!(["local_concurrent"]));
    assert_eq!(json["dependency"]["after"], serde_json::json!("i0"));
}

#[test]
fn test_dependency_on_unknown_statement() {
    let kernel = KernelDescription::from_json_str(BARRIER_KERNEL_JSON)
        .unwrap()
        .with_dependency(StatementDependency::new(
            "1",
            "k9",
            "[p2] -> { [l0', l1', g0'] -> [l0, l1, g0] }",
        ));
    let ctx = Context::alloc();
    let items = kernel.linearization_items().unwrap();
    let config = CheckerConfig::default();
    let composer = SioComposer::new(&ctx, &kernel, &items, &config).unwrap();
    assert!(matches!(
        check_dependencies(&composer, &ctx, &kernel.dependencies),
        Err(CheckerError::MissingStatement { ref statement_id, .. }) if statement_id == "k9"
    ));
}

#[test]
fn test_malformed_dependency_relation_is_a_parse_error() {
    let kernel = KernelDescription::from_json_str(BARRIER_KERNEL_JSON)
        .unwrap()
        .with_dependency(StatementDependency::new(
            "1",
            "i0",
            "[p1, p2] -> { [l0', l1', g0'] -> [i, j, l0, l1, g0] : i = }",
        ));
    let ctx = Context::alloc();
    let items = kernel.linearization_items().unwrap();
    let config = CheckerConfig::default();
    let composer = SioComposer::new(&ctx, &kernel, &items, &config).unwrap();
    assert!(matches!(
        check_dependencies(&composer, &ctx, &kernel.dependencies),
        Err(CheckerError::IslParse { kind: "map", .. })
    ));
}
