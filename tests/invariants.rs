//! The universal invariants of spec §8, checked through the public API on a
//! multi-table join chain (`cascade_optimizer::test_support::left_deep_join_chain`)
//! with the default rule set, which enables `CommuteJoin` by default.

use cascade_optimizer::api::{optimize, optimize_with_rules};
use cascade_optimizer::metadata::NoMetadata;
use cascade_optimizer::plan::attrs::TypeProvider;
use cascade_optimizer::plan::node::PlanNodeIdAllocator;
use cascade_optimizer::rewrite::rules::join::CommuteJoin;
use cascade_optimizer::rewrite::rules::predicate::ExtractCommonPredicate;
use cascade_optimizer::rewrite::Rule;
use cascade_optimizer::session::SessionParameters;
use cascade_optimizer::test_support::left_deep_join_chain;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;

fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![Box::new(ExtractCommonPredicate), Box::new(CommuteJoin)]
}

fn output_symbol_set(plan: &cascade_optimizer::plan::node::PlanNode) -> BTreeSet<u32> {
    plan.output_symbols().into_iter().map(|s| s.0).collect()
}

#[test]
fn join_chain_with_default_rules_reaches_quiescence_not_iteration_cap() {
    let ids = PlanNodeIdAllocator::default();
    let plan = left_deep_join_chain(&ids, 4);

    let session = SessionParameters::default();
    let types = TypeProvider::new();
    let cancel = AtomicBool::new(false);

    let outcome = optimize(&plan, &session, &types, &NoMetadata, &cancel).unwrap();

    // Before the work-set fix, CommuteJoin's involution kept re-enqueuing
    // every join group forever; this always hit max_iterations (10_000) and
    // reported partial=true for any plan with a join under default config.
    assert!(
        !outcome.partial,
        "the rewrite must drain its work-set to quiescence, not spin to the iteration cap"
    );
    assert!(!outcome.cancelled);
}

#[test]
fn optimize_is_idempotent() {
    let ids = PlanNodeIdAllocator::default();
    let plan = left_deep_join_chain(&ids, 4);

    let session = SessionParameters::default();
    let types = TypeProvider::new();

    let cancel = AtomicBool::new(false);
    let first = optimize_with_rules(&plan, &session, &types, &NoMetadata, &cancel, default_rules(), None)
        .unwrap();
    assert!(!first.partial, "first pass must reach quiescence");

    let cancel = AtomicBool::new(false);
    let second = optimize_with_rules(
        &first.plan,
        &session,
        &types,
        &NoMetadata,
        &cancel,
        default_rules(),
        None,
    )
    .unwrap();

    assert_eq!(
        first.plan, second.plan,
        "re-optimizing an already-optimized plan with the same rules must be a no-op (spec §8 idempotence)"
    );
    assert!(!second.partial);
}

#[test]
fn output_symbols_are_preserved_through_optimization() {
    let ids = PlanNodeIdAllocator::default();
    let plan = left_deep_join_chain(&ids, 5);
    let expected = output_symbol_set(&plan);

    let session = SessionParameters::default();
    let types = TypeProvider::new();
    let cancel = AtomicBool::new(false);
    let outcome = optimize(&plan, &session, &types, &NoMetadata, &cancel).unwrap();

    assert_eq!(output_symbol_set(&outcome.plan), expected);
}

#[test]
fn output_symbols_are_preserved_even_when_the_iteration_cap_is_hit() {
    let ids = PlanNodeIdAllocator::default();
    let plan = left_deep_join_chain(&ids, 5);
    let expected = output_symbol_set(&plan);

    let mut session = SessionParameters::default();
    session.config.max_iterations = 1;
    let types = TypeProvider::new();
    let cancel = AtomicBool::new(false);

    let outcome = optimize_with_rules(&plan, &session, &types, &NoMetadata, &cancel, default_rules(), None)
        .unwrap();

    assert!(outcome.partial, "max_iterations=1 must cut the rewrite short on a multi-join plan");
    assert_eq!(
        output_symbol_set(&outcome.plan),
        expected,
        "a partial rewrite must still preserve the root's output symbols"
    );
}

#[test]
fn cancellation_returns_the_best_so_far_plan_with_preserved_symbols() {
    let ids = PlanNodeIdAllocator::default();
    let plan = left_deep_join_chain(&ids, 4);
    let expected = output_symbol_set(&plan);

    let session = SessionParameters::default();
    let types = TypeProvider::new();
    let cancel = AtomicBool::new(true);

    let outcome = optimize_with_rules(&plan, &session, &types, &NoMetadata, &cancel, default_rules(), None)
        .unwrap();

    assert!(outcome.cancelled);
    assert_eq!(output_symbol_set(&outcome.plan), expected);
}
