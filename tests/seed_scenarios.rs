//! Black-box checks for the six literal seed scenarios of spec §8, driven
//! through the public entry points (`optimize`, `cost::exchange::impute`)
//! rather than the internal rule/cost-wrapper functions already unit-tested
//! alongside their implementations.

use cascade_optimizer::api::optimize;
use cascade_optimizer::cost::exchange::impute;
use cascade_optimizer::cost::LocalCostEstimate;
use cascade_optimizer::metadata::{MetadataProbe, NoMetadata, TableTarget};
use cascade_optimizer::plan::attrs::{
    AggregateAttrs, ExchangeAttrs, FilterAttrs, JoinAttrs, JoinDistributionType, JoinType,
    PlanNodeAttrs, TableWriteAttrs, TypeProvider,
};
use cascade_optimizer::plan::expr::{CompareOp, Expr, Literal};
use cascade_optimizer::plan::node::{PlanNode, PlanNodeIdAllocator};
use cascade_optimizer::session::SessionParameters;
use cascade_optimizer::stats::{Estimate, PlanNodeStatistics, SymbolStatistics};
use cascade_optimizer::symbol::SymbolId;
use cascade_optimizer::test_support::scan;
use std::sync::atomic::AtomicBool;

fn sym(id: u32) -> Expr {
    Expr::symbol(SymbolId(id))
}

fn rand_gt_zero() -> Expr {
    Expr::Compare {
        op: CompareOp::Gt,
        left: Box::new(Expr::Call {
            function: "rand".into(),
            args: vec![],
            deterministic: false,
        }),
        right: Box::new(Expr::Literal(Literal::Int64(0))),
    }
}

fn filter_over_scan(predicate: Expr) -> PlanNode {
    let ids = PlanNodeIdAllocator::default();
    let base = scan(&ids, "t", SymbolId(0));
    PlanNode::new(
        ids.fresh(),
        PlanNodeAttrs::Filter(FilterAttrs { predicate }),
        vec![base],
    )
    .unwrap()
}

fn optimized_predicate(plan: &PlanNode) -> Expr {
    let session = SessionParameters::default();
    let types = TypeProvider::new();
    let cancel = AtomicBool::new(false);
    let outcome = optimize(plan, &session, &types, &NoMetadata, &cancel).unwrap();
    let PlanNodeAttrs::Filter(out) = &outcome.plan.attrs else {
        panic!("expected a filter at the root");
    };
    out.predicate.clone()
}

#[test]
fn scenario_1_common_predicate_extraction() {
    let (a, b, c) = (sym(0), sym(1), sym(2));
    let input = Expr::or(vec![
        Expr::and(vec![a.clone(), b.clone()]),
        Expr::and(vec![a.clone(), c.clone()]),
    ]);
    let rewritten = optimized_predicate(&filter_over_scan(input));
    assert_eq!(rewritten, Expr::and(vec![a, Expr::or(vec![b, c])]));
}

#[test]
fn scenario_2_distribution_within_budget() {
    let (a, b, c, d) = (sym(0), sym(1), sym(2), sym(3));
    let input = Expr::or(vec![
        Expr::and(vec![a.clone(), b.clone()]),
        Expr::and(vec![c.clone(), d.clone()]),
    ]);
    let rewritten = optimized_predicate(&filter_over_scan(input));
    assert_eq!(
        rewritten,
        Expr::and(vec![
            Expr::or(vec![a.clone(), c.clone()]),
            Expr::or(vec![a, d.clone()]),
            Expr::or(vec![b.clone(), c]),
            Expr::or(vec![b, d]),
        ])
    );
}

#[test]
fn scenario_3_nondeterministic_guard_untouched() {
    let input = Expr::or(vec![
        Expr::and(vec![rand_gt_zero(), sym(0)]),
        Expr::and(vec![rand_gt_zero(), sym(1)]),
    ]);
    let rewritten = optimized_predicate(&filter_over_scan(input.clone()));
    assert_eq!(rewritten, input);
}

fn stats_with_bytes(rows: f64, per_row_bytes: f64, symbol: SymbolId) -> PlanNodeStatistics {
    let mut symbol_stats = ahash::AHashMap::new();
    symbol_stats.insert(
        symbol,
        SymbolStatistics {
            low_value: Estimate::Unknown,
            high_value: Estimate::Unknown,
            distinct_values: Estimate::Unknown,
            null_fraction: Estimate::Unknown,
            average_size_bytes: Estimate::Known(per_row_bytes),
        },
    );
    PlanNodeStatistics {
        row_count: Estimate::Known(rows),
        symbol_stats,
    }
}

#[test]
fn scenario_4_replicated_join_cost_with_exchange_estimate() {
    let probe = stats_with_bytes(1e6, 100.0, SymbolId(0));
    let build = stats_with_bytes(1e4, 80.0, SymbolId(1));
    let mut session = SessionParameters::default();
    session.cost_model.default_source_task_count = 8;

    let attrs = PlanNodeAttrs::Join(JoinAttrs {
        join_type: JoinType::Inner,
        equi_keys: vec![],
        filter: None,
        distribution_type: Some(JoinDistributionType::Replicated),
        output_symbols: vec![],
    });
    let delta = impute(&attrs, LocalCostEstimate::ZERO, &[probe, build], &session);

    assert_eq!(delta.network, Estimate::Known(6.4e6));
    assert_eq!(delta.cpu, Estimate::Known(5.6e6 + 8e5));
    assert_eq!(delta.memory, Estimate::Known(8e5));
}

#[test]
fn scenario_5_aggregation_above_scan_with_exchange_estimate() {
    let input = stats_with_bytes(1.0, 1e7, SymbolId(0));
    let session = SessionParameters::default();
    let attrs = PlanNodeAttrs::Aggregate(AggregateAttrs {
        grouping_set: vec![],
        aggregations: vec![],
    });
    let delta = impute(&attrs, LocalCostEstimate::ZERO, &[input], &session);
    assert_eq!(delta.cpu, Estimate::Known(2e7));
    assert_eq!(delta.network, Estimate::Known(1e7));
}

/// Supports physical written-bytes reporting but not multiple writers per
/// hash partition, the precise precondition seed scenario 6 names.
struct ReportsBytesOnly;

impl MetadataProbe for ReportsBytesOnly {
    fn applies_delete(&self, _table: &str) -> Option<cascade_optimizer::partitioning::PartitioningHandle> {
        None
    }
    fn supports_written_bytes_reporting(&self, _target: TableTarget) -> bool {
        true
    }
    fn supports_multiple_writers_per_partition(&self, _target: TableTarget) -> bool {
        false
    }
}

#[test]
fn scenario_6_scaled_writer_validation_rejection() {
    let ids = PlanNodeIdAllocator::default();
    let base = scan(&ids, "t", SymbolId(0));
    let exchange = PlanNode::new(
        ids.fresh(),
        PlanNodeAttrs::Exchange(ExchangeAttrs {
            partitioning: cascade_optimizer::partitioning::PartitioningHandle::ScaledWriterHash,
            partitioning_keys: vec![SymbolId(0)],
            inputs: vec![vec![SymbolId(0)]],
            outputs: vec![SymbolId(0)],
        }),
        vec![base],
    )
    .unwrap();
    let writer = PlanNode::new(
        ids.fresh(),
        PlanNodeAttrs::TableWrite(TableWriteAttrs {
            target: "T".into(),
            input_symbols: vec![SymbolId(0)],
            output_symbols: vec![SymbolId(0)],
        }),
        vec![exchange],
    )
    .unwrap();

    let session = SessionParameters::default();
    let types = TypeProvider::new();
    let cancel = AtomicBool::new(false);
    let outcome = optimize(&writer, &session, &types, &ReportsBytesOnly, &cancel)
        .expect("ValidationFailure is carried in the outcome, not propagated as Err");

    let error = outcome
        .validation_error
        .expect("scaled-writer target without support must fail C8");
    assert!(error.to_string().contains('T'));
    assert_eq!(outcome.plan, writer, "the previous best (input) plan is returned on rejection");
}
