//! Plan-building helpers for tests (spec §4A.4), generalized from the
//! teacher's `cascades::test_utils` left-deep join-chain generator off
//! `LogicalPlanBuilder`/`SessionContext` onto a direct [`PlanNode`]
//! constructor, since this crate has no execution engine to register
//! tables against.
//!
//! Exported under `#[cfg(any(test, feature = "test-support"))]` so
//! integration tests in `tests/` can build fixtures without duplicating
//! this scaffolding.

use crate::plan::attrs::{
    JoinAttrs, JoinType, PlanNodeAttrs, TableScanAttrs,
};
use crate::plan::node::{PlanNode, PlanNodeIdAllocator};
use crate::symbol::SymbolId;

/// A single-column table scan over `table_name`, whose sole output symbol is
/// `symbol`.
pub fn scan(ids: &PlanNodeIdAllocator, table_name: &str, symbol: SymbolId) -> PlanNode {
    PlanNode::leaf(
        ids.fresh(),
        PlanNodeAttrs::TableScan(TableScanAttrs {
            table_name: table_name.into(),
            output_symbols: vec![symbol],
        }),
    )
    .expect("a single-symbol table scan always builds")
}

/// An inner equi-join of `left` and `right` on `(left_symbol, right_symbol)`,
/// with no residual filter or distribution hint.
pub fn inner_join(
    ids: &PlanNodeIdAllocator,
    left: PlanNode,
    right: PlanNode,
    left_symbol: SymbolId,
    right_symbol: SymbolId,
) -> PlanNode {
    let mut output_symbols = left.output_symbols();
    output_symbols.extend(right.output_symbols());
    PlanNode::new(
        ids.fresh(),
        PlanNodeAttrs::Join(JoinAttrs {
            join_type: JoinType::Inner,
            equi_keys: vec![(left_symbol, right_symbol)],
            filter: None,
            distribution_type: None,
            output_symbols,
        }),
        vec![left, right],
    )
    .expect("a two-child join always builds")
}

/// Builds a left-deep chain of `table_count` single-column table scans,
/// joined pairwise on adjacent symbols: `scan(0) JOIN scan(1) JOIN scan(2)
/// ...`. Mirrors the teacher's `generate_logical_plan` table-count
/// parameterization, minus the `RecordBatch`/`SessionContext` registration
/// this crate has no use for.
pub fn left_deep_join_chain(ids: &PlanNodeIdAllocator, table_count: usize) -> PlanNode {
    assert!(table_count >= 1, "a join chain needs at least one table");
    let mut plan = scan(ids, "t0", SymbolId(0));
    for i in 1..table_count {
        let next = scan(ids, &format!("t{i}"), SymbolId(i as u32));
        plan = inner_join(ids, plan, next, SymbolId((i - 1) as u32), SymbolId(i as u32));
    }
    plan
}
