//! Join-graph extraction (spec §4B), generalized from the teacher's
//! `JoinGraph`/`JoinGraphVisitor` (`join_graph.rs`) off `LogicalPlan` onto
//! this crate's own [`PlanNode`]/[`PlanVisitor`]. Used by rules that reason
//! about multi-way equi-join reordering without re-deriving the join tree
//! shape by hand.

use crate::plan::attrs::{JoinType, PlanNodeAttrs};
use crate::plan::node::PlanNode;
use crate::symbol::SymbolId;

/// A flattened view of a chain of inner equi-joins: every equality key pair
/// across the chain, plus the non-join subtrees ("sources") that feed it.
#[derive(Debug, Default, Clone)]
pub struct JoinGraph<'a> {
    pub equalities: Vec<(SymbolId, SymbolId)>,
    pub sources: Vec<&'a PlanNode>,
}

/// Walks `plan` collecting every `JoinType::Inner` node's equi-keys and the
/// non-join leaves feeding the chain. A left/right/full outer or semi join
/// boundary terminates the chain on that side: its subtree is recorded as an
/// opaque source rather than being descended into for further equalities,
/// since reordering across it would change semantics.
pub fn extract_join_graph(plan: &PlanNode) -> JoinGraph<'_> {
    let mut graph = JoinGraph::default();
    collect(plan, &mut graph);
    graph
}

fn collect<'a>(node: &'a PlanNode, graph: &mut JoinGraph<'a>) {
    match &node.attrs {
        PlanNodeAttrs::Join(join) if join.join_type == JoinType::Inner => {
            graph.equalities.extend(join.equi_keys.iter().copied());
            for child in &node.children {
                collect(child, graph);
            }
        }
        _ => graph.sources.push(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::attrs::{JoinAttrs, PlanNodeAttrs, TableScanAttrs};
    use crate::plan::node::PlanNodeIdAllocator;

    fn scan(ids: &PlanNodeIdAllocator, name: &str, sym: u32) -> PlanNode {
        PlanNode::leaf(
            ids.fresh(),
            PlanNodeAttrs::TableScan(TableScanAttrs {
                table_name: name.into(),
                output_symbols: vec![SymbolId(sym)],
            }),
        )
        .unwrap()
    }

    #[test]
    fn flattens_a_three_way_inner_join_chain() {
        let ids = PlanNodeIdAllocator::default();
        let a = scan(&ids, "a", 0);
        let b = scan(&ids, "b", 1);
        let c = scan(&ids, "c", 2);

        let ab = PlanNode::new(
            ids.fresh(),
            PlanNodeAttrs::Join(JoinAttrs {
                join_type: JoinType::Inner,
                equi_keys: vec![(SymbolId(0), SymbolId(1))],
                filter: None,
                distribution_type: None,
                output_symbols: vec![SymbolId(0), SymbolId(1)],
            }),
            vec![a, b],
        )
        .unwrap();

        let abc = PlanNode::new(
            ids.fresh(),
            PlanNodeAttrs::Join(JoinAttrs {
                join_type: JoinType::Inner,
                equi_keys: vec![(SymbolId(1), SymbolId(2))],
                filter: None,
                distribution_type: None,
                output_symbols: vec![SymbolId(0), SymbolId(1), SymbolId(2)],
            }),
            vec![ab, c],
        )
        .unwrap();

        let graph = extract_join_graph(&abc);
        assert_eq!(
            graph.equalities,
            vec![(SymbolId(1), SymbolId(2)), (SymbolId(0), SymbolId(1))]
        );
        assert_eq!(graph.sources.len(), 3);
    }

    #[test]
    fn an_outer_join_boundary_stays_opaque() {
        let ids = PlanNodeIdAllocator::default();
        let a = scan(&ids, "a", 0);
        let b = scan(&ids, "b", 1);
        let outer = PlanNode::new(
            ids.fresh(),
            PlanNodeAttrs::Join(JoinAttrs {
                join_type: JoinType::Left,
                equi_keys: vec![(SymbolId(0), SymbolId(1))],
                filter: None,
                distribution_type: None,
                output_symbols: vec![SymbolId(0), SymbolId(1)],
            }),
            vec![a, b],
        )
        .unwrap();
        let c = scan(&ids, "c", 2);
        let top = PlanNode::new(
            ids.fresh(),
            PlanNodeAttrs::Join(JoinAttrs {
                join_type: JoinType::Inner,
                equi_keys: vec![(SymbolId(1), SymbolId(2))],
                filter: None,
                distribution_type: None,
                output_symbols: vec![SymbolId(0), SymbolId(1), SymbolId(2)],
            }),
            vec![outer, c],
        )
        .unwrap();

        let graph = extract_join_graph(&top);
        assert_eq!(graph.equalities, vec![(SymbolId(1), SymbolId(2))]);
        assert_eq!(graph.sources.len(), 2);
    }
}
