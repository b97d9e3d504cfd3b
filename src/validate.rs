//! C8: sanity checkers run after each fixpoint (spec §4.8). Each is a
//! visitor producing `Ok` or an [`OptimizerError::ValidationFailure`]
//! describing the offending sub-plan; violations are fatal to the
//! optimization (spec §7).
//!
//! Grounded in the teacher's recursive group-walk in `util.rs`
//! (`get_all_possible_trees`), generalized to a plain tree walk over the
//! extracted [`PlanNode`].

use crate::error::{OptimizerError, Result};
use crate::metadata::MetadataProbe;
use crate::plan::attrs::PlanNodeAttrs;
use crate::plan::node::PlanNode;
use crate::plan::visitor::{accept, PlanVisitor, Recursion};
use crate::symbol::SymbolId;
use ahash::AHashSet;

/// Runs every C8 checker against `plan`. Stops at the first violation
/// (spec §7: validation failures are fatal, not accumulated).
pub fn validate(plan: &PlanNode, metadata: &dyn MetadataProbe) -> Result<()> {
    check_scaled_writers(plan, metadata)?;
    check_symbol_scoping(plan)?;
    Ok(())
}

/// Collects every `PartitioningHandle` at exchanges beneath a table-writer
/// and checks it against the writer target's reported capabilities (spec
/// §4.8). `GroupReference` cannot appear here: [`PlanNode`] has no such
/// variant, so "no group references survive extraction" holds by
/// construction rather than needing a runtime check.
fn check_scaled_writers(plan: &PlanNode, metadata: &dyn MetadataProbe) -> Result<()> {
    struct Checker<'a> {
        metadata: &'a dyn MetadataProbe,
        error: Option<OptimizerError>,
    }

    impl<'a> PlanVisitor for Checker<'a> {
        type Error = std::convert::Infallible;

        fn f_down(&mut self, node: &PlanNode) -> std::result::Result<Recursion, Self::Error> {
            if self.error.is_some() {
                return Ok(Recursion::Stop);
            }
            if let PlanNodeAttrs::TableWrite(write) = &node.attrs {
                if let Some(exchange_attrs) = find_exchange_beneath(node) {
                    let handle = exchange_attrs.partitioning;
                    if handle.is_scale_writer_like() {
                        if !self.metadata.supports_written_bytes_reporting(&write.target) {
                            self.error = Some(OptimizerError::ValidationFailure {
                                node_id: Some(node.id),
                                message: format!(
                                    "target '{}' does not support physical written-bytes reporting, required for scale-writer partitioning",
                                    write.target
                                ),
                            });
                            return Ok(Recursion::Stop);
                        }
                        if handle.is_hash_partitioned()
                            && !self.metadata.supports_multiple_writers_per_partition(&write.target)
                        {
                            self.error = Some(OptimizerError::ValidationFailure {
                                node_id: Some(node.id),
                                message: format!(
                                    "target '{}' does not support multiple writers per partition, required for hashed scale-writer partitioning",
                                    write.target
                                ),
                            });
                            return Ok(Recursion::Stop);
                        }
                    }
                }
            }
            Ok(Recursion::Continue)
        }
    }

    let mut checker = Checker {
        metadata,
        error: None,
    };
    let _ = accept(plan, &mut checker);
    match checker.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn find_exchange_beneath(node: &PlanNode) -> Option<&crate::plan::attrs::ExchangeAttrs> {
    node.children.iter().find_map(|child| match &child.attrs {
        PlanNodeAttrs::Exchange(a) => Some(a),
        _ => find_exchange_beneath(child),
    })
}

/// Every symbol referenced in a node's attributes must be produced by a
/// child or introduced locally (spec §3 invariant 1).
fn check_symbol_scoping(plan: &PlanNode) -> Result<()> {
    struct Checker {
        error: Option<OptimizerError>,
    }

    impl PlanVisitor for Checker {
        type Error = std::convert::Infallible;

        fn f_down(&mut self, node: &PlanNode) -> std::result::Result<Recursion, Self::Error> {
            if self.error.is_some() {
                return Ok(Recursion::Stop);
            }
            let mut in_scope: AHashSet<SymbolId> = AHashSet::new();
            for child in &node.children {
                in_scope.extend(child.output_symbols());
            }
            in_scope.extend(node.attrs.introduced_symbols());

            let mut referenced = Vec::new();
            collect_referenced_symbols(&node.attrs, &mut referenced);
            for sym in referenced {
                if !in_scope.contains(&sym) {
                    self.error = Some(OptimizerError::ValidationFailure {
                        node_id: Some(node.id),
                        message: format!("symbol {sym} referenced at node {} is not in scope", node.id),
                    });
                    return Ok(Recursion::Stop);
                }
            }
            Ok(Recursion::Continue)
        }
    }

    let mut checker = Checker { error: None };
    let _ = accept(plan, &mut checker);
    match checker.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn collect_referenced_symbols(attrs: &PlanNodeAttrs, out: &mut Vec<SymbolId>) {
    use PlanNodeAttrs::*;
    match attrs {
        Filter(a) => a.predicate.referenced_symbols(out),
        Project(a) => a.assignments.iter().for_each(|(_, e)| e.referenced_symbols(out)),
        Aggregate(a) => {
            out.extend(a.grouping_set.iter().copied());
            out.extend(a.aggregations.iter().map(|spec| spec.input));
        }
        Join(a) => {
            for (l, r) in &a.equi_keys {
                out.push(*l);
                out.push(*r);
            }
            if let Some(f) = &a.filter {
                f.referenced_symbols(out);
            }
        }
        SemiJoin(a) => {
            out.push(a.source_join_symbol);
            out.push(a.filtering_source_join_symbol);
        }
        SpatialJoin(a) => a.spatial_predicate.referenced_symbols(out),
        Sort(a) => out.extend(a.order_by.iter().map(|item| item.symbol)),
        TableWrite(a) => out.extend(a.input_symbols.iter().copied()),
        Union(a) => out.extend(a.inputs_symbol_mapping.iter().flatten().copied()),
        Exchange(a) => out.extend(a.inputs.iter().flatten().copied()),
        TableScan(_) | TableFunction(_) | Values(_) | Limit(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::NoMetadata;
    use crate::plan::attrs::{
        ExchangeAttrs, PlanNodeAttrs, TableScanAttrs, TableWriteAttrs,
    };
    use crate::plan::node::PlanNodeIdAllocator;
    use crate::partitioning::PartitioningHandle;

    #[test]
    fn scaled_writer_without_support_is_validation_failure() {
        let ids = PlanNodeIdAllocator::default();
        let scan = PlanNode::leaf(
            ids.fresh(),
            PlanNodeAttrs::TableScan(TableScanAttrs {
                table_name: "t".into(),
                output_symbols: vec![SymbolId(0)],
            }),
        )
        .unwrap();
        let exchange = PlanNode::new(
            ids.fresh(),
            PlanNodeAttrs::Exchange(ExchangeAttrs {
                partitioning: PartitioningHandle::ScaledWriterHash,
                partitioning_keys: vec![SymbolId(0)],
                inputs: vec![vec![SymbolId(0)]],
                outputs: vec![SymbolId(0)],
            }),
            vec![scan],
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

        let err = validate(&writer, &NoMetadata).unwrap_err();
        assert!(matches!(err, OptimizerError::ValidationFailure { .. }));
        assert!(err.to_string().contains('T'));
    }

    #[test]
    fn unscoped_symbol_is_validation_failure() {
        let ids = PlanNodeIdAllocator::default();
        let scan = PlanNode::leaf(
            ids.fresh(),
            PlanNodeAttrs::TableScan(TableScanAttrs {
                table_name: "t".into(),
                output_symbols: vec![SymbolId(0)],
            }),
        )
        .unwrap();
        let filter = PlanNode::new(
            ids.fresh(),
            PlanNodeAttrs::Filter(crate::plan::attrs::FilterAttrs {
                predicate: crate::plan::expr::Expr::eq(
                    crate::plan::expr::Expr::symbol(SymbolId(99)),
                    crate::plan::expr::Expr::Literal(crate::plan::expr::Literal::Int64(1)),
                ),
            }),
            vec![scan],
        )
        .unwrap();
        assert!(matches!(
            validate(&filter, &NoMetadata),
            Err(OptimizerError::ValidationFailure { .. })
        ));
    }
}
