//! C5: lazy, memoized per-node statistics derivation (spec §4.5).
//!
//! A single-pass visitor, one arm per node kind, mirroring the shape of the
//! teacher's `MExpr` row/cost match arms in `mexpr.rs` but producing a full
//! statistics struct instead of a bare row estimate. Every field is an
//! [`Estimate<T>`]: `Unknown` propagates through arithmetic rather than
//! panicking or defaulting to zero (spec §3: "operations propagating
//! `Unknown` yield `Unknown`").

use crate::memo::Memo;
use crate::plan::attrs::{AggregateFunction, PlanNodeAttrs, TypeProvider};
use crate::plan::node::GroupId;
use crate::session::SessionParameters;
use crate::symbol::SymbolId;
use ahash::AHashMap;

/// A value that is either known or `Unknown`; propagates through arithmetic
/// the way spec §3 requires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate<T> {
    Known(T),
    Unknown,
}

impl<T> Estimate<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Estimate::Known(v) => Some(v),
            Estimate::Unknown => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Estimate<U> {
        match self {
            Estimate::Known(v) => Estimate::Known(f(v)),
            Estimate::Unknown => Estimate::Unknown,
        }
    }
}

impl Estimate<f64> {
    pub fn add(self, other: Estimate<f64>) -> Estimate<f64> {
        match (self, other) {
            (Estimate::Known(a), Estimate::Known(b)) => Estimate::Known(a + b),
            _ => Estimate::Unknown,
        }
    }

    pub fn mul(self, other: Estimate<f64>) -> Estimate<f64> {
        match (self, other) {
            (Estimate::Known(a), Estimate::Known(b)) => Estimate::Known(a * b),
            _ => Estimate::Unknown,
        }
    }

    pub fn min(self, other: Estimate<f64>) -> Estimate<f64> {
        match (self, other) {
            (Estimate::Known(a), Estimate::Known(b)) => Estimate::Known(a.min(b)),
            _ => Estimate::Unknown,
        }
    }

    pub fn clamp01(self) -> Estimate<f64> {
        self.map(|v| v.clamp(0.0, 1.0))
    }
}

/// Per-symbol statistics: low/high value, distinct count, null fraction,
/// average size in bytes (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolStatistics {
    pub low_value: Estimate<f64>,
    pub high_value: Estimate<f64>,
    pub distinct_values: Estimate<f64>,
    pub null_fraction: Estimate<f64>,
    pub average_size_bytes: Estimate<f64>,
}

impl SymbolStatistics {
    pub fn unknown() -> Self {
        Self {
            low_value: Estimate::Unknown,
            high_value: Estimate::Unknown,
            distinct_values: Estimate::Unknown,
            null_fraction: Estimate::Unknown,
            average_size_bytes: Estimate::Unknown,
        }
    }

    /// `addStatsAndMaxDistinctValues` (spec §4.5 Union): rows/NDV combined
    /// additively, NDV capped by the combined row count, null fraction
    /// reweighted, ranges widened.
    fn combine_for_union(&self, other: &SymbolStatistics, rows_a: f64, rows_b: f64) -> SymbolStatistics {
        let distinct_values = match (self.distinct_values, other.distinct_values) {
            (Estimate::Known(a), Estimate::Known(b)) => Estimate::Known((a + b).min(rows_a + rows_b)),
            _ => Estimate::Unknown,
        };
        let null_fraction = match (
            self.null_fraction,
            other.null_fraction,
            rows_a + rows_b > 0.0,
        ) {
            (Estimate::Known(na), Estimate::Known(nb), true) => {
                Estimate::Known((na * rows_a + nb * rows_b) / (rows_a + rows_b))
            }
            _ => Estimate::Unknown,
        };
        let low_value = match (self.low_value, other.low_value) {
            (Estimate::Known(a), Estimate::Known(b)) => Estimate::Known(a.min(b)),
            _ => Estimate::Unknown,
        };
        let high_value = match (self.high_value, other.high_value) {
            (Estimate::Known(a), Estimate::Known(b)) => Estimate::Known(a.max(b)),
            _ => Estimate::Unknown,
        };
        let average_size_bytes = match (self.average_size_bytes, other.average_size_bytes) {
            (Estimate::Known(a), Estimate::Known(b)) if rows_a + rows_b > 0.0 => {
                Estimate::Known((a * rows_a + b * rows_b) / (rows_a + rows_b))
            }
            _ => Estimate::Unknown,
        };
        SymbolStatistics {
            low_value,
            high_value,
            distinct_values,
            null_fraction,
            average_size_bytes,
        }
    }
}

/// Top-level statistics for a plan node (spec §3): a row count plus
/// per-output-symbol statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNodeStatistics {
    pub row_count: Estimate<f64>,
    pub symbol_stats: AHashMap<SymbolId, SymbolStatistics>,
}

impl PlanNodeStatistics {
    pub fn unknown(output_symbols: &[SymbolId]) -> Self {
        Self {
            row_count: Estimate::Unknown,
            symbol_stats: output_symbols
                .iter()
                .map(|s| (*s, SymbolStatistics::unknown()))
                .collect(),
        }
    }

    pub fn empty(output_symbols: &[SymbolId]) -> Self {
        Self {
            row_count: Estimate::Known(0.0),
            symbol_stats: output_symbols
                .iter()
                .map(|s| {
                    (
                        *s,
                        SymbolStatistics {
                            low_value: Estimate::Unknown,
                            high_value: Estimate::Unknown,
                            distinct_values: Estimate::Known(0.0),
                            null_fraction: Estimate::Unknown,
                            average_size_bytes: Estimate::Unknown,
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn stat_for(&self, symbol: SymbolId) -> SymbolStatistics {
        self.symbol_stats
            .get(&symbol)
            .cloned()
            .unwrap_or_else(SymbolStatistics::unknown)
    }

    /// Total average row size in bytes, used by the cost provider (C6) to
    /// turn row counts into byte volumes.
    pub fn average_row_size_bytes(&self) -> Estimate<f64> {
        let mut total = 0.0;
        for stats in self.symbol_stats.values() {
            match stats.average_size_bytes {
                Estimate::Known(v) => total += v,
                Estimate::Unknown => return Estimate::Unknown,
            }
        }
        Estimate::Known(total)
    }

    pub fn total_bytes(&self) -> Estimate<f64> {
        self.row_count.mul(self.average_row_size_bytes())
    }
}

/// Derives statistics for every group in `memo`, bottom-up, caching each
/// group's result and keying the cache by `(session, type_provider)` (spec
/// §4.5/§4.6 cache policy). Pure and deterministic given identical inputs.
pub fn derive_stats_for_group(
    memo: &Memo,
    group_id: GroupId,
    session: &SessionParameters,
    types: &TypeProvider,
) -> PlanNodeStatistics {
    let cache_key = session
        .cache_fingerprint()
        .wrapping_mul(0x9E3779B97F4A7C15)
        ^ crate::plan::attrs::type_provider_fingerprint(types);

    memo.get(group_id).stats_cache.get_or_compute(cache_key, || {
        let group = memo.get(group_id);
        // Spec §4.4 invariant 4 / §4.3: any member of a group is equally
        // valid to derive stats from; all members share output symbols, so
        // the first member suffices and keeps derivation single-pass.
        let expr_id = group.members()[0];
        let expr = memo.expr(expr_id);
        let child_stats: Vec<PlanNodeStatistics> = expr
            .children
            .iter()
            .map(|child| derive_stats_for_group(memo, child.group_id, session, types))
            .collect();
        derive_stats(&expr.attrs, &group.output_symbols, &child_stats, session)
    })
}

fn derive_stats(
    attrs: &PlanNodeAttrs,
    output_symbols: &[SymbolId],
    children: &[PlanNodeStatistics],
    session: &SessionParameters,
) -> PlanNodeStatistics {
    use PlanNodeAttrs::*;
    match attrs {
        TableScan(_) | TableFunction(_) => PlanNodeStatistics::unknown(output_symbols),
        Values(a) => {
            if a.row_count == 0 {
                PlanNodeStatistics::empty(output_symbols)
            } else {
                PlanNodeStatistics::unknown(output_symbols)
            }
        }
        Filter(a) => {
            let input = &children[0];
            let sel = estimate_selectivity(&a.predicate, session).clamp01();
            let row_count = input.row_count.mul(sel);
            let symbol_stats = input
                .symbol_stats
                .iter()
                .map(|(sym, stat)| {
                    let narrowed = SymbolStatistics {
                        distinct_values: cap_ndv(stat.distinct_values.mul(sel), row_count),
                        ..stat.clone()
                    };
                    (*sym, narrowed)
                })
                .collect();
            PlanNodeStatistics {
                row_count,
                symbol_stats,
            }
        }
        Project(a) => {
            let input = &children[0];
            let row_count = input.row_count;
            let symbol_stats = a
                .assignments
                .iter()
                .map(|(out_sym, expr)| {
                    let stat = match expr {
                        crate::plan::expr::Expr::Symbol(src) => input.stat_for(*src),
                        _ => SymbolStatistics {
                            distinct_values: cap_ndv(Estimate::Unknown, row_count),
                            ..SymbolStatistics::unknown()
                        },
                    };
                    (*out_sym, stat)
                })
                .collect();
            PlanNodeStatistics {
                row_count,
                symbol_stats,
            }
        }
        Aggregate(a) => {
            let input = &children[0];
            let group_ndv_product = a
                .grouping_set
                .iter()
                .fold(Estimate::Known(1.0), |acc, sym| {
                    acc.mul(input.stat_for(*sym).distinct_values)
                });
            let row_count = match (group_ndv_product, input.row_count) {
                (Estimate::Known(g), Estimate::Known(rows)) => Estimate::Known(g.min(rows)),
                (Estimate::Unknown, Estimate::Known(rows)) if a.grouping_set.is_empty() => {
                    let _ = rows;
                    Estimate::Known(1.0)
                }
                _ => Estimate::Unknown,
            };
            let mut symbol_stats = AHashMap::new();
            for key_sym in &a.grouping_set {
                let key_stat = input.stat_for(*key_sym);
                symbol_stats.insert(
                    *key_sym,
                    SymbolStatistics {
                        distinct_values: cap_ndv(key_stat.distinct_values, row_count),
                        ..key_stat
                    },
                );
            }
            for spec in &a.aggregations {
                let ndv = match spec.function {
                    AggregateFunction::Count
                    | AggregateFunction::Sum
                    | AggregateFunction::Min
                    | AggregateFunction::Max
                    | AggregateFunction::Avg => row_count,
                };
                symbol_stats.insert(
                    spec.output_symbol,
                    SymbolStatistics {
                        distinct_values: ndv,
                        ..SymbolStatistics::unknown()
                    },
                );
            }
            PlanNodeStatistics {
                row_count,
                symbol_stats,
            }
        }
        Join(a) => {
            let (left, right) = (&children[0], &children[1]);
            let mut row_count = match (left.row_count, right.row_count) {
                (Estimate::Known(l), Estimate::Known(r)) => {
                    let max_ndv = a
                        .equi_keys
                        .iter()
                        .map(|(lk, rk)| {
                            let l_ndv = left.stat_for(*lk).distinct_values;
                            let r_ndv = right.stat_for(*rk).distinct_values;
                            match (l_ndv, r_ndv) {
                                (Estimate::Known(a), Estimate::Known(b)) => Some(a.max(b)),
                                _ => None,
                            }
                        })
                        .fold(None, |acc, v| match (acc, v) {
                            (None, v) => v,
                            (Some(a), Some(b)) => Some(a.max(b)),
                            (Some(a), None) => Some(a),
                        });
                    match max_ndv {
                        Some(ndv) if ndv > 0.0 => Estimate::Known(l * r / ndv),
                        Some(_) => Estimate::Known(0.0),
                        None => Estimate::Unknown,
                    }
                }
                _ => Estimate::Unknown,
            };
            if let Some(filter) = &a.filter {
                for _ in filter.conjuncts() {
                    row_count = row_count.mul(Estimate::Known(
                        session.cost_model.default_join_conjunct_selectivity,
                    ));
                }
            }
            let symbol_stats = output_symbols
                .iter()
                .map(|sym| {
                    let base = left
                        .symbol_stats
                        .get(sym)
                        .or_else(|| right.symbol_stats.get(sym))
                        .cloned()
                        .unwrap_or_else(SymbolStatistics::unknown);
                    (*sym, SymbolStatistics {
                        distinct_values: cap_ndv(base.distinct_values, row_count),
                        ..base
                    })
                })
                .collect();
            PlanNodeStatistics {
                row_count,
                symbol_stats,
            }
        }
        SemiJoin(a) => {
            let (source, filtering) = (&children[0], &children[1]);
            let source_ndv = source.stat_for(a.source_join_symbol).distinct_values;
            let filtering_ndv = filtering.stat_for(a.filtering_source_join_symbol).distinct_values;
            let ratio = match (filtering_ndv, source_ndv) {
                (Estimate::Known(f), Estimate::Known(s)) if s > 0.0 => Estimate::Known((f / s).min(1.0)),
                (Estimate::Known(_), Estimate::Known(_)) => Estimate::Known(0.0),
                _ => Estimate::Unknown,
            };
            let row_count = source.row_count.mul(ratio);
            let mut symbol_stats = source.symbol_stats.clone();
            symbol_stats.insert(
                a.semi_output_symbol,
                SymbolStatistics {
                    distinct_values: row_count,
                    ..SymbolStatistics::unknown()
                },
            );
            PlanNodeStatistics {
                row_count,
                symbol_stats,
            }
        }
        SpatialJoin(_) => PlanNodeStatistics::unknown(output_symbols),
        Union(a) => {
            let row_count = children
                .iter()
                .fold(Estimate::Known(0.0), |acc, c| acc.add(c.row_count));
            let mut symbol_stats = AHashMap::new();
            for (i, out_sym) in a.output_symbols.iter().enumerate() {
                let mut acc: Option<(SymbolStatistics, f64)> = None;
                for (source_idx, child) in children.iter().enumerate() {
                    let Some(input_sym) = a.inputs_symbol_mapping.get(source_idx).and_then(|m| m.get(i)) else {
                        continue;
                    };
                    let stat = child.stat_for(*input_sym);
                    let rows = match child.row_count {
                        Estimate::Known(r) => r,
                        Estimate::Unknown => 0.0,
                    };
                    acc = Some(match acc {
                        None => (stat, rows),
                        Some((prev, prev_rows)) => (prev.combine_for_union(&stat, prev_rows, rows), prev_rows + rows),
                    });
                }
                symbol_stats.insert(
                    *out_sym,
                    acc.map(|(s, _)| s).unwrap_or_else(SymbolStatistics::unknown),
                );
            }
            PlanNodeStatistics {
                row_count,
                symbol_stats,
            }
        }
        Exchange(a) => {
            // §9 open question: positional alignment of inputs/outputs is a
            // hard invariant, not a recoverable `Unknown` case.
            debug_assert_eq!(a.inputs.len(), children.len());
            let row_count = children
                .iter()
                .fold(Estimate::Known(0.0), |acc, c| acc.add(c.row_count));
            let mut symbol_stats = AHashMap::new();
            for (out_idx, out_sym) in a.outputs.iter().enumerate() {
                let mut acc: Option<(SymbolStatistics, f64)> = None;
                for (source_idx, child) in children.iter().enumerate() {
                    let Some(input_sym) = a.inputs.get(source_idx).and_then(|m| m.get(out_idx)) else {
                        continue;
                    };
                    let stat = child.stat_for(*input_sym);
                    let rows = match child.row_count {
                        Estimate::Known(r) => r,
                        Estimate::Unknown => 0.0,
                    };
                    acc = Some(match acc {
                        None => (stat, rows),
                        Some((prev, prev_rows)) => (prev.combine_for_union(&stat, prev_rows, rows), prev_rows + rows),
                    });
                }
                symbol_stats.insert(
                    *out_sym,
                    acc.map(|(s, _)| s).unwrap_or_else(SymbolStatistics::unknown),
                );
            }
            PlanNodeStatistics {
                row_count,
                symbol_stats,
            }
        }
        TableWrite(_) => children.first().cloned().unwrap_or_else(|| PlanNodeStatistics::unknown(output_symbols)),
        Sort(_) | Limit(_) => {
            let input = children[0].clone();
            if let Limit(l) = attrs {
                let row_count = match input.row_count {
                    Estimate::Known(r) => Estimate::Known(r.min(l.count as f64)),
                    Estimate::Unknown => Estimate::Known(l.count as f64),
                };
                PlanNodeStatistics {
                    row_count,
                    symbol_stats: input.symbol_stats,
                }
            } else {
                input
            }
        }
    }
}

fn cap_ndv(ndv: Estimate<f64>, row_count: Estimate<f64>) -> Estimate<f64> {
    match (ndv, row_count) {
        (Estimate::Known(n), Estimate::Known(r)) => Estimate::Known(n.min(r)),
        _ => Estimate::Unknown,
    }
}

/// Estimates a filter predicate's selectivity from its shape: equalities
/// against the configured default, conjunctions multiply (capped), anything
/// else falls back to the session's default filter selectivity (spec §4.5:
/// "Filters multiply row count by an estimated selectivity").
fn estimate_selectivity(predicate: &crate::plan::expr::Expr, session: &SessionParameters) -> Estimate<f64> {
    use crate::plan::expr::Expr;
    match predicate {
        Expr::And(conjuncts) => conjuncts
            .iter()
            .fold(Estimate::Known(1.0), |acc, c| acc.mul(estimate_selectivity(c, session))),
        Expr::Compare { .. } => Estimate::Known(session.cost_model.default_filter_selectivity),
        Expr::Literal(crate::plan::expr::Literal::Boolean(true)) => Estimate::Known(1.0),
        Expr::Literal(crate::plan::expr::Literal::Boolean(false)) => Estimate::Known(0.0),
        _ => Estimate::Known(session.cost_model.default_filter_selectivity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::attrs::{FilterAttrs, PlanNodeAttrs, TableScanAttrs, ValuesAttrs};
    use crate::plan::expr::Expr;
    use crate::plan::node::{PlanNode, PlanNodeIdAllocator};

    #[test]
    fn empty_values_yields_zero_rows() {
        let ids = PlanNodeIdAllocator::default();
        let values = PlanNode::leaf(
            ids.fresh(),
            PlanNodeAttrs::Values(ValuesAttrs {
                output_symbols: vec![SymbolId(0)],
                row_count: 0,
            }),
        )
        .unwrap();
        let mut memo = Memo::new();
        let root = memo.insert(&values);
        let session = SessionParameters::default();
        let types = TypeProvider::new();
        let stats = derive_stats_for_group(&memo, root, &session, &types);
        assert_eq!(stats.row_count, Estimate::Known(0.0));
    }

    #[test]
    fn filter_selectivity_clamped_and_narrows_ndv() {
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
            PlanNodeAttrs::Filter(FilterAttrs {
                predicate: Expr::eq(Expr::symbol(SymbolId(0)), Expr::Literal(crate::plan::expr::Literal::Int64(1))),
            }),
            vec![scan],
        )
        .unwrap();
        let mut memo = Memo::new();
        let root = memo.insert(&filter);
        let session = SessionParameters::default();
        let types = TypeProvider::new();
        let stats = derive_stats_for_group(&memo, root, &session, &types);
        // TableScan stats are Unknown, so row count stays Unknown even after
        // multiplying by a known selectivity.
        assert_eq!(stats.row_count, Estimate::Unknown);
    }
}
