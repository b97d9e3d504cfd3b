//! Per-operator attributes (spec §3): everything a plan node carries besides
//! its children. These are shared verbatim between the frozen external plan
//! tree ([`super::PlanNode`]) and the memo's canonical expressions
//! ([`crate::memo::MemoExpr`]) since attribute data never differs between
//! the two representations — only the children do.

use crate::plan::expr::Expr;
use crate::partitioning::PartitioningHandle;
use crate::symbol::SymbolId;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct TableScanAttrs {
    pub table_name: String,
    pub output_symbols: Vec<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct FilterAttrs {
    pub predicate: Expr,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct ProjectAttrs {
    /// Ordered (target symbol, expression) assignments; defines both the
    /// output symbol list and order (spec §4.1 `output_symbols`).
    pub assignments: Vec<(SymbolId, Expr)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct AggregationSpec {
    pub output_symbol: SymbolId,
    pub function: AggregateFunction,
    pub input: SymbolId,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct AggregateAttrs {
    pub grouping_set: Vec<SymbolId>,
    pub aggregations: Vec<AggregationSpec>,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct JoinAttrs {
    pub join_type: JoinType,
    /// Equi-join key pairs `(left_symbol, right_symbol)`.
    pub equi_keys: Vec<(SymbolId, SymbolId)>,
    /// Residual non-equi conjunction, if any.
    pub filter: Option<Expr>,
    /// Hint for the physical distribution strategy this join should use;
    /// `None` until a distribution-selection rule has run.
    pub distribution_type: Option<JoinDistributionType>,
    pub output_symbols: Vec<SymbolId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinDistributionType {
    Partitioned,
    Replicated,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct SemiJoinAttrs {
    pub source_join_symbol: SymbolId,
    pub filtering_source_join_symbol: SymbolId,
    pub semi_output_symbol: SymbolId,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct SpatialJoinAttrs {
    pub join_type: JoinType,
    pub spatial_predicate: Expr,
    pub output_symbols: Vec<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct UnionAttrs {
    /// `output_to_inputs[i]` lists, for output position `i`, the symbol
    /// contributed by each source in declaration order.
    pub output_symbols: Vec<SymbolId>,
    pub inputs_symbol_mapping: Vec<Vec<SymbolId>>,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct ExchangeAttrs {
    pub partitioning: PartitioningHandle,
    pub partitioning_keys: Vec<SymbolId>,
    /// Per-source input symbol lists; `inputs[i]` feeds `outputs[i]`
    /// position-wise (spec §4.5: "The remapping is position-wise").
    pub inputs: Vec<Vec<SymbolId>>,
    pub outputs: Vec<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct TableWriteAttrs {
    pub target: String,
    pub input_symbols: Vec<SymbolId>,
    pub output_symbols: Vec<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct TableFunctionAttrs {
    pub function_name: String,
    pub output_symbols: Vec<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct ValuesAttrs {
    pub output_symbols: Vec<SymbolId>,
    pub row_count: u64,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct SortItem {
    pub symbol: SymbolId,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct SortAttrs {
    pub order_by: Vec<SortItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LimitAttrs {
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub enum PlanNodeAttrs {
    TableScan(TableScanAttrs),
    Filter(FilterAttrs),
    Project(ProjectAttrs),
    Aggregate(AggregateAttrs),
    Join(JoinAttrs),
    SemiJoin(SemiJoinAttrs),
    SpatialJoin(SpatialJoinAttrs),
    Union(UnionAttrs),
    Exchange(ExchangeAttrs),
    TableWrite(TableWriteAttrs),
    TableFunction(TableFunctionAttrs),
    Values(ValuesAttrs),
    Sort(SortAttrs),
    Limit(LimitAttrs),
}

/// Arity: the number of children a variant expects (spec §3 invariant 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic,
}

impl PlanNodeAttrs {
    pub fn arity(&self) -> Arity {
        use PlanNodeAttrs::*;
        match self {
            TableScan(_) | Values(_) | TableFunction(_) => Arity::Fixed(0),
            Filter(_) | Project(_) | Aggregate(_) | Sort(_) | Limit(_) | TableWrite(_) => {
                Arity::Fixed(1)
            }
            Join(_) | SemiJoin(_) | SpatialJoin(_) => Arity::Fixed(2),
            Union(_) | Exchange(_) => Arity::Variadic,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        use PlanNodeAttrs::*;
        match self {
            TableScan(_) => "TableScan",
            Filter(_) => "Filter",
            Project(_) => "Project",
            Aggregate(_) => "Aggregate",
            Join(_) => "Join",
            SemiJoin(_) => "SemiJoin",
            SpatialJoin(_) => "SpatialJoin",
            Union(_) => "Union",
            Exchange(_) => "Exchange",
            TableWrite(_) => "TableWrite",
            TableFunction(_) => "TableFunction",
            Values(_) => "Values",
            Sort(_) => "Sort",
            Limit(_) => "Limit",
        }
    }

    /// Symbols this node *introduces itself* (not inherited from a child),
    /// used by the symbol-scoping sanity checker (C8) and stats derivation.
    pub fn introduced_symbols(&self) -> Vec<SymbolId> {
        use PlanNodeAttrs::*;
        match self {
            TableScan(a) => a.output_symbols.clone(),
            Project(a) => a.assignments.iter().map(|(s, _)| *s).collect(),
            Aggregate(a) => {
                let mut out = a.grouping_set.clone();
                out.extend(a.aggregations.iter().map(|spec| spec.output_symbol));
                out
            }
            SemiJoin(a) => vec![a.semi_output_symbol],
            Values(a) => a.output_symbols.clone(),
            TableFunction(a) => a.output_symbols.clone(),
            TableWrite(a) => a.output_symbols.clone(),
            Join(_) | SpatialJoin(_) | Union(_) | Exchange(_) | Filter(_) | Sort(_) | Limit(_) => {
                Vec::new()
            }
        }
    }
}

/// A partial type map used by rules/validators that need a symbol's declared
/// type without walking the whole plan.
pub type TypeProvider = std::collections::HashMap<SymbolId, Type>;

/// A cheap fingerprint of a [`TypeProvider`], used as part of the stats/cost
/// cache key (spec §4.5/§4.6: "keyed by ... type_provider"). Iterates in
/// symbol-id order so the fingerprint is independent of hash-map iteration
/// order.
pub fn type_provider_fingerprint(types: &TypeProvider) -> u64 {
    use std::hash::Hasher;
    let mut entries: Vec<(&SymbolId, &Type)> = types.iter().collect();
    entries.sort_by_key(|(id, _)| id.0);
    let mut hasher = xxhash_rust::xxh3::Xxh3::new();
    for (id, ty) in entries {
        hasher.write_u32(id.0);
        hasher.write(ty.signature().as_bytes());
    }
    hasher.finish()
}
