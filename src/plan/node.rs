//! The plan-node data model (C1): a closed variant set of relational
//! operators plus the traversal/replacement discipline spec §4.1 requires.

use crate::error::{OptimizerError, Result};
use crate::plan::attrs::{Arity, PlanNodeAttrs};
use crate::symbol::SymbolId;
use std::cell::Cell;
use std::fmt;

/// Identifies a group in the memo (C3). Defined here, not in `crate::memo`,
/// because a [`GroupReference`] is part of the plan model itself (spec §3:
/// "Group reference... a handle carrying the group identifier").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

/// A handle carrying the group identifier and the expected output symbols
/// of that group (spec §3). Symbols are a per-reference concern: the same
/// group may be referenced with different output symbol lists wherever it
/// is reused, as long as they are compatible.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupReference {
    pub group_id: GroupId,
    pub output_symbols: Vec<SymbolId>,
}

/// Unique identifier of a plan node within one plan (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlanNodeId(pub u64);

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mints plan node ids unique within a rewrite session, mirroring
/// [`crate::symbol::SymbolAllocator`].
#[derive(Debug, Default)]
pub struct PlanNodeIdAllocator {
    next: Cell<u64>,
}

impl PlanNodeIdAllocator {
    pub fn starting_after(max_existing: Option<PlanNodeId>) -> Self {
        let next = max_existing.map(|id| id.0 + 1).unwrap_or(0);
        Self {
            next: Cell::new(next),
        }
    }

    pub fn fresh(&self) -> PlanNodeId {
        let id = PlanNodeId(self.next.get());
        self.next.set(self.next.get() + 1);
        id
    }
}

/// A node in the frozen, externally-supplied plan DAG (spec §3 lifecycle:
/// "constructed outside the core and handed in as a frozen value. The core
/// never mutates input nodes."). Children are owned concrete nodes; once
/// inserted into the memo (C3) they are replaced by [`GroupReference`]s — see
/// [`crate::memo::MemoExpr`], which carries the same `attrs` but
/// `Vec<GroupReference>` children instead.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    pub id: PlanNodeId,
    pub attrs: PlanNodeAttrs,
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    pub fn new(id: PlanNodeId, attrs: PlanNodeAttrs, children: Vec<PlanNode>) -> Result<PlanNode> {
        check_arity(id, &attrs, children.len())?;
        Ok(PlanNode {
            id,
            attrs,
            children,
        })
    }

    pub fn leaf(id: PlanNodeId, attrs: PlanNodeAttrs) -> Result<PlanNode> {
        Self::new(id, attrs, Vec::new())
    }

    /// Replaces this node's children, preserving id and attributes, per the
    /// `replace_children` contract (spec §4.1). Fails with
    /// [`OptimizerError::InvalidPlan`] if arity does not match.
    pub fn replace_children(&self, new_children: Vec<PlanNode>) -> Result<PlanNode> {
        check_arity(self.id, &self.attrs, new_children.len())?;
        Ok(PlanNode {
            id: self.id,
            attrs: self.attrs.clone(),
            children: new_children,
        })
    }

    /// The output symbols this node produces (spec §4.1).
    pub fn output_symbols(&self) -> Vec<SymbolId> {
        let child_outputs: Vec<Vec<SymbolId>> =
            self.children.iter().map(|c| c.output_symbols()).collect();
        output_symbols_from(&self.attrs, &child_outputs)
    }
}

fn check_arity(id: PlanNodeId, attrs: &PlanNodeAttrs, got: usize) -> Result<()> {
    match attrs.arity() {
        Arity::Fixed(expected) if expected != got => Err(OptimizerError::InvalidPlan {
            node_id: Some(id),
            message: format!(
                "{} expects {expected} children, got {got}",
                attrs.kind_name()
            ),
        }),
        _ => Ok(()),
    }
}

/// Shared core of `output_symbols` for both the frozen tree and memo
/// expressions (spec §4.1): leaves declare columns, projections/aggregates
/// introduce their own, joins/unions concatenate with collisions resolved
/// by keeping first-seen, exchanges declare their outputs directly.
pub(crate) fn output_symbols_from(
    attrs: &PlanNodeAttrs,
    child_outputs: &[Vec<SymbolId>],
) -> Vec<SymbolId> {
    use PlanNodeAttrs::*;
    match attrs {
        TableScan(a) => a.output_symbols.clone(),
        Filter(_) | Sort(_) | Limit(_) => child_outputs.first().cloned().unwrap_or_default(),
        Project(a) => a.assignments.iter().map(|(s, _)| *s).collect(),
        Aggregate(a) => {
            let mut out = a.grouping_set.clone();
            out.extend(a.aggregations.iter().map(|spec| spec.output_symbol));
            out
        }
        Join(a) => a.output_symbols.clone(),
        SemiJoin(a) => {
            let mut out = child_outputs.first().cloned().unwrap_or_default();
            out.push(a.semi_output_symbol);
            out
        }
        SpatialJoin(a) => a.output_symbols.clone(),
        Union(a) => a.output_symbols.clone(),
        Exchange(a) => a.outputs.clone(),
        TableWrite(a) => a.output_symbols.clone(),
        TableFunction(a) => a.output_symbols.clone(),
        Values(a) => a.output_symbols.clone(),
    }
}
