//! C4: the iterative rewriter (spec §4.4). Drives a work-set of
//! `(group, rule)` pairs to fixpoint over the memo (C3), querying the cost
//! provider (C6/C7) on each candidate to keep the group's cheapest known
//! form, and extracting the cost-optimal plan when done.
//!
//! Grounded in the teacher's `RuleMatcher`/`apply_transformation_rules`
//! work-queue loop (`rulematcher.rs`, `cascades.rs`), generalized from a
//! fixed rule list over `LogicalPlan` to an arbitrary ordered rule table.

pub mod rules;

use crate::cost::best_member;
use crate::error::{OptimizerError, Result};
use crate::memo::{ExprId, Memo, MemoExpr};
use crate::plan::attrs::{PlanNodeAttrs, TypeProvider};
use crate::plan::node::{GroupId, GroupReference, PlanNode, PlanNodeIdAllocator};
use crate::session::SessionParameters;
use crate::symbol::SymbolId;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// A read-only view of one specific expression living in the memo, used as
/// the node type rule patterns (C2) match against. Borrows the memo
/// immutably for its lifetime; a rule must finish matching and produce an
/// owned [`Rewrite`] before the caller can mutate the memo again.
#[derive(Clone, Copy)]
pub struct ExprView<'a> {
    memo: &'a Memo,
    pub group_id: GroupId,
    pub expr_id: ExprId,
}

impl<'a> ExprView<'a> {
    pub fn new(memo: &'a Memo, group_id: GroupId, expr_id: ExprId) -> Self {
        Self {
            memo,
            group_id,
            expr_id,
        }
    }

    pub fn memo_expr(&self) -> &'a MemoExpr {
        self.memo.expr(self.expr_id)
    }

    pub fn children(&self) -> &'a [GroupReference] {
        &self.memo_expr().children
    }
}

impl<'a> crate::pattern::MatchNode for ExprView<'a> {
    fn attrs(&self) -> &PlanNodeAttrs {
        &self.memo_expr().attrs
    }

    fn child_count(&self) -> usize {
        self.children().len()
    }

    /// Descends into the child group's first (representative) member.
    /// Cascades-style exploration tries every member, but patterns only
    /// need one concrete shape to decide whether to fire; the work-set loop
    /// re-enqueues a group whenever a new member is added, so alternatives
    /// discovered later still get their turn against every rule.
    fn child(&self, i: usize) -> Option<Self> {
        let child_ref = self.children().get(i)?;
        let member = *self.memo.get(child_ref.group_id).members().first()?;
        Some(ExprView::new(self.memo, child_ref.group_id, member))
    }
}

/// Outcome of a rule's attempt against one expression (spec §9: "Rule
/// bodies return `Rewrite::{Empty, Plan(n), Failed(reason)}`").
pub enum Rewrite {
    /// The pattern did not match, or matched but the rule chose not to
    /// produce a new form. No work is added.
    Empty,
    /// A replacement expression, attributes plus child group references,
    /// ready to be added to the matched group's equivalence set.
    Plan(MemoExpr),
    /// The rule's body detected an inconsistency in its own output (e.g.
    /// mismatched symbols). Isolated: discarded and logged, never fatal.
    Failed(String),
}

/// A `(pattern, transform)` rule entry (C4/C2). Implementations typically
/// match their pattern and build the replacement in one method body, the
/// way the teacher's `rulematcher.rs` combines an `if let` guard with its
/// transform in a single function.
pub trait Rule {
    fn name(&self) -> &'static str;
    fn apply(&self, view: ExprView) -> Rewrite;
}

/// One record per successful rewrite, for callers that want to see which
/// rules fired (spec §4B supplemental feature, not required output).
#[derive(Debug, Clone)]
pub struct RuleTraceEntry {
    pub rule_name: &'static str,
    pub group_id: GroupId,
}

#[derive(Debug, Default)]
pub struct RuleTrace {
    pub entries: Vec<RuleTraceEntry>,
}

impl RuleTrace {
    fn record(&mut self, rule_name: &'static str, group_id: GroupId) {
        self.entries.push(RuleTraceEntry {
            rule_name,
            group_id,
        });
    }
}

/// Result of a full rewrite invocation (spec §4.4/§5 cancellation
/// semantics): the extracted plan plus flags describing whether it is
/// known-optimal or was cut short.
pub struct RewriteOutcome {
    pub plan: PlanNode,
    /// Set when the iteration cap was hit before fixpoint.
    pub partial: bool,
    /// Set when cooperative cancellation was observed.
    pub cancelled: bool,
}

fn same_symbol_set(a: &[SymbolId], b: &[SymbolId]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a_sorted = a.to_vec();
    let mut b_sorted = b.to_vec();
    a_sorted.sort_by_key(|s| s.0);
    b_sorted.sort_by_key(|s| s.0);
    a_sorted == b_sorted
}

/// Drives the fixpoint loop described in spec §4.4's algorithm.
pub struct IterativeRewriter<'a> {
    rules: Vec<Box<dyn Rule + 'a>>,
    session: &'a SessionParameters,
    types: &'a TypeProvider,
    cancel: &'a AtomicBool,
}

impl<'a> IterativeRewriter<'a> {
    pub fn new(
        rules: Vec<Box<dyn Rule + 'a>>,
        session: &'a SessionParameters,
        types: &'a TypeProvider,
        cancel: &'a AtomicBool,
    ) -> Self {
        Self {
            rules,
            session,
            types,
            cancel,
        }
    }

    /// Runs the rewrite to fixpoint (or cap, or cancellation) and extracts
    /// the cost-optimal plan. `trace`, if given, collects one entry per
    /// successful rewrite.
    pub fn optimize(
        &self,
        input: &PlanNode,
        mut trace: Option<&mut RuleTrace>,
    ) -> Result<RewriteOutcome> {
        let mut memo = Memo::new();
        let root = memo.insert(input);

        let mut work_set: VecDeque<(GroupId, usize)> = VecDeque::new();
        for group_id in memo.all_group_ids() {
            for rule_idx in 0..self.rules.len() {
                work_set.push_back((group_id, rule_idx));
            }
        }

        let mut iterations: u64 = 0;
        let mut partial = false;
        let mut cancelled = false;

        while let Some((group_id, rule_idx)) = work_set.pop_front() {
            if self.cancel.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
            if iterations >= self.session.config.max_iterations {
                partial = true;
                break;
            }
            iterations += 1;

            let rule = self.rules[rule_idx].as_ref();
            log::trace!("trying rule {} on group {group_id}", rule.name());

            let members: Vec<ExprId> = memo.get(group_id).members().to_vec();
            let mut produced_new_groups = Vec::new();
            for expr_id in members {
                let view = ExprView::new(&memo, group_id, expr_id);
                let outcome = rule.apply(view);
                match outcome {
                    Rewrite::Empty => {}
                    Rewrite::Failed(reason) => {
                        log::warn!("rule {} failed on group {group_id}: {reason}", rule.name());
                    }
                    Rewrite::Plan(new_expr) => {
                        let orig_outputs = &memo.get(group_id).output_symbols;
                        let child_outputs: Vec<Vec<SymbolId>> = new_expr
                            .children
                            .iter()
                            .map(|c| c.output_symbols.clone())
                            .collect();
                        let new_outputs =
                            crate::plan::node::output_symbols_from(&new_expr.attrs, &child_outputs);
                        if !same_symbol_set(orig_outputs, &new_outputs) {
                            log::warn!(
                                "rule {} produced a replacement with mismatched output symbols on group {group_id}, discarding",
                                rule.name()
                            );
                            continue;
                        }
                        let (_expr_id, is_new) = memo.replace(group_id, new_expr);
                        if !is_new {
                            // The rule re-derived a shape the memo already
                            // knows about (e.g. commuting a join twice);
                            // nothing changed, so don't re-enqueue or trace
                            // it as progress (spec §4.4 quiescence, §8
                            // idempotence invariant).
                            continue;
                        }
                        if let Some(t) = trace.as_deref_mut() {
                            t.record(rule.name(), group_id);
                        }
                        produced_new_groups.push(group_id);
                        log::debug!(
                            "rule {} rewrote group {group_id}; iteration {iterations}, work-set size {}",
                            rule.name(),
                            work_set.len()
                        );
                    }
                }
            }
            for changed_group in produced_new_groups {
                // Re-enqueue the group and its ancestors (spec §4.4 step
                // 3.b): a new member in a child group can unlock a rule
                // match at a parent that previously failed to fire.
                let mut to_requeue: Vec<GroupId> = vec![changed_group];
                to_requeue.extend(memo.ancestors_of(changed_group));
                for group in to_requeue {
                    for idx in 0..self.rules.len() {
                        work_set.push_back((group, idx));
                    }
                }
            }
        }

        let mut ids = PlanNodeIdAllocator::default();
        let plan = extract_best(&memo, root, self.session, self.types, &mut ids)?;

        Ok(RewriteOutcome {
            plan,
            partial,
            cancelled,
        })
    }
}

/// Depth-first extraction of the cost-optimal plan (spec §4.4 step 4):
/// picks each group's cheapest member, recursively resolving its group
/// references into concrete subtrees. No `GroupReference` survives into the
/// result (C8's "no group references" check verifies this externally).
pub fn extract_best(
    memo: &Memo,
    group_id: GroupId,
    session: &SessionParameters,
    types: &TypeProvider,
    ids: &mut PlanNodeIdAllocator,
) -> Result<PlanNode> {
    let (expr_id, _cost) = best_member(memo, group_id, session, types);
    let expr = memo.expr(expr_id);
    let mut children = Vec::with_capacity(expr.children.len());
    for child_ref in &expr.children {
        children.push(extract_best(memo, child_ref.group_id, session, types, ids)?);
    }
    PlanNode::new(ids.fresh(), expr.attrs.clone(), children).map_err(|e| match e {
        OptimizerError::InvalidPlan { message, .. } => OptimizerError::InvalidPlan {
            node_id: None,
            message: format!("extraction produced an invalid plan: {message}"),
        },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::attrs::{PlanNodeAttrs, TableScanAttrs};
    use crate::plan::node::PlanNode;

    #[test]
    fn extraction_round_trips_when_no_rule_fires() {
        let ids = PlanNodeIdAllocator::default();
        let scan = PlanNode::leaf(
            ids.fresh(),
            PlanNodeAttrs::TableScan(TableScanAttrs {
                table_name: "t".into(),
                output_symbols: vec![SymbolId(0)],
            }),
        )
        .unwrap();

        let session = SessionParameters::default();
        let types = TypeProvider::new();
        let cancel = AtomicBool::new(false);
        let rewriter = IterativeRewriter::new(Vec::new(), &session, &types, &cancel);
        let outcome = rewriter.optimize(&scan, None).unwrap();
        assert!(!outcome.partial && !outcome.cancelled);
        assert_eq!(outcome.plan.attrs, scan.attrs);
    }

    #[test]
    fn cancellation_before_fixpoint_returns_input_unchanged() {
        let ids = PlanNodeIdAllocator::default();
        let scan = PlanNode::leaf(
            ids.fresh(),
            PlanNodeAttrs::TableScan(TableScanAttrs {
                table_name: "t".into(),
                output_symbols: vec![SymbolId(0)],
            }),
        )
        .unwrap();

        let session = SessionParameters::default();
        let types = TypeProvider::new();
        let cancel = AtomicBool::new(true);
        let rewriter = IterativeRewriter::new(
            vec![Box::new(rules::predicate::ExtractCommonPredicate)],
            &session,
            &types,
            &cancel,
        );
        let outcome = rewriter.optimize(&scan, None).unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.plan.attrs, scan.attrs);
    }
}
