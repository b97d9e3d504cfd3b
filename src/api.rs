//! The four external entry points (spec §6), each consuming and producing
//! frozen values. Orchestration mirrors the teacher's top-level
//! `Cascades::optimize` call, generalized off `LogicalPlan`.

use crate::cost::{derive_cost_for_group, PlanCostEstimate};
use crate::error::{OptimizerError, Result};
use crate::memo::Memo;
use crate::metadata::MetadataProbe;
use crate::plan::attrs::TypeProvider;
use crate::plan::node::PlanNode;
use crate::rewrite::rules::{join::CommuteJoin, predicate::ExtractCommonPredicate};
use crate::rewrite::{IterativeRewriter, Rule, RuleTrace};
use crate::session::SessionParameters;
use crate::stats::PlanNodeStatistics;
use ahash::AHashMap;
use std::sync::atomic::AtomicBool;

/// The default, fixed-order rule table (spec §9: "a plain rule table... no
/// runtime type reflection"). `session.config` flags gate the rules that
/// have an on/off switch in §4.4.
fn default_rules<'a>(session: &'a SessionParameters) -> Vec<Box<dyn Rule + 'a>> {
    let mut rules: Vec<Box<dyn Rule + 'a>> = Vec::new();
    rules.push(Box::new(ExtractCommonPredicate));
    if session.config.optimize_join_reordering {
        rules.push(Box::new(CommuteJoin));
    }
    rules
}

/// Result of [`optimize`]: the rewritten plan, its root cost, and whether
/// it is known-optimal (spec §5 cancellation semantics).
pub struct OptimizeOutcome {
    pub plan: PlanNode,
    pub root_cost: PlanCostEstimate,
    pub partial: bool,
    pub cancelled: bool,
    /// Set when C8 rejected the rewritten plan (spec §7.5, seed scenario 6).
    /// `plan`/`root_cost` are then the *input* plan's own extraction/cost,
    /// the previous best plan from before the rejected rewrite, not the
    /// rejected candidate.
    pub validation_error: Option<OptimizerError>,
}

/// `optimize(plan, session, types, rules)` (spec §6). Runs C4 to fixpoint
/// (or cap, or cancellation), then C8. A [`crate::error::OptimizerError::ValidationFailure`]
/// is fatal to the rewrite but not to this call: it is folded into
/// `OptimizeOutcome::validation_error` alongside the previous best plan
/// (spec §7.5, seed scenario 6), rather than propagated as `Err`.
pub fn optimize(
    plan: &PlanNode,
    session: &SessionParameters,
    types: &TypeProvider,
    metadata: &dyn MetadataProbe,
    cancel: &AtomicBool,
) -> Result<OptimizeOutcome> {
    optimize_with_rules(plan, session, types, metadata, cancel, default_rules(session), None)
}

/// As [`optimize`], but with an explicit rule set and an optional trace
/// collector (spec §4B supplemental feature).
pub fn optimize_with_rules<'a>(
    plan: &PlanNode,
    session: &'a SessionParameters,
    types: &TypeProvider,
    metadata: &dyn MetadataProbe,
    cancel: &AtomicBool,
    rules: Vec<Box<dyn Rule + 'a>>,
    mut trace: Option<&mut RuleTrace>,
) -> Result<OptimizeOutcome> {
    let rewriter = IterativeRewriter::new(rules, session, types, cancel);
    let outcome = rewriter.optimize(plan, trace.as_deref_mut())?;

    if let Err(validation_error) = crate::validate::validate(&outcome.plan, metadata) {
        let mut memo = Memo::new();
        let root = memo.insert(plan);
        let root_cost = derive_cost_for_group(&memo, root, session, types);
        return Ok(OptimizeOutcome {
            plan: plan.clone(),
            root_cost,
            partial: outcome.partial,
            cancelled: outcome.cancelled,
            validation_error: Some(validation_error),
        });
    }

    let mut memo = Memo::new();
    let root = memo.insert(&outcome.plan);
    let root_cost = derive_cost_for_group(&memo, root, session, types);

    Ok(OptimizeOutcome {
        plan: outcome.plan,
        root_cost,
        partial: outcome.partial,
        cancelled: outcome.cancelled,
        validation_error: None,
    })
}

/// `derive_stats(plan, session, types)` (spec §6): per-node statistics map.
pub fn derive_stats(
    plan: &PlanNode,
    session: &SessionParameters,
    types: &TypeProvider,
) -> AHashMap<crate::plan::node::PlanNodeId, PlanNodeStatistics> {
    let mut memo = Memo::new();
    let root = memo.insert(plan);
    let mut out = AHashMap::new();
    collect_stats(plan, &memo, root, session, types, &mut out);
    out
}

fn collect_stats(
    node: &PlanNode,
    memo: &Memo,
    group_id: crate::plan::node::GroupId,
    session: &SessionParameters,
    types: &TypeProvider,
    out: &mut AHashMap<crate::plan::node::PlanNodeId, PlanNodeStatistics>,
) {
    let stats = crate::stats::derive_stats_for_group(memo, group_id, session, types);
    out.insert(node.id, stats);
    let expr = memo.expr(memo.get(group_id).members()[0]);
    for (child_node, child_ref) in node.children.iter().zip(expr.children.iter()) {
        collect_stats(child_node, memo, child_ref.group_id, session, types, out);
    }
}

/// `derive_cost(plan, session, types, estimate_exchanges)` (spec §6):
/// per-node cumulative cost, wrapping C6 with C7 when the flag is set.
pub fn derive_cost(
    plan: &PlanNode,
    session: &SessionParameters,
    types: &TypeProvider,
    estimate_exchanges: bool,
) -> AHashMap<crate::plan::node::PlanNodeId, PlanCostEstimate> {
    let mut session = *session;
    session.config.estimate_exchanges_in_cost = estimate_exchanges;

    let mut memo = Memo::new();
    let root = memo.insert(plan);
    let mut out = AHashMap::new();
    collect_cost(plan, &memo, root, &session, types, &mut out);
    out
}

fn collect_cost(
    node: &PlanNode,
    memo: &Memo,
    group_id: crate::plan::node::GroupId,
    session: &SessionParameters,
    types: &TypeProvider,
    out: &mut AHashMap<crate::plan::node::PlanNodeId, PlanCostEstimate>,
) {
    let cost = derive_cost_for_group(memo, group_id, session, types);
    out.insert(node.id, cost);
    let expr = memo.expr(memo.get(group_id).members()[0]);
    for (child_node, child_ref) in node.children.iter().zip(expr.children.iter()) {
        collect_cost(child_node, memo, child_ref.group_id, session, types, out);
    }
}

/// `validate(plan, session)` (spec §6): runs C8.
pub fn validate(plan: &PlanNode, metadata: &dyn MetadataProbe) -> Result<()> {
    crate::validate::validate(plan, metadata)
}
