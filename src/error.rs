//! Error taxonomy for the optimizer core (spec §7).
//!
//! Only [`OptimizerError::InvalidPlan`] ever escapes [`crate::api::optimize`]
//! as an `Err`. [`OptimizerError::ValidationFailure`] is fatal to the
//! rewrite but not to the call: `optimize` catches it and returns `Ok` with
//! the previous best plan and the error attached via
//! [`crate::api::OptimizeOutcome::validation_error`] (spec §7.5, seed
//! scenario 6) — the standalone [`crate::api::validate`] entry point still
//! returns it as a bare `Err` since it has no outcome struct to carry a
//! plan. Cancellation (spec §5) is not modeled as an `Err` at all: it
//! surfaces as the `cancelled` flag on [`crate::rewrite::RewriteOutcome`]/
//! [`crate::api::OptimizeOutcome`] alongside the best-so-far plan, since the
//! caller needs that plan even on the success path. [`OptimizerError::Cancelled`]
//! remains part of the taxonomy for components that have no outcome struct to
//! flag (e.g. a future standalone `derive_stats`/`derive_cost` cancellation
//! point) but is unused by the current entry points. The other kinds
//! (`RuleFailure`, `Arithmetic`, `Unsupported`) are recovered locally by the
//! component that produces them and never propagate past this crate's
//! boundary; they are constructed here so call sites have a single place to
//! log/record them.

use crate::plan::PlanNodeId;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, OptimizerError>;

/// The closed set of error kinds described in spec §7. Variants are grouped
/// by propagation policy in the doc comment above, not by declaration order.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizerError {
    /// A structural invariant (§3) was violated on entry. Fatal; returned
    /// immediately without attempting any rewrite.
    #[error("invalid plan: {message} (node {node_id:?})")]
    InvalidPlan {
        node_id: Option<PlanNodeId>,
        message: String,
    },

    /// A rule body raised or returned an inconsistent result (e.g. the
    /// replacement's output symbols differ from the original's). Isolated:
    /// the rewrite discards the replacement and continues.
    #[error("rule '{rule_name}' failed on node {node_id:?}: {message}")]
    RuleFailure {
        rule_name: String,
        node_id: PlanNodeId,
        message: String,
    },

    /// Overflow in cost/stats arithmetic. The affected component becomes
    /// `Unknown`; no exception escapes the derivation that produced it.
    #[error("arithmetic overflow deriving {field} for node {node_id:?}")]
    Arithmetic {
        node_id: PlanNodeId,
        field: &'static str,
    },

    /// A plan shape the core does not support (e.g. an unrecognized node
    /// variant during stats derivation). Stats become `Unknown`; the
    /// surrounding rewrite proceeds.
    #[error("unsupported plan shape at node {node_id:?}: {message}")]
    Unsupported {
        node_id: PlanNodeId,
        message: String,
    },

    /// A sanity checker (C8) rejected the post-rewrite plan. Fatal to the
    /// rewrite; [`crate::api::optimize`] catches it and returns the
    /// previous best plan with this error attached via
    /// [`crate::api::OptimizeOutcome::validation_error`]. The standalone
    /// [`crate::api::validate`] entry point has no outcome struct to carry
    /// a plan, so it still returns this variant as a bare `Err`.
    #[error("validation failed: {message} (node {node_id:?})")]
    ValidationFailure {
        node_id: Option<PlanNodeId>,
        message: String,
    },

    /// Cooperative cancellation was observed. The best-so-far plan is
    /// returned, flagged as possibly-suboptimal.
    #[error("optimization cancelled after {iterations} iterations")]
    Cancelled { iterations: u64 },
}

impl OptimizerError {
    /// A stable identifier string for the error kind, independent of the
    /// message payload, for callers mapping to SQL-level error codes (§7).
    pub fn code(&self) -> &'static str {
        match self {
            OptimizerError::InvalidPlan { .. } => "OPTIMIZER_INVALID_PLAN",
            OptimizerError::RuleFailure { .. } => "OPTIMIZER_RULE_FAILURE",
            OptimizerError::Arithmetic { .. } => "OPTIMIZER_ARITHMETIC_OVERFLOW",
            OptimizerError::Unsupported { .. } => "OPTIMIZER_UNSUPPORTED_PLAN_SHAPE",
            OptimizerError::ValidationFailure { .. } => "OPTIMIZER_VALIDATION_FAILURE",
            OptimizerError::Cancelled { .. } => "OPTIMIZER_CANCELLED",
        }
    }

    /// Whether this kind is fatal to the whole optimization (propagates to
    /// the caller) as opposed to being recovered locally.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OptimizerError::InvalidPlan { .. }
                | OptimizerError::ValidationFailure { .. }
                | OptimizerError::Cancelled { .. }
        )
    }
}
