//! C6: lazy, memoized cumulative cost derivation (spec §4.6), plus its
//! exchange-aware wrapper (C7, spec §4.7) in [`exchange`].

pub mod exchange;

use crate::memo::{ExprId, Memo};
use crate::plan::attrs::{JoinDistributionType, PlanNodeAttrs, TypeProvider};
use crate::plan::node::GroupId;
use crate::session::SessionParameters;
use crate::stats::{derive_stats_for_group, Estimate, PlanNodeStatistics};

/// `(cpu, memory, network)`, non-cumulative, for a single node (spec §3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalCostEstimate {
    pub cpu: Estimate<f64>,
    pub memory: Estimate<f64>,
    pub network: Estimate<f64>,
}

impl LocalCostEstimate {
    pub const ZERO: LocalCostEstimate = LocalCostEstimate {
        cpu: Estimate::Known(0.0),
        memory: Estimate::Known(0.0),
        network: Estimate::Known(0.0),
    };

    pub fn unknown() -> Self {
        Self {
            cpu: Estimate::Unknown,
            memory: Estimate::Unknown,
            network: Estimate::Unknown,
        }
    }

    /// Commutative, associative addition that is `Unknown` as soon as any
    /// addend is (spec §3: "a commutative, associative `add_partial`").
    pub fn add_partial(self, other: LocalCostEstimate) -> LocalCostEstimate {
        LocalCostEstimate {
            cpu: self.cpu.add(other.cpu),
            memory: self.memory.add(other.memory),
            network: self.network.add(other.network),
        }
    }
}

/// Cumulative cost rooted at a node (spec §3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanCostEstimate {
    pub cpu: Estimate<f64>,
    pub max_memory: Estimate<f64>,
    pub max_memory_when_outputting: Estimate<f64>,
    pub network: Estimate<f64>,
    pub root_local_estimate: LocalCostEstimate,
}

impl PlanCostEstimate {
    pub fn unknown() -> Self {
        Self {
            cpu: Estimate::Unknown,
            max_memory: Estimate::Unknown,
            max_memory_when_outputting: Estimate::Unknown,
            network: Estimate::Unknown,
            root_local_estimate: LocalCostEstimate::unknown(),
        }
    }

    /// Total ordering key for "cheaper": `Unknown` sorts as worst so a rule
    /// producing an alternative with unknown cost never wins over a known
    /// one (spec §4.4 "pick the expression minimizing plan_cost").
    pub fn order_key(&self) -> f64 {
        match self.cpu {
            Estimate::Known(v) => v,
            Estimate::Unknown => f64::INFINITY,
        }
    }
}

fn local_cost(attrs: &PlanNodeAttrs, stats: &PlanNodeStatistics, children_stats: &[PlanNodeStatistics]) -> LocalCostEstimate {
    use PlanNodeAttrs::*;
    match attrs {
        TableScan(_) | Values(_) | TableFunction(_) => LocalCostEstimate {
            cpu: stats.total_bytes(),
            memory: Estimate::Known(0.0),
            network: Estimate::Known(0.0),
        },
        Filter(_) | Project(_) => LocalCostEstimate {
            cpu: children_stats.first().map(|c| c.total_bytes()).unwrap_or(Estimate::Unknown),
            memory: Estimate::Known(0.0),
            network: Estimate::Known(0.0),
        },
        Aggregate(_) => {
            let input_bytes = children_stats.first().map(|c| c.total_bytes()).unwrap_or(Estimate::Unknown);
            LocalCostEstimate {
                cpu: input_bytes,
                // hash table ~ groups * row size (spec §4.6).
                memory: stats.total_bytes(),
                network: Estimate::Known(0.0),
            }
        }
        Join(a) => {
            let probe_bytes = children_stats.first().map(|c| c.total_bytes()).unwrap_or(Estimate::Unknown);
            let build_bytes = children_stats.get(1).map(|c| c.total_bytes()).unwrap_or(Estimate::Unknown);
            let replicated = matches!(a.distribution_type, Some(JoinDistributionType::Replicated));
            let replication_factor = if replicated { Estimate::Unknown } else { Estimate::Known(1.0) };
            LocalCostEstimate {
                cpu: probe_bytes.add(build_bytes.mul(replication_factor)),
                memory: build_bytes.mul(replication_factor),
                network: Estimate::Known(0.0),
            }
        }
        SemiJoin(_) | SpatialJoin(_) => {
            let probe_bytes = children_stats.first().map(|c| c.total_bytes()).unwrap_or(Estimate::Unknown);
            let build_bytes = children_stats.get(1).map(|c| c.total_bytes()).unwrap_or(Estimate::Unknown);
            LocalCostEstimate {
                cpu: probe_bytes.add(build_bytes),
                memory: build_bytes,
                network: Estimate::Known(0.0),
            }
        }
        Union(_) => LocalCostEstimate::ZERO,
        Exchange(_) => LocalCostEstimate {
            cpu: Estimate::Known(0.0),
            memory: Estimate::Known(0.0),
            network: stats.total_bytes(),
        },
        TableWrite(_) => LocalCostEstimate {
            cpu: children_stats.first().map(|c| c.total_bytes()).unwrap_or(Estimate::Unknown),
            memory: Estimate::Known(0.0),
            network: Estimate::Known(0.0),
        },
        Sort(_) => LocalCostEstimate {
            cpu: children_stats.first().map(|c| c.total_bytes()).unwrap_or(Estimate::Unknown),
            // order-preserving buffering operator (spec §4.6).
            memory: children_stats.first().map(|c| c.total_bytes()).unwrap_or(Estimate::Unknown),
            network: Estimate::Known(0.0),
        },
        Limit(_) => LocalCostEstimate {
            cpu: children_stats.first().map(|c| c.total_bytes()).unwrap_or(Estimate::Unknown),
            memory: Estimate::Known(0.0),
            network: Estimate::Known(0.0),
        },
    }
}

fn cache_key(session: &SessionParameters, types: &TypeProvider) -> u64 {
    session
        .cache_fingerprint()
        .wrapping_mul(0xC2B2AE3D27D4EB4F)
        ^ crate::plan::attrs::type_provider_fingerprint(types)
}

/// Derives the cumulative cost of one specific expression (one physical
/// alternative within its group), recursing into children through their
/// group's cost-optimal member (§4.4 step 4: a child subtree is always
/// extracted at its own best cost, independent of which alternative of the
/// parent is under consideration).
pub fn derive_cost_for_expr(
    memo: &Memo,
    group_id: GroupId,
    expr_id: ExprId,
    session: &SessionParameters,
    types: &TypeProvider,
) -> PlanCostEstimate {
    let key = cache_key(session, types);
    memo.get(group_id)
        .expr_cost_cache
        .get_or_compute(key, expr_id, || {
            let expr = memo.expr(expr_id);

            let child_costs: Vec<PlanCostEstimate> = expr
                .children
                .iter()
                .map(|c| derive_cost_for_group(memo, c.group_id, session, types))
                .collect();
            let child_stats: Vec<PlanNodeStatistics> = expr
                .children
                .iter()
                .map(|c| derive_stats_for_group(memo, c.group_id, session, types))
                .collect();
            let own_stats = derive_stats_for_group(memo, group_id, session, types);

            let mut local = local_cost(&expr.attrs, &own_stats, &child_stats);
            if session.config.estimate_exchanges_in_cost {
                local = exchange::impute(&expr.attrs, local, &child_stats, session);
            }

            let cpu = child_costs.iter().fold(local.cpu, |acc, c| acc.add(c.cpu));
            let network = child_costs
                .iter()
                .fold(local.network, |acc, c| acc.add(c.network));
            let max_memory_when_outputting = child_costs
                .iter()
                .fold(Estimate::Known(0.0), |acc, c| {
                    match (acc, c.max_memory_when_outputting) {
                        (Estimate::Known(a), Estimate::Known(b)) => Estimate::Known(a.max(b)),
                        _ => Estimate::Unknown,
                    }
                })
                .add(local.memory);
            let max_memory = child_costs
                .iter()
                .fold(Estimate::Known(0.0), |acc, c| match (acc, c.max_memory) {
                    (Estimate::Known(a), Estimate::Known(b)) => Estimate::Known(a.max(b)),
                    _ => Estimate::Unknown,
                })
                .add(local.memory);

            PlanCostEstimate {
                cpu,
                max_memory,
                max_memory_when_outputting,
                network,
                root_local_estimate: local,
            }
        })
}

/// Picks `group_id`'s cost-optimal member, ties broken by insertion order
/// (lowest [`ExprId`] first) for determinism (spec §4.4 step 4).
pub fn best_member(
    memo: &Memo,
    group_id: GroupId,
    session: &SessionParameters,
    types: &TypeProvider,
) -> (ExprId, PlanCostEstimate) {
    let group = memo.get(group_id);
    group
        .members()
        .iter()
        .map(|&id| (id, derive_cost_for_expr(memo, group_id, id, session, types)))
        .min_by(|(id_a, cost_a), (id_b, cost_b)| {
            cost_a
                .order_key()
                .partial_cmp(&cost_b.order_key())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(id_a.0.cmp(&id_b.0))
        })
        .expect("a group always has at least one member")
}

/// Derives the cumulative cost of `group_id`'s cost-optimal member, cached
/// per group keyed by `(session, type_provider)` (spec §4.6 cache policy).
pub fn derive_cost_for_group(
    memo: &Memo,
    group_id: GroupId,
    session: &SessionParameters,
    types: &TypeProvider,
) -> PlanCostEstimate {
    let key = cache_key(session, types);
    memo.get(group_id).cost_cache.get_or_compute(key, || {
        best_member(memo, group_id, session, types).1
    })
}
