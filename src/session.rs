//! Session-tunable limits (spec §4.4) and read-only session parameters
//! (spec §5: "Session parameters are read-only snapshots").

use std::hash::{Hash, Hasher};
use xxhash_rust::xxh3::Xxh3;

/// The enumerated rewriter options of spec §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Hash)]
pub struct OptimizerConfig {
    pub max_iterations: u64,
    pub optimize_join_reordering: bool,
    pub optimize_hash_generation: bool,
    pub scaled_writers_enabled: bool,
    pub estimate_exchanges_in_cost: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            optimize_join_reordering: true,
            optimize_hash_generation: true,
            scaled_writers_enabled: true,
            estimate_exchanges_in_cost: true,
        }
    }
}

/// Free-form numeric knobs stats/cost derivation consult. Kept separate
/// from [`OptimizerConfig`] because these are derivation-tuning constants
/// rather than rewriter behavior switches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModelParameters {
    /// Default selectivity applied to a filter whose predicate shape gives
    /// no better estimate (spec §4.5).
    pub default_filter_selectivity: f64,
    /// Default selectivity applied to a non-equi join conjunct.
    pub default_join_conjunct_selectivity: f64,
    /// Estimated number of source tasks used by the exchange-aware cost
    /// wrapper (C7) when the caller does not supply one explicitly.
    pub default_source_task_count: u64,
}

impl Default for CostModelParameters {
    fn default() -> Self {
        Self {
            default_filter_selectivity: 0.25,
            default_join_conjunct_selectivity: 0.1,
            default_source_task_count: 1,
        }
    }
}

/// A read-only snapshot of everything a rewrite invocation needs from the
/// caller's session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionParameters {
    pub config: OptimizerConfig,
    pub cost_model: CostModelParameters,
}

impl Default for SessionParameters {
    fn default() -> Self {
        Self {
            config: OptimizerConfig::default(),
            cost_model: CostModelParameters::default(),
        }
    }
}

impl SessionParameters {
    /// A cheap fingerprint used as part of the stats/cost cache key (spec
    /// §4.5/§4.6: "keyed by (session-parameters, type_provider)"). Two
    /// sessions with identical tunables hash identically, so a group's
    /// cached stats/cost are safely reused across calls that share a
    /// session; a change invalidates the cache.
    pub fn cache_fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::new();
        self.config.hash(&mut hasher);
        self.cost_model.default_filter_selectivity.to_bits().hash(&mut hasher);
        self.cost_model
            .default_join_conjunct_selectivity
            .to_bits()
            .hash(&mut hasher);
        self.cost_model.default_source_task_count.hash(&mut hasher);
        hasher.finish()
    }
}
