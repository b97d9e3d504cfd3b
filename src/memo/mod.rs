//! C3: the memo. An arena of groups and expressions, addressed by integer
//! ids rather than the teacher's `Rc<RefCell<Group>>` graph (spec §9's
//! re-architecture point, grounded in the retrieval pack's own arena-based
//! Cascades optimizer, `optd-core`, which uses the same `GroupId`/`ExprId`
//! newtype-over-integer pattern).
//!
//! The teacher's *technique* survives: canonicalize an expression by hashing
//! its attributes plus its children's group identities with `xxhash-rust`'s
//! `Xxh3`, then look it up in an `ahash::AHashMap` before minting a new
//! group (`disagg_optimizer`'s `gen_or_get_from_memo`) — just pointing at
//! arena indices instead of `Rc` targets.

use crate::cost::PlanCostEstimate;
use crate::plan::{GroupId, GroupReference, PlanNode, PlanNodeAttrs};
use crate::stats::PlanNodeStatistics;
use crate::symbol::SymbolId;
use ahash::{AHashMap, AHashSet};
use std::cell::{Cell, RefCell};
use std::hash::{Hash, Hasher};
use xxhash_rust::xxh3::Xxh3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

/// A memo expression: the same per-variant attributes as [`PlanNode`], but
/// with children replaced by [`GroupReference`]s (spec §3: "each
/// expression's children are *group references*, not nodes").
#[derive(Debug, Clone, PartialEq)]
pub struct MemoExpr {
    pub attrs: PlanNodeAttrs,
    pub children: Vec<GroupReference>,
}

impl MemoExpr {
    fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::new();
        self.attrs.hash(&mut hasher);
        for child in &self.children {
            child.group_id.0.hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// A lazily-computed, cached value keyed by a cheap fingerprint of the
/// context that produced it (spec §4.5/§4.6: "cached per memo group",
/// "keyed by (group_id, session_parameters, type_provider)"). A group lives
/// for one memo, and one memo is built for one (session, type-provider)
/// pair, so a single slot invalidated on key mismatch is sufficient.
#[derive(Debug, Default)]
pub struct Memoized<V> {
    key: Cell<Option<u64>>,
    value: RefCell<Option<V>>,
}

impl<V: Clone> Memoized<V> {
    pub fn get_or_compute(&self, key: u64, compute: impl FnOnce() -> V) -> V {
        if self.key.get() != Some(key) {
            let computed = compute();
            *self.value.borrow_mut() = Some(computed.clone());
            self.key.set(Some(key));
            computed
        } else {
            self.value
                .borrow()
                .clone()
                .expect("cache slot populated whenever its key is set")
        }
    }

    pub fn invalidate(&self) {
        self.key.set(None);
        *self.value.borrow_mut() = None;
    }
}

/// Per-expression cost cache: costs are a property of a *physical*
/// alternative (one member of a group), not of the equivalence class itself
/// (commuting a join changes its cost but not its group). The whole cache
/// is invalidated in one shot when the (session, type-provider) key changes,
/// rather than tracking a key per member — cheap, since the common case is
/// "one session's worth of derivations per memo lifetime".
#[derive(Debug, Default)]
pub struct ExprCostCache {
    key: Cell<Option<u64>>,
    values: RefCell<AHashMap<ExprId, PlanCostEstimate>>,
}

impl ExprCostCache {
    pub fn get_or_compute(
        &self,
        key: u64,
        expr_id: ExprId,
        compute: impl FnOnce() -> PlanCostEstimate,
    ) -> PlanCostEstimate {
        if self.key.get() != Some(key) {
            self.values.borrow_mut().clear();
            self.key.set(Some(key));
        }
        if let Some(v) = self.values.borrow().get(&expr_id) {
            return v.clone();
        }
        let computed = compute();
        self.values.borrow_mut().insert(expr_id, computed.clone());
        computed
    }
}

/// A group: an equivalence class of plan-node expressions known to be
/// logically equivalent (spec §3). Holds the members' [`ExprId`]s rather
/// than owning the expressions directly; the memo's `exprs` arena is the
/// sole owner.
///
/// Statistics (row counts, NDVs) are cached once per group: every member is
/// logically equivalent, so they agree on cardinality. Cost is cached once
/// per *expression*, since two equivalent expressions (e.g. a join and its
/// commuted form) can cost differently — see [`ExprCostCache`]. `cost_cache`
/// additionally holds the group's cost-optimal member's cumulative cost,
/// satisfying the `(group_id, session, type_provider)` keying spec §4.6
/// names for callers that only care about "this group's best cost".
#[derive(Debug)]
pub struct Group {
    pub id: GroupId,
    pub output_symbols: Vec<SymbolId>,
    members: Vec<ExprId>,
    pub(crate) stats_cache: Memoized<PlanNodeStatistics>,
    pub(crate) cost_cache: Memoized<PlanCostEstimate>,
    pub(crate) expr_cost_cache: ExprCostCache,
}

impl Group {
    pub fn members(&self) -> &[ExprId] {
        &self.members
    }
}

/// The memo table (C3): group-based equivalence store, rebuilt fresh for
/// every rewrite invocation and discarded with it (spec §3 lifecycle).
#[derive(Debug, Default)]
pub struct Memo {
    groups: Vec<Group>,
    exprs: Vec<MemoExpr>,
    expr_group: Vec<GroupId>,
    fingerprints: AHashMap<u64, GroupId>,
    /// `child group -> groups with an expression referencing it as a child`
    /// (spec §4.4 step 3.b: "re-enqueue the group and its ancestors").
    /// Populated whenever an expression is actually added to the arena, in
    /// `intern` and in `replace`'s genuine-insertion path.
    parents: AHashMap<GroupId, AHashSet<GroupId>>,
    root: Option<GroupId>,
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_group(&self) -> GroupId {
        self.root.expect("memo has no root; insert a plan first")
    }

    pub fn get(&self, group_id: GroupId) -> &Group {
        &self.groups[group_id.0 as usize]
    }

    pub fn expr(&self, expr_id: ExprId) -> &MemoExpr {
        &self.exprs[expr_id.0 as usize]
    }

    pub fn group_of(&self, expr_id: ExprId) -> GroupId {
        self.expr_group[expr_id.0 as usize]
    }

    pub fn all_group_ids(&self) -> Vec<GroupId> {
        (0..self.groups.len() as u32).map(GroupId).collect()
    }

    /// Inserts a frozen plan tree into the memo, recursively creating groups
    /// for its children and replacing them with [`GroupReference`]s (spec
    /// §4.3). Returns the root group id; if an identical expression (same
    /// variant, attributes, *and* child group identities — invariant 4) is
    /// already present, the existing group is returned and nothing is
    /// duplicated.
    pub fn insert(&mut self, node: &PlanNode) -> GroupId {
        let group_id = self.insert_rec(node);
        self.root = Some(group_id);
        group_id
    }

    fn insert_rec(&mut self, node: &PlanNode) -> GroupId {
        let child_refs: Vec<GroupReference> = node
            .children
            .iter()
            .map(|child| {
                let child_group = self.insert_rec(child);
                GroupReference {
                    group_id: child_group,
                    output_symbols: self.get(child_group).output_symbols.clone(),
                }
            })
            .collect();

        let expr = MemoExpr {
            attrs: node.attrs.clone(),
            children: child_refs,
        };
        self.intern(expr, Some(node.output_symbols()))
    }

    /// Adds `new_expression` to `group_id`'s equivalence set (spec §4.3
    /// `replace`); never destroys previous members. If `new_expression` is
    /// structurally identical to something already in the memo (anywhere),
    /// it is not duplicated: the group it already belongs to keeps sole
    /// ownership, matching the dedup behavior of `insert`. The `bool` is
    /// `true` only when a genuinely new member was added to the arena; a
    /// rule re-deriving a shape the memo already knows about (e.g. a join
    /// commutativity rule re-producing the original after commuting twice)
    /// reports `false` so callers don't treat it as further progress.
    pub fn replace(&mut self, group_id: GroupId, new_expression: MemoExpr) -> (ExprId, bool) {
        let fingerprint = new_expression.fingerprint();
        if let Some(&existing_group) = self.fingerprints.get(&fingerprint) {
            if existing_group == group_id {
                let expr_id = self.group(group_id).members.last().copied().unwrap_or_else(|| {
                    self.find_member_with_fingerprint(group_id, fingerprint)
                        .expect("fingerprint present in this group")
                });
                return (expr_id, false);
            }
            // Already known equivalent via a different derivation path; the
            // memo keeps its first-registered home for that shape and does
            // not merge groups (spec §4.3 describes no merge operation).
            let expr_id = self
                .find_member_with_fingerprint(existing_group, fingerprint)
                .expect("fingerprint map points at a group containing it");
            return (expr_id, false);
        }

        let expr_id = ExprId(self.exprs.len() as u32);
        self.link_parents(group_id, &new_expression.children);
        self.exprs.push(new_expression);
        self.expr_group.push(group_id);
        self.fingerprints.insert(fingerprint, group_id);
        self.group_mut(group_id).members.push(expr_id);
        (expr_id, true)
    }

    fn link_parents(&mut self, parent: GroupId, children: &[GroupReference]) {
        for child in children {
            self.parents.entry(child.group_id).or_default().insert(parent);
        }
    }

    /// Every group transitively reachable by following "is referenced as a
    /// child by" upward from `group_id`, i.e. its ancestors (spec §4.4 step
    /// 3.b). Does not include `group_id` itself.
    pub fn ancestors_of(&self, group_id: GroupId) -> AHashSet<GroupId> {
        let mut result = AHashSet::default();
        let mut stack = vec![group_id];
        while let Some(g) = stack.pop() {
            if let Some(parents) = self.parents.get(&g) {
                for &p in parents {
                    if result.insert(p) {
                        stack.push(p);
                    }
                }
            }
        }
        result
    }

    fn find_member_with_fingerprint(&self, group_id: GroupId, fingerprint: u64) -> Option<ExprId> {
        self.get(group_id)
            .members
            .iter()
            .copied()
            .find(|&id| self.expr(id).fingerprint() == fingerprint)
    }

    fn intern(&mut self, expr: MemoExpr, output_symbols: Option<Vec<SymbolId>>) -> GroupId {
        let fingerprint = expr.fingerprint();
        if let Some(&existing) = self.fingerprints.get(&fingerprint) {
            return existing;
        }

        let output_symbols = output_symbols.unwrap_or_else(|| {
            let child_outputs: Vec<Vec<SymbolId>> = expr
                .children
                .iter()
                .map(|c| c.output_symbols.clone())
                .collect();
            crate::plan::node::output_symbols_from(&expr.attrs, &child_outputs)
        });

        let group_id = GroupId(self.groups.len() as u32);
        let expr_id = ExprId(self.exprs.len() as u32);

        self.groups.push(Group {
            id: group_id,
            output_symbols,
            members: vec![expr_id],
            stats_cache: Memoized::default(),
            cost_cache: Memoized::default(),
            expr_cost_cache: ExprCostCache::default(),
        });
        self.link_parents(group_id, &expr.children);
        self.exprs.push(expr);
        self.expr_group.push(group_id);
        self.fingerprints.insert(fingerprint, group_id);
        group_id
    }

    fn group(&self, group_id: GroupId) -> &Group {
        &self.groups[group_id.0 as usize]
    }

    fn group_mut(&mut self, group_id: GroupId) -> &mut Group {
        &mut self.groups[group_id.0 as usize]
    }

    /// Interns an expression produced by a rule directly (used by the
    /// rewriter, C4, which builds `MemoExpr`s with already-resolved child
    /// group references rather than a concrete [`PlanNode`] subtree).
    pub fn insert_expr(&mut self, expr: MemoExpr) -> GroupId {
        self.intern(expr, None)
    }
}
