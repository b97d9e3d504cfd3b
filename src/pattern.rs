//! C2: the declarative pattern language used as a rule's trigger (spec
//! §4.2). A pattern is pure and re-entrant: matching either succeeds with a
//! [`Captures`] bag or fails; it never panics or raises.
//!
//! Patterns are generic over any `N: MatchNode` so the same combinators work
//! against the frozen [`crate::plan::PlanNode`] tree and against the memo's
//! expression views (`crate::rewrite::ExprView`), mirroring how the teacher
//! matched ad hoc on `LogicalPlan` variants in `rulematcher.rs` but made
//! reusable and declarative.

use crate::plan::PlanNodeAttrs;
use ahash::AHashMap;
use std::fmt;
use std::rc::Rc;

/// Anything a [`Pattern`] can match against: a node with per-variant
/// attributes and positional children.
pub trait MatchNode: Clone {
    fn attrs(&self) -> &PlanNodeAttrs;
    fn child_count(&self) -> usize;
    /// Returns the `i`-th child as a fresh, independently matchable view.
    fn child(&self, i: usize) -> Option<Self>;
}

/// A named slot a pattern binds a matched (sub-)node to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureId(pub u32);

impl fmt::Display for CaptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// The result of a successful match: `capture_slot -> node` lookups.
#[derive(Debug, Clone)]
pub struct Captures<N> {
    bindings: AHashMap<CaptureId, N>,
}

impl<N: Clone> Captures<N> {
    fn new() -> Self {
        Self {
            bindings: AHashMap::new(),
        }
    }

    fn bind(&mut self, id: CaptureId, node: N) {
        self.bindings.insert(id, node);
    }

    /// Panics if `id` was not bound by the pattern that produced these
    /// captures; rule bodies only ever ask for slots their own pattern
    /// declared, so a missing slot is a programming error, not recoverable
    /// input.
    pub fn get(&self, id: CaptureId) -> &N {
        self.bindings
            .get(&id)
            .expect("capture slot not bound by the matched pattern")
    }

    pub fn get_opt(&self, id: CaptureId) -> Option<&N> {
        self.bindings.get(&id)
    }
}

type AttrPredicate<N> = Rc<dyn Fn(&N) -> bool>;

pub enum Pattern<N> {
    /// Matches any node unconditionally.
    Any,
    /// Matches nodes whose attribute kind satisfies the given predicate,
    /// e.g. `typeof(Join)`.
    TypeOf(fn(&PlanNodeAttrs) -> bool),
    /// `with(attribute_accessor, sub_pattern)`: the node must both satisfy
    /// the accessor predicate and match the inner sub-pattern.
    With(AttrPredicate<N>, Box<Pattern<N>>),
    /// Matches a unary node's sole child against the inner pattern.
    Source(Box<Pattern<N>>),
    /// Matches each child, by position, against the corresponding pattern.
    /// Fails if the node's child count differs from the pattern count.
    Sources(Vec<Pattern<N>>),
    /// Binds the node matched by the inner pattern to `slot`.
    CapturedAs(CaptureId, Box<Pattern<N>>),
}

impl<N> Pattern<N> {
    pub fn typeof_kind(check: fn(&PlanNodeAttrs) -> bool) -> Pattern<N> {
        Pattern::TypeOf(check)
    }

    pub fn with(predicate: impl Fn(&N) -> bool + 'static, inner: Pattern<N>) -> Pattern<N> {
        Pattern::With(Rc::new(predicate), Box::new(inner))
    }

    pub fn source(inner: Pattern<N>) -> Pattern<N> {
        Pattern::Source(Box::new(inner))
    }

    pub fn sources(inner: Vec<Pattern<N>>) -> Pattern<N> {
        Pattern::Sources(inner)
    }

    pub fn captured_as(slot: CaptureId, inner: Pattern<N>) -> Pattern<N> {
        Pattern::CapturedAs(slot, Box::new(inner))
    }
}

/// Attempts to match `pattern` against `node`, returning the bound captures
/// on success. Pure: never panics, never mutates `node`.
pub fn try_match<N: MatchNode>(pattern: &Pattern<N>, node: &N) -> Option<Captures<N>> {
    let mut captures = Captures::new();
    if match_into(pattern, node, &mut captures) {
        Some(captures)
    } else {
        None
    }
}

fn match_into<N: MatchNode>(pattern: &Pattern<N>, node: &N, captures: &mut Captures<N>) -> bool {
    match pattern {
        Pattern::Any => true,
        Pattern::TypeOf(check) => check(node.attrs()),
        Pattern::With(predicate, inner) => predicate(node) && match_into(inner, node, captures),
        Pattern::Source(inner) => {
            node.child_count() == 1
                && node
                    .child(0)
                    .map(|c| match_into(inner, &c, captures))
                    .unwrap_or(false)
        }
        Pattern::Sources(patterns) => {
            node.child_count() == patterns.len()
                && patterns.iter().enumerate().all(|(i, p)| {
                    node.child(i)
                        .map(|c| match_into(p, &c, captures))
                        .unwrap_or(false)
                })
        }
        Pattern::CapturedAs(slot, inner) => {
            if match_into(inner, node, captures) {
                captures.bind(*slot, node.clone());
                true
            } else {
                false
            }
        }
    }
}
