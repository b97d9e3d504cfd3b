//! Common-predicate extraction and OR/AND distribution over filter
//! predicates (spec §8 seed scenarios 1-3).
//!
//! The conjunct-grouping technique is the same idea as the teacher's
//! `expression_utils.rs` union-find equality inference — find structurally
//! identical sub-expressions shared across branches — specialized here to
//! conjunct sets of an `OR`'s operands rather than join-key equalities.

use crate::plan::attrs::{FilterAttrs, PlanNodeAttrs};
use crate::plan::expr::Expr;
use crate::rewrite::{ExprView, Rewrite, Rule};

/// `(A AND B) OR (A AND C) -> A AND (B OR C)` when a common conjunct is
/// shared by every OR operand (scenario 1); falls through to distribution
/// when none is found and the expansion stays within budget (scenario 2);
/// leaves non-deterministic predicates untouched (scenario 3).
pub struct ExtractCommonPredicate;

impl Rule for ExtractCommonPredicate {
    fn name(&self) -> &'static str {
        "ExtractCommonPredicate"
    }

    fn apply(&self, view: ExprView) -> Rewrite {
        use crate::pattern::MatchNode;
        let PlanNodeAttrs::Filter(filter) = view.attrs() else {
            return Rewrite::Empty;
        };
        match rewrite_predicate(&filter.predicate) {
            Some(rewritten) if rewritten != filter.predicate => Rewrite::Plan(crate::memo::MemoExpr {
                attrs: PlanNodeAttrs::Filter(FilterAttrs {
                    predicate: rewritten,
                }),
                children: view.children().to_vec(),
            }),
            _ => Rewrite::Empty,
        }
    }
}

/// Rewrites a single `OR` expression per the rules above; returns `None`
/// when no productive rewrite applies (not an `OR`, too few operands, or a
/// non-deterministic operand).
fn rewrite_predicate(expr: &Expr) -> Option<Expr> {
    let Expr::Or(clauses) = expr else {
        return None;
    };
    if clauses.len() < 2 {
        return None;
    }
    // Non-deterministic operands must never be duplicated or reordered
    // (scenario 3).
    if !clauses.iter().all(Expr::is_deterministic) {
        return None;
    }

    let conjunct_sets: Vec<Vec<Expr>> = clauses
        .iter()
        .map(|c| c.conjuncts().into_iter().cloned().collect())
        .collect();

    if let Some(factored) = try_extract_common(&conjunct_sets) {
        return Some(factored);
    }
    try_distribute(&conjunct_sets)
}

/// Factors out any conjunct present in every OR operand's conjunct set
/// (scenario 1). Returns `None` if no conjunct is shared by all operands.
fn try_extract_common(conjunct_sets: &[Vec<Expr>]) -> Option<Expr> {
    let common: Vec<Expr> = conjunct_sets[0]
        .iter()
        .filter(|c| conjunct_sets[1..].iter().all(|other| other.contains(c)))
        .cloned()
        .collect();
    if common.is_empty() {
        return None;
    }

    let remainders: Vec<Expr> = conjunct_sets
        .iter()
        .map(|set| {
            let rest: Vec<Expr> = set.iter().filter(|c| !common.contains(c)).cloned().collect();
            if rest.is_empty() {
                Expr::boolean(true)
            } else {
                Expr::and(rest)
            }
        })
        .collect();

    Some(Expr::and(
        common.into_iter().chain(std::iter::once(Expr::or(remainders))),
    ))
}

/// Distributes `AND`-of-`OR` clauses into the equivalent `OR`-of-`AND`
/// cross-product (scenario 2), but only when the expanded term count stays
/// within 2x the total operand (conjunct) count — otherwise the rewrite is
/// rejected and the predicate is returned unchanged.
fn try_distribute(conjunct_sets: &[Vec<Expr>]) -> Option<Expr> {
    let sizes: Vec<usize> = conjunct_sets.iter().map(Vec::len).collect();
    let operand_count: usize = sizes.iter().sum();
    let expanded_count: usize = sizes.iter().product();
    if expanded_count > 2 * operand_count {
        return None;
    }

    let mut combinations: Vec<Vec<Expr>> = vec![Vec::new()];
    for set in conjunct_sets {
        let mut next = Vec::with_capacity(combinations.len() * set.len());
        for combo in &combinations {
            for term in set {
                let mut extended = combo.clone();
                extended.push(term.clone());
                next.push(extended);
            }
        }
        combinations = next;
    }

    let conjuncts: Vec<Expr> = combinations.into_iter().map(Expr::or).collect();
    Some(Expr::and(conjuncts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::expr::Literal;
    use crate::symbol::SymbolId;

    fn sym(id: u32) -> Expr {
        Expr::symbol(SymbolId(id))
    }

    fn rand_gt_zero() -> Expr {
        Expr::Compare {
            op: crate::plan::expr::CompareOp::Gt,
            left: Box::new(Expr::Call {
                function: "rand".into(),
                args: vec![],
                deterministic: false,
            }),
            right: Box::new(Expr::Literal(Literal::Int64(0))),
        }
    }

    #[test]
    fn extracts_common_predicate_over_or_of_and() {
        let (a, b, c) = (sym(0), sym(1), sym(2));
        let input = Expr::or(vec![
            Expr::and(vec![a.clone(), b.clone()]),
            Expr::and(vec![a.clone(), c.clone()]),
        ]);
        let rewritten = rewrite_predicate(&input).expect("should extract common factor");
        assert_eq!(rewritten, Expr::and(vec![a, Expr::or(vec![b, c])]));
    }

    #[test]
    fn distributes_when_within_expansion_budget() {
        let (a, b, c, d) = (sym(0), sym(1), sym(2), sym(3));
        let input = Expr::or(vec![
            Expr::and(vec![a.clone(), b.clone()]),
            Expr::and(vec![c.clone(), d.clone()]),
        ]);
        let rewritten = rewrite_predicate(&input).expect("should distribute within budget");
        assert_eq!(
            rewritten,
            Expr::and(vec![
                Expr::or(vec![a.clone(), c.clone()]),
                Expr::or(vec![a, d.clone()]),
                Expr::or(vec![b.clone(), c]),
                Expr::or(vec![b, d]),
            ])
        );
    }

    #[test]
    fn leaves_non_deterministic_predicate_unchanged() {
        let input = Expr::or(vec![
            Expr::and(vec![rand_gt_zero(), sym(0)]),
            Expr::and(vec![rand_gt_zero(), sym(1)]),
        ]);
        assert!(rewrite_predicate(&input).is_none());
    }
}
