//! Join reordering rules, grounded in the teacher's
//! `apply_join_commutativity`/`apply_join_associativity` (`cascades.rs`).

use crate::pattern::MatchNode;
use crate::plan::attrs::{JoinAttrs, PlanNodeAttrs};
use crate::rewrite::{ExprView, Rewrite, Rule};

/// `A JOIN B -> B JOIN A` (inner joins only; commuting a left/right/full
/// outer join changes semantics, so those are left alone). Swaps child
/// group references and equi-key sides; residual filter and distribution
/// hint carry over unchanged.
pub struct CommuteJoin;

impl Rule for CommuteJoin {
    fn name(&self) -> &'static str {
        "CommuteJoin"
    }

    fn apply(&self, view: ExprView) -> Rewrite {
        let PlanNodeAttrs::Join(join) = view.attrs() else {
            return Rewrite::Empty;
        };
        if join.join_type != crate::plan::attrs::JoinType::Inner {
            return Rewrite::Empty;
        }
        let children = view.children();
        if children.len() != 2 {
            return Rewrite::Failed(format!(
                "join node has {} children, expected 2",
                children.len()
            ));
        }

        let swapped_keys = join.equi_keys.iter().map(|(l, r)| (*r, *l)).collect();
        let mut output_symbols = children[1].output_symbols.clone();
        output_symbols.extend(children[0].output_symbols.iter().copied());

        Rewrite::Plan(crate::memo::MemoExpr {
            attrs: PlanNodeAttrs::Join(JoinAttrs {
                join_type: join.join_type,
                equi_keys: swapped_keys,
                filter: join.filter.clone(),
                distribution_type: join.distribution_type,
                output_symbols,
            }),
            children: vec![children[1].clone(), children[0].clone()],
        })
    }
}
