//! Visitor dispatch over the plan tree (spec §4.1 `accept`), generalized
//! from the teacher's `datafusion_common::tree_node::TreeNodeVisitor` usage
//! (see `PlanStringBuilder` in the teacher's `planprinter.rs`) to this
//! crate's own plan-node enum.

use crate::plan::node::PlanNode;

/// Controls whether a visitor continues descending into children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recursion {
    Continue,
    Stop,
}

/// A visitor over the frozen plan tree. `f_down` runs before children are
/// visited, `f_up` after. The default implementations recurse into every
/// child, matching spec §4.1's "Default implementation of a visitor
/// recurses into children."
///
/// `GroupReference` never appears in this tree (it only exists inside the
/// memo, see [`crate::memo::MemoExpr`]), so a visitor over [`PlanNode`] can
/// never be handed one — satisfying spec §7's "`GroupReference` must never
/// be visited by a physical-plan visitor" by construction rather than by
/// runtime check.
pub trait PlanVisitor {
    type Error;

    fn f_down(&mut self, _node: &PlanNode) -> Result<Recursion, Self::Error> {
        Ok(Recursion::Continue)
    }

    fn f_up(&mut self, _node: &PlanNode) -> Result<Recursion, Self::Error> {
        Ok(Recursion::Continue)
    }
}

pub fn accept<V: PlanVisitor>(node: &PlanNode, visitor: &mut V) -> Result<(), V::Error> {
    if matches!(visitor.f_down(node)?, Recursion::Stop) {
        return Ok(());
    }
    for child in &node.children {
        accept(child, visitor)?;
    }
    visitor.f_up(node)?;
    Ok(())
}
