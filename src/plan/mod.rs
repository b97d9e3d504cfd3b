//! C1: the plan-node data model and its traversal / replacement discipline.

pub mod attrs;
pub mod expr;
pub mod node;
pub mod visitor;

pub use attrs::{Arity, PlanNodeAttrs};
pub use expr::Expr;
pub use node::{GroupId, GroupReference, PlanNode, PlanNodeId, PlanNodeIdAllocator};
pub use visitor::{accept, PlanVisitor, Recursion};
