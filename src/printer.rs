//! A plan pretty-printer (spec §4B), generalized from the teacher's
//! `PlanStringBuilder`/`planprinter.rs` off `datafusion_common`'s
//! `TreeNodeVisitor` onto this crate's own [`PlanVisitor`].

use crate::plan::attrs::PlanNodeAttrs;
use crate::plan::node::PlanNode;
use crate::plan::visitor::{accept, PlanVisitor, Recursion};
use std::fmt::Write as _;

struct PlanStringBuilder {
    output: String,
    depth: usize,
}

impl PlanStringBuilder {
    fn add_line(&mut self, text: &str) {
        let indent = "  ".repeat(self.depth);
        let _ = writeln!(self.output, "{indent}{text}");
    }
}

impl PlanVisitor for PlanStringBuilder {
    type Error = std::convert::Infallible;

    fn f_down(&mut self, node: &PlanNode) -> std::result::Result<Recursion, Self::Error> {
        self.add_line(&describe(&node.attrs));
        self.depth += 1;
        Ok(Recursion::Continue)
    }

    fn f_up(&mut self, _node: &PlanNode) -> std::result::Result<Recursion, Self::Error> {
        self.depth = self.depth.saturating_sub(1);
        Ok(Recursion::Continue)
    }
}

fn describe(attrs: &PlanNodeAttrs) -> String {
    use PlanNodeAttrs::*;
    match attrs {
        TableScan(a) => format!("TableScan: {}", a.table_name),
        Filter(a) => format!("Filter: {}", a.predicate),
        Project(a) => format!(
            "Project: {}",
            a.assignments
                .iter()
                .map(|(s, e)| format!("{s} = {e}"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Aggregate(a) => format!(
            "Aggregate: group by [{}], {} aggregate(s)",
            a.grouping_set
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            a.aggregations.len()
        ),
        Join(a) => format!("Join: {:?} on {} key(s)", a.join_type, a.equi_keys.len()),
        SemiJoin(_) => "SemiJoin".to_string(),
        SpatialJoin(_) => "SpatialJoin".to_string(),
        Union(_) => "Union".to_string(),
        Exchange(a) => format!("Exchange: {:?}", a.partitioning),
        TableWrite(a) => format!("TableWrite: {}", a.target),
        TableFunction(a) => format!("TableFunction: {}", a.function_name),
        Values(a) => format!("Values: {} row(s)", a.row_count),
        Sort(a) => format!("Sort: {} key(s)", a.order_by.len()),
        Limit(a) => format!("Limit: {}", a.count),
    }
}

/// Renders `plan` as an indented, human-readable explain string.
pub fn explain(plan: &PlanNode) -> String {
    let mut builder = PlanStringBuilder {
        output: String::new(),
        depth: 0,
    };
    let _ = accept(plan, &mut builder);
    builder.output
}
