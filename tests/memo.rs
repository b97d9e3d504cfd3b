//! Black-box checks of the memo's arena semantics (C3, spec §4.3):
//! fingerprint-based dedup, ancestor tracking, and `replace`'s
//! genuine-insertion signal (spec §4.4 step 3.b, the work-set re-enqueue
//! fix).

use cascade_optimizer::memo::{Memo, MemoExpr};
use cascade_optimizer::plan::attrs::{JoinAttrs, JoinType, PlanNodeAttrs, TableScanAttrs};
use cascade_optimizer::plan::node::{GroupReference, PlanNode, PlanNodeIdAllocator};
use cascade_optimizer::symbol::SymbolId;

fn scan(ids: &PlanNodeIdAllocator, name: &str, sym: SymbolId) -> PlanNode {
    PlanNode::leaf(
        ids.fresh(),
        PlanNodeAttrs::TableScan(TableScanAttrs {
            table_name: name.into(),
            output_symbols: vec![sym],
        }),
    )
    .unwrap()
}

fn join(left: &PlanNode, right: &PlanNode) -> PlanNode {
    let ids = PlanNodeIdAllocator::default();
    let mut output_symbols = left.output_symbols();
    output_symbols.extend(right.output_symbols());
    PlanNode::new(
        ids.fresh(),
        PlanNodeAttrs::Join(JoinAttrs {
            join_type: JoinType::Inner,
            equi_keys: vec![],
            filter: None,
            distribution_type: None,
            output_symbols,
        }),
        vec![left.clone(), right.clone()],
    )
    .unwrap()
}

#[test]
fn insert_dedups_identical_subtrees_across_calls() {
    let ids = PlanNodeIdAllocator::default();
    let a = scan(&ids, "a", SymbolId(0));
    let b = scan(&ids, "b", SymbolId(1));
    let plan = join(&a, &b);

    let mut memo = Memo::new();
    let g1 = memo.insert(&plan);
    let g2 = memo.insert(&plan);
    assert_eq!(g1, g2);
    // 2 scans + 1 join, no duplicate groups created by the second insert.
    assert_eq!(memo.all_group_ids().len(), 3);
}

#[test]
fn replace_reports_new_only_on_genuine_insertion() {
    let ids = PlanNodeIdAllocator::default();
    let a = scan(&ids, "a", SymbolId(0));
    let b = scan(&ids, "b", SymbolId(1));
    let plan = join(&a, &b);

    let mut memo = Memo::new();
    let root = memo.insert(&plan);
    let ga = memo.expr(memo.get(root).members()[0]).children[0].group_id;
    let gb = memo.expr(memo.get(root).members()[0]).children[1].group_id;

    let commuted = MemoExpr {
        attrs: PlanNodeAttrs::Join(JoinAttrs {
            join_type: JoinType::Inner,
            equi_keys: vec![],
            filter: None,
            distribution_type: None,
            output_symbols: vec![SymbolId(1), SymbolId(0)],
        }),
        children: vec![
            GroupReference {
                group_id: gb,
                output_symbols: vec![SymbolId(1)],
            },
            GroupReference {
                group_id: ga,
                output_symbols: vec![SymbolId(0)],
            },
        ],
    };

    let (first_id, first_is_new) = memo.replace(root, commuted.clone());
    assert!(first_is_new, "the commuted form is not yet in the group");
    assert_eq!(memo.get(root).members().len(), 2);

    let (second_id, second_is_new) = memo.replace(root, commuted);
    assert!(!second_is_new, "re-deriving the same shape must not be reported as new");
    assert_eq!(first_id, second_id, "the same member is returned both times");
    assert_eq!(memo.get(root).members().len(), 2, "no duplicate member added");
}

#[test]
fn ancestors_of_includes_transitive_parents() {
    let ids = PlanNodeIdAllocator::default();
    let a = scan(&ids, "a", SymbolId(0));
    let b = scan(&ids, "b", SymbolId(1));
    let c = scan(&ids, "c", SymbolId(2));
    let ab = join(&a, &b);
    let abc = join(&ab, &c);

    let mut memo = Memo::new();
    let root = memo.insert(&abc);
    let ab_group = memo.expr(memo.get(root).members()[0]).children[0].group_id;
    let a_group = memo.expr(memo.get(ab_group).members()[0]).children[0].group_id;

    let ancestors = memo.ancestors_of(a_group);
    assert!(ancestors.contains(&ab_group), "the direct parent is an ancestor");
    assert!(ancestors.contains(&root), "the grandparent is an ancestor too");
    assert!(!ancestors.contains(&a_group), "a group is not its own ancestor");
}

#[test]
fn leaf_group_has_no_ancestors() {
    let ids = PlanNodeIdAllocator::default();
    let a = scan(&ids, "a", SymbolId(0));
    let mut memo = Memo::new();
    let root = memo.insert(&a);
    assert!(memo.ancestors_of(root).is_empty());
}
