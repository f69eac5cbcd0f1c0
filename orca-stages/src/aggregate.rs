//! Cost roll-up
//!
//! Pure function of the items and the tree; neither input is modified, so
//! it can be rerun after every change.

use crate::StageTree;
use orca_core::{LineItem, Number, StageId};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CostSummary {
    /// Stage subtotal including every descendant stage
    pub per_stage: BTreeMap<StageId, Number>,
    /// Items assigned to the stage itself
    pub direct: BTreeMap<StageId, Number>,
    /// Items with no stage, or one that is not in the tree
    pub unassigned: Number,
    /// Every item, whatever its stage
    pub grand_total: Number,
}

impl CostSummary {
    pub fn subtotal(&self, id: &StageId) -> Option<&Number> {
        self.per_stage.get(id)
    }

    pub fn direct_total(&self, id: &StageId) -> Option<&Number> {
        self.direct.get(id)
    }
}

pub fn aggregate(items: &[LineItem], tree: &StageTree) -> CostSummary {
    let mut direct: BTreeMap<StageId, Number> =
        tree.nodes().map(|n| (n.id.clone(), Number::zero())).collect();
    let mut unassigned = Number::zero();

    for item in items {
        let total = item.line_total();
        match item.stage_id.as_ref().and_then(|id| direct.get_mut(id)) {
            Some(bucket) => *bucket = bucket.add(&total),
            None => unassigned = unassigned.add(&total),
        }
    }

    let per_stage = tree
        .nodes()
        .map(|node| {
            let own = direct.get(&node.id).cloned().unwrap_or_default();
            let below: Number = tree
                .descendants(&node.id)
                .into_iter()
                .filter_map(|d| direct.get(&d.id))
                .sum();
            (node.id.clone(), own.add(&below))
        })
        .collect();

    let grand_total: Number = items.iter().map(LineItem::line_total).sum();
    trace!(items = items.len(), stages = tree.len(), total = %grand_total, "aggregated");

    CostSummary { per_stage, direct, unassigned, grand_total }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_core::{ItemId, StageNode};

    fn num(s: &str) -> Number {
        Number::from_str(s).unwrap()
    }

    fn sid(s: &str) -> StageId {
        StageId::new(s)
    }

    fn item(id: &str, stage: Option<&str>, quantity: &str, price: &str) -> LineItem {
        LineItem {
            id: ItemId::new(id),
            composition_code: format!("C-{}", id),
            description: id.to_string(),
            unit: "un".to_string(),
            unit_price: num(price),
            quantity: num(quantity),
            stage_id: stage.map(sid),
            formula: None,
            variables: vec![],
        }
    }

    fn stage(id: &str, parent: Option<&str>, order: u32) -> StageNode {
        StageNode { id: sid(id), name: id.to_string(), parent_id: parent.map(sid), order }
    }

    /// estrutura > fundacao > (sapatas, vigas), acabamento
    fn three_levels() -> StageTree {
        StageTree::from_nodes(vec![
            stage("estrutura", None, 0),
            stage("acabamento", None, 1),
            stage("fundacao", Some("estrutura"), 0),
            stage("sapatas", Some("fundacao"), 0),
            stage("vigas", Some("fundacao"), 1),
        ])
    }

    #[test]
    fn test_rolls_up_through_levels() {
        let tree = three_levels();
        let items = vec![
            item("1", Some("sapatas"), "20", "100"),
            item("2", Some("vigas"), "2,5", "40"),
            item("3", Some("sapatas"), "1", "0,5"),
            item("4", Some("acabamento"), "3", "10"),
        ];
        let summary = aggregate(&items, &tree);

        assert_eq!(summary.subtotal(&sid("sapatas")), Some(&num("2000.5")));
        assert_eq!(summary.subtotal(&sid("vigas")), Some(&num("100")));
        assert_eq!(summary.subtotal(&sid("fundacao")), Some(&num("2100.5")));
        assert_eq!(summary.subtotal(&sid("estrutura")), Some(&num("2100.5")));
        assert_eq!(summary.subtotal(&sid("acabamento")), Some(&num("30")));
        assert_eq!(summary.direct_total(&sid("fundacao")), Some(&Number::zero()));
        assert_eq!(summary.grand_total, num("2130.5"));
        assert_eq!(summary.unassigned, Number::zero());
    }

    #[test]
    fn test_parent_items_count_once() {
        let tree = three_levels();
        let items = vec![
            item("1", Some("fundacao"), "1", "10"),
            item("2", Some("sapatas"), "1", "5"),
        ];
        let summary = aggregate(&items, &tree);
        assert_eq!(summary.subtotal(&sid("fundacao")), Some(&num("15")));
        assert_eq!(summary.direct_total(&sid("fundacao")), Some(&num("10")));
        assert_eq!(summary.subtotal(&sid("estrutura")), Some(&num("15")));
    }

    #[test]
    fn test_orphaned_items_are_unassigned() {
        let tree = three_levels();
        let items = vec![
            item("1", Some("removed"), "2", "10"),
            item("2", None, "1", "7"),
            item("3", Some("vigas"), "1", "3"),
        ];
        let summary = aggregate(&items, &tree);
        assert_eq!(summary.unassigned, num("27"));
        assert_eq!(summary.grand_total, num("30"));
        assert!(summary.subtotal(&sid("removed")).is_none());
    }

    #[test]
    fn test_empty_tree_falls_back_to_unassigned() {
        let items = vec![item("1", Some("sapatas"), "4", "2,5"), item("2", None, "1", "1")];
        let summary = aggregate(&items, &StageTree::new());
        assert!(summary.per_stage.is_empty());
        assert_eq!(summary.unassigned, num("11"));
        assert_eq!(summary.grand_total, num("11"));
    }

    #[test]
    fn test_no_items() {
        let summary = aggregate(&[], &three_levels());
        assert_eq!(summary.grand_total, Number::zero());
        assert_eq!(summary.subtotal(&sid("estrutura")), Some(&Number::zero()));
    }
}
