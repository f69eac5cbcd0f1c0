//! Record and patch types exchanged with the store

use orca_core::{ItemId, LineItem, Number, StageId, StageNode, Variable};
use serde::{Deserialize, Serialize};

/// Stage to be created; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStage {
    pub name: String,
    pub parent_id: Option<StageId>,
    pub order: u32,
}

/// Partial stage update. `parent_id: Some(None)` moves the stage to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<StageId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl StagePatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn order(order: u32) -> Self {
        Self { order: Some(order), ..Self::default() }
    }

    pub fn placement(parent_id: Option<StageId>, order: u32) -> Self {
        Self { parent_id: Some(parent_id), order: Some(order), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.parent_id.is_none() && self.order.is_none()
    }

    pub fn apply_to(&self, node: &mut StageNode) {
        if let Some(name) = &self.name {
            node.name = name.clone();
        }
        if let Some(parent_id) = &self.parent_id {
            node.parent_id = parent_id.clone();
        }
        if let Some(order) = self.order {
            node.order = order;
        }
    }
}

/// Line item to be created; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLineItem {
    pub composition_code: String,
    pub description: String,
    pub unit: String,
    pub unit_price: Number,
    pub quantity: Number,
    pub stage_id: Option<StageId>,
    pub formula: Option<String>,
    pub variables: Vec<Variable>,
}

impl NewLineItem {
    pub fn into_item(self, id: ItemId) -> LineItem {
        LineItem {
            id,
            composition_code: self.composition_code,
            description: self.description,
            unit: self.unit,
            unit_price: self.unit_price,
            quantity: self.quantity,
            stage_id: self.stage_id,
            formula: self.formula,
            variables: self.variables,
        }
    }
}

/// Priced composition from the external catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: String,
    pub description: String,
    pub unit: String,
    pub unit_price: Number,
}
