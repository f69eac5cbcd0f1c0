//! Budget records
//!
//! Plain data shared by every crate. Stage nodes are stored flat and the
//! hierarchy is derived from `parent_id`/`order`.

use crate::{ItemId, Number, StageId, VariableId};
use serde::{Deserialize, Serialize};

/// Named scalar bound to one line item's formula
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub id: VariableId,
    pub name: String,
    pub value: Number,
}

/// One node of the stage forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageNode {
    pub id: StageId,
    pub name: String,
    pub parent_id: Option<StageId>,
    /// Position among siblings sharing `parent_id`
    pub order: u32,
}

/// One priced, quantified row of a budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: ItemId,
    pub composition_code: String,
    pub description: String,
    pub unit: String,
    pub unit_price: Number,
    /// The value used for costing. When `formula` is present this equals
    /// its last evaluation under `variables`.
    pub quantity: Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<StageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,
}

impl LineItem {
    /// quantity * unit price
    pub fn line_total(&self) -> Number {
        self.quantity.mul(&self.unit_price)
    }
}
