//! Orca Core - Fundamental types
//!
//! This crate provides the core types used throughout Orca:
//! - `Number`: Decimal quantities, prices and totals
//! - `StageNode`, `LineItem`, `Variable`: Budget records
//! - `OrcaError`: Structured errors for inline feedback
//! - `Settings`: Evaluator and variable-manager knobs

mod config;
mod error;
mod ids;
mod model;
mod number;

pub use config::Settings;
pub use error::{codes, ErrorReport, OrcaError};
pub use ids::{BudgetId, ItemId, StageId, VariableId};
pub use model::{LineItem, StageNode, Variable};
pub use number::{Number, NumberError};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::codes;
    pub use crate::{
        BudgetId, ItemId, LineItem, Number, OrcaError, Settings, StageId, StageNode, Variable,
        VariableId,
    };
}
