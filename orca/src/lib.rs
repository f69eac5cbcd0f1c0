//! Orca - construction budget core
//!
//! Line items get their quantities from small arithmetic formulas, are
//! grouped under a reorderable hierarchy of stages, and are costed with
//! subtotals rolled up through that hierarchy.
//!
//! ```ignore
//! let store = Arc::new(MemoryStore::new());
//! let mut session = BudgetSession::open(store, BudgetId::new("obra"), Settings::default()).await?;
//! let fundacao = session.stages().insert_stage("Fundação", None).await?;
//! ```

mod items;
mod session;

pub use items::{search_catalog, ItemDraft};
pub use session::BudgetSession;

pub use orca_core::{
    codes, BudgetId, ErrorReport, ItemId, LineItem, Number, OrcaError, Settings, StageId,
    StageNode, Variable, VariableId,
};
pub use orca_formula::{evaluate, AppliedFormula, Evaluator, FormulaEditor, VariableSet};
pub use orca_stages::{aggregate, CostSummary, DragGesture, ReorderOutcome, StageCoordinator, StageTree};
pub use orca_store::{
    Catalog, CatalogEntry, LineItemStore, MemoryStore, NewLineItem, NewStage, StagePatch,
    StageStore, StoreError,
};
