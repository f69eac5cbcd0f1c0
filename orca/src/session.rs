//! Open budget
//!
//! One session owns the stage tree (through its coordinator) and the line
//! items of a single budget, and recomputes the cost summary on demand.

use crate::ItemDraft;
use orca_core::{BudgetId, ItemId, LineItem, OrcaError, Settings};
use orca_stages::{aggregate, CostSummary, StageCoordinator, StageTree};
use orca_store::{CatalogEntry, LineItemStore, StageStore};
use std::sync::Arc;
use tracing::info;

pub struct BudgetSession<S> {
    budget: BudgetId,
    store: Arc<S>,
    stages: StageCoordinator<S>,
    items: Vec<LineItem>,
    settings: Settings,
}

impl<S: StageStore + LineItemStore + 'static> BudgetSession<S> {
    pub async fn open(store: Arc<S>, budget: BudgetId, settings: Settings) -> Result<Self, OrcaError> {
        let stages = StageCoordinator::load(store.clone(), budget.clone()).await?;
        let items = store.list_items(&budget).await?;
        info!(budget = %budget, items = items.len(), "budget opened");
        Ok(Self { budget, store, stages, items, settings })
    }

    pub fn budget(&self) -> &BudgetId {
        &self.budget
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Stage operations: insert, rename, remove, drag and drop
    pub fn stages(&self) -> &StageCoordinator<S> {
        &self.stages
    }

    pub fn tree(&self) -> StageTree {
        self.stages.snapshot()
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn item(&self, id: &ItemId) -> Option<&LineItem> {
        self.items.iter().find(|i| &i.id == id)
    }

    pub fn summary(&self) -> CostSummary {
        aggregate(&self.items, &self.stages.snapshot())
    }

    pub fn new_item(&self, entry: &CatalogEntry) -> ItemDraft {
        ItemDraft::from_catalog(entry, &self.settings)
    }

    pub fn edit_item(&self, id: &ItemId) -> Result<ItemDraft, OrcaError> {
        self.item(id)
            .map(|item| ItemDraft::from_item(item, &self.settings))
            .ok_or_else(|| OrcaError::ItemNotFound(id.clone()))
    }

    /// Validate and store a draft, creating or replacing the item
    pub async fn save_item(&mut self, draft: &ItemDraft) -> Result<LineItem, OrcaError> {
        let record = draft.to_record(&self.stages.snapshot())?;

        let saved = match draft.id() {
            Some(id) => {
                if self.item(id).is_none() {
                    return Err(OrcaError::ItemNotFound(id.clone()));
                }
                self.store
                    .update_item(&self.budget, &record.into_item(id.clone()))
                    .await?
            }
            None => self.store.create_item(&self.budget, record).await?,
        };

        info!(item = %saved.id, quantity = %saved.quantity, "line item saved");
        match self.items.iter_mut().find(|i| i.id == saved.id) {
            Some(existing) => *existing = saved.clone(),
            None => self.items.push(saved.clone()),
        }
        Ok(saved)
    }

    pub async fn remove_item(&mut self, id: &ItemId) -> Result<LineItem, OrcaError> {
        let index = self
            .items
            .iter()
            .position(|i| &i.id == id)
            .ok_or_else(|| OrcaError::ItemNotFound(id.clone()))?;
        self.store.delete_item(&self.budget, id).await?;
        Ok(self.items.remove(index))
    }

    /// Refetch the items, e.g. after another session changed them
    pub async fn reload_items(&mut self) -> Result<(), OrcaError> {
        self.items = self.store.list_items(&self.budget).await?;
        Ok(())
    }
}
