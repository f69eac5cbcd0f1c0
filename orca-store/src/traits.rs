//! Store traits

use crate::{CatalogEntry, NewLineItem, NewStage, StagePatch, StoreError};
use async_trait::async_trait;
use orca_core::{BudgetId, ItemId, LineItem, StageId, StageNode};

/// CRUD over a budget's stage records
#[async_trait]
pub trait StageStore: Send + Sync {
    async fn list_stages(&self, budget: &BudgetId) -> Result<Vec<StageNode>, StoreError>;

    async fn create_stage(&self, budget: &BudgetId, stage: NewStage) -> Result<StageNode, StoreError>;

    async fn update_stage(
        &self,
        budget: &BudgetId,
        id: &StageId,
        patch: StagePatch,
    ) -> Result<StageNode, StoreError>;

    async fn delete_stage(&self, budget: &BudgetId, id: &StageId) -> Result<(), StoreError>;

    /// Apply several patches, one result per patch in input order.
    /// The default issues sequential `update_stage` calls and keeps going
    /// after a failure, so every patch gets its own attempt.
    async fn update_stages(
        &self,
        budget: &BudgetId,
        patches: Vec<(StageId, StagePatch)>,
    ) -> Vec<Result<StageNode, StoreError>> {
        let mut results = Vec::with_capacity(patches.len());
        for (id, patch) in patches {
            results.push(self.update_stage(budget, &id, patch).await);
        }
        results
    }
}

/// CRUD over a budget's line items
#[async_trait]
pub trait LineItemStore: Send + Sync {
    async fn list_items(&self, budget: &BudgetId) -> Result<Vec<LineItem>, StoreError>;

    async fn create_item(&self, budget: &BudgetId, item: NewLineItem) -> Result<LineItem, StoreError>;

    /// Replace the stored item with the same id
    async fn update_item(&self, budget: &BudgetId, item: &LineItem) -> Result<LineItem, StoreError>;

    async fn delete_item(&self, budget: &BudgetId, id: &ItemId) -> Result<(), StoreError>;
}

/// Remote price catalog
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn search(&self, term: &str) -> Result<Vec<CatalogEntry>, StoreError>;

    /// Exact lookup by composition code
    async fn find(&self, code: &str) -> Result<Option<CatalogEntry>, StoreError> {
        let entries = self.search(code).await?;
        Ok(entries.into_iter().find(|e| e.code == code))
    }
}
