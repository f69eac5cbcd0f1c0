//! In-memory store
//!
//! Implements every store trait over plain maps. Used by tests and demos;
//! faults can be injected per stage id or for the next N calls, and stage
//! calls are counted so tests can check how many round trips a gesture cost.

use crate::{
    Catalog, CatalogEntry, LineItemStore, NewLineItem, NewStage, StagePatch, StageStore,
    StoreError,
};
use async_trait::async_trait;
use orca_core::{BudgetId, ItemId, LineItem, StageId, StageNode};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct State {
    stages: HashMap<BudgetId, Vec<StageNode>>,
    items: HashMap<BudgetId, Vec<LineItem>>,
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Default)]
struct Faults {
    /// Updates touching these stage ids are rejected
    failing_stages: HashSet<StageId>,
    /// Fail this many upcoming calls of any kind
    fail_next: usize,
    /// Fail this many upcoming stage listings
    fail_lists: usize,
    offline: bool,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    faults: Mutex<Faults>,
    stage_updates: AtomicUsize,
    stage_lists: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Seeding ==========

    pub fn with_stages(mut self, budget: &BudgetId, stages: Vec<StageNode>) -> Self {
        self.state.get_mut().stages.insert(budget.clone(), stages);
        self
    }

    pub fn with_items(mut self, budget: &BudgetId, items: Vec<LineItem>) -> Self {
        self.state.get_mut().items.insert(budget.clone(), items);
        self
    }

    pub fn with_catalog(mut self, entries: Vec<CatalogEntry>) -> Self {
        self.state.get_mut().catalog = entries;
        self
    }

    /// Snapshot of the stored stages, as another session would read them
    pub async fn stored_stages(&self, budget: &BudgetId) -> Vec<StageNode> {
        self.state.lock().await.stages.get(budget).cloned().unwrap_or_default()
    }

    pub async fn stored_items(&self, budget: &BudgetId) -> Vec<LineItem> {
        self.state.lock().await.items.get(budget).cloned().unwrap_or_default()
    }

    /// Delete a stage behind the session's back, as a concurrent session would
    pub async fn remove_stage_externally(&self, budget: &BudgetId, id: &StageId) {
        let mut state = self.state.lock().await;
        if let Some(stages) = state.stages.get_mut(budget) {
            stages.retain(|s| &s.id != id);
        }
    }

    // ========== Fault injection ==========

    pub async fn fail_stage_updates(&self, id: &StageId) {
        self.faults.lock().await.failing_stages.insert(id.clone());
    }

    pub async fn fail_next_calls(&self, n: usize) {
        self.faults.lock().await.fail_next = n;
    }

    pub async fn fail_next_lists(&self, n: usize) {
        self.faults.lock().await.fail_lists = n;
    }

    pub async fn set_offline(&self, offline: bool) {
        self.faults.lock().await.offline = offline;
    }

    pub async fn clear_faults(&self) {
        *self.faults.lock().await = Faults::default();
    }

    pub fn stage_update_calls(&self) -> usize {
        self.stage_updates.load(Ordering::SeqCst)
    }

    pub fn stage_list_calls(&self) -> usize {
        self.stage_lists.load(Ordering::SeqCst)
    }

    async fn check_faults(&self, stage: Option<&StageId>) -> Result<(), StoreError> {
        let mut faults = self.faults.lock().await;
        if faults.offline {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        if faults.fail_next > 0 {
            faults.fail_next -= 1;
            return Err(StoreError::Unavailable("simulated failure".to_string()));
        }
        if let Some(id) = stage {
            if faults.failing_stages.contains(id) {
                return Err(StoreError::Rejected(format!("update of stage {} refused", id)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StageStore for MemoryStore {
    async fn list_stages(&self, budget: &BudgetId) -> Result<Vec<StageNode>, StoreError> {
        self.stage_lists.fetch_add(1, Ordering::SeqCst);
        self.check_faults(None).await?;
        {
            let mut faults = self.faults.lock().await;
            if faults.fail_lists > 0 {
                faults.fail_lists -= 1;
                return Err(StoreError::Unavailable("stage listing failed".to_string()));
            }
        }
        Ok(self.stored_stages(budget).await)
    }

    async fn create_stage(&self, budget: &BudgetId, stage: NewStage) -> Result<StageNode, StoreError> {
        self.check_faults(None).await?;
        let mut state = self.state.lock().await;
        let stages = state.stages.entry(budget.clone()).or_default();

        if let Some(parent) = &stage.parent_id {
            if !stages.iter().any(|s| &s.id == parent) {
                return Err(StoreError::not_found("stage", parent));
            }
        }

        let node = StageNode {
            id: StageId::generate(),
            name: stage.name,
            parent_id: stage.parent_id,
            order: stage.order,
        };
        debug!(budget = %budget, stage = %node.id, "stage created");
        stages.push(node.clone());
        Ok(node)
    }

    async fn update_stage(
        &self,
        budget: &BudgetId,
        id: &StageId,
        patch: StagePatch,
    ) -> Result<StageNode, StoreError> {
        self.stage_updates.fetch_add(1, Ordering::SeqCst);
        self.check_faults(Some(id)).await?;

        let mut state = self.state.lock().await;
        let stages = state
            .stages
            .get_mut(budget)
            .ok_or_else(|| StoreError::not_found("budget", budget))?;

        if let Some(Some(parent)) = &patch.parent_id {
            if !stages.iter().any(|s| &s.id == parent) {
                return Err(StoreError::not_found("stage", parent));
            }
        }

        let node = stages
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| StoreError::not_found("stage", id))?;
        patch.apply_to(node);
        Ok(node.clone())
    }

    async fn delete_stage(&self, budget: &BudgetId, id: &StageId) -> Result<(), StoreError> {
        self.check_faults(Some(id)).await?;
        let mut state = self.state.lock().await;
        let stages = state
            .stages
            .get_mut(budget)
            .ok_or_else(|| StoreError::not_found("budget", budget))?;

        let before = stages.len();
        stages.retain(|s| &s.id != id);
        if stages.len() == before {
            return Err(StoreError::not_found("stage", id));
        }
        // Children lose their parent, like ON DELETE SET NULL
        for stage in stages.iter_mut() {
            if stage.parent_id.as_ref() == Some(id) {
                stage.parent_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LineItemStore for MemoryStore {
    async fn list_items(&self, budget: &BudgetId) -> Result<Vec<LineItem>, StoreError> {
        self.check_faults(None).await?;
        Ok(self.stored_items(budget).await)
    }

    async fn create_item(&self, budget: &BudgetId, item: NewLineItem) -> Result<LineItem, StoreError> {
        self.check_faults(None).await?;
        let item = item.into_item(ItemId::generate());
        let mut state = self.state.lock().await;
        state.items.entry(budget.clone()).or_default().push(item.clone());
        Ok(item)
    }

    async fn update_item(&self, budget: &BudgetId, item: &LineItem) -> Result<LineItem, StoreError> {
        self.check_faults(None).await?;
        let mut state = self.state.lock().await;
        let stored = state
            .items
            .get_mut(budget)
            .and_then(|items| items.iter_mut().find(|i| i.id == item.id))
            .ok_or_else(|| StoreError::not_found("item", &item.id))?;
        *stored = item.clone();
        Ok(item.clone())
    }

    async fn delete_item(&self, budget: &BudgetId, id: &ItemId) -> Result<(), StoreError> {
        self.check_faults(None).await?;
        let mut state = self.state.lock().await;
        let items = state
            .items
            .get_mut(budget)
            .ok_or_else(|| StoreError::not_found("budget", budget))?;
        let before = items.len();
        items.retain(|i| &i.id != id);
        if items.len() == before {
            return Err(StoreError::not_found("item", id));
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn search(&self, term: &str) -> Result<Vec<CatalogEntry>, StoreError> {
        self.check_faults(None).await?;
        let needle = term.trim().to_lowercase();
        let state = self.state.lock().await;
        Ok(state
            .catalog
            .iter()
            .filter(|e| {
                e.code.to_lowercase().contains(&needle)
                    || e.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }
}
