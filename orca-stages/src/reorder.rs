//! Reorder and persistence coordinator
//!
//! Owns the displayed stage tree for one budget. Changes are applied to the
//! displayed tree first and then written to the store; if any write fails
//! the tree is replaced by a fresh load, so it never shows an arrangement
//! that is not durable.
//!
//! A single gate serializes all stage mutations. A drag gesture takes it at
//! `begin_drag` and keeps it until its writes have settled, so a second
//! gesture started meanwhile is refused with `ReorderInProgress`. The gate
//! also guards the records as last known to be stored, which is what each
//! change is diffed against.
//!
//! Writes run on a spawned task that owns the gate. Dropping a mutation's
//! future before it resolves detaches that task instead of abandoning the
//! writes halfway, and the gate stays held until they settle.

use crate::tree::{StageRecords, StageTree};
use orca_core::{BudgetId, OrcaError, StageId, StageNode};
use orca_store::{NewStage, StagePatch, StageStore, StoreError};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A drag in progress. Dropping it without `drop_at` cancels the gesture.
#[derive(Debug)]
pub struct DragGesture {
    stage_id: StageId,
    stored: OwnedMutexGuard<StageRecords>,
}

impl DragGesture {
    pub fn stage_id(&self) -> &StageId {
        &self.stage_id
    }

    pub fn cancel(self) {
        debug!(stage = %self.stage_id, "drag cancelled");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// The drop left every stage where it was
    Unchanged,
    /// `changed` stages were written
    Persisted { changed: usize },
}

/// State the write tasks need after the caller's future is gone
struct Shared<S> {
    budget: BudgetId,
    store: Arc<S>,
    tree: watch::Sender<StageTree>,
}

pub struct StageCoordinator<S> {
    shared: Arc<Shared<S>>,
    stored: Arc<Mutex<StageRecords>>,
}

impl<S: StageStore + 'static> StageCoordinator<S> {
    pub async fn load(store: Arc<S>, budget: BudgetId) -> Result<Self, OrcaError> {
        let records = store.list_stages(&budget).await?;
        info!(budget = %budget, stages = records.len(), "stages loaded");
        let tree = StageTree::from_nodes(records.iter().cloned());
        let (sender, _) = watch::channel(tree);
        Ok(Self {
            shared: Arc::new(Shared { budget, store, tree: sender }),
            stored: Arc::new(Mutex::new(to_records(records))),
        })
    }

    pub fn budget(&self) -> &BudgetId {
        &self.shared.budget
    }

    /// Current displayed tree
    pub fn snapshot(&self) -> StageTree {
        self.shared.tree.borrow().clone()
    }

    /// Receiver that sees every optimistic update and every reload
    pub fn subscribe(&self) -> watch::Receiver<StageTree> {
        self.shared.tree.subscribe()
    }

    /// A gesture or stage change is holding the gate
    pub fn is_busy(&self) -> bool {
        self.stored.try_lock().is_err()
    }

    // ========== Drag and drop ==========

    pub fn begin_drag(&self, id: &StageId) -> Result<DragGesture, OrcaError> {
        let stored = self.gate()?;
        if !self.shared.tree.borrow().contains(id) {
            return Err(OrcaError::StageNotFound(id.clone()));
        }
        debug!(stage = %id, "drag started");
        Ok(DragGesture { stage_id: id.clone(), stored })
    }

    /// Finish a gesture by dropping the stage at `index` under `new_parent`.
    /// An invalid target leaves the tree as it was and writes nothing.
    pub async fn drop_at(
        &self,
        gesture: DragGesture,
        new_parent: Option<&StageId>,
        index: usize,
    ) -> Result<ReorderOutcome, OrcaError> {
        let DragGesture { stage_id, mut stored } = gesture;

        let mut next = self.snapshot();
        next.move_to(&stage_id, new_parent, index)?;

        let changes = next.changes_since(&stored);
        if changes.is_empty() {
            debug!(stage = %stage_id, "drop changed nothing");
            return Ok(ReorderOutcome::Unchanged);
        }

        info!(stage = %stage_id, changed = changes.len(), "stage reordered");
        self.shared.tree.send_replace(next);

        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            let changed = shared.persist(&mut stored, changes).await?;
            Ok::<_, OrcaError>(ReorderOutcome::Persisted { changed })
        });
        settle(task).await
    }

    // ========== Stage CRUD ==========

    /// Create a stage as the last child of `parent`. Written first, then shown.
    pub async fn insert_stage(
        &self,
        name: impl Into<String>,
        parent: Option<&StageId>,
    ) -> Result<StageNode, OrcaError> {
        let mut stored = self.gate()?;
        let name = name.into();
        let order = {
            let tree = self.shared.tree.borrow();
            if let Some(parent) = parent {
                if !tree.contains(parent) {
                    return Err(OrcaError::StageNotFound(parent.clone()));
                }
            }
            tree.next_order(parent)
        };
        let stage = NewStage { name, parent_id: parent.cloned(), order };

        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            let created = shared.store.create_stage(&shared.budget, stage).await?;
            stored.insert(created.id.clone(), created.clone());

            let mut result = Ok(created.clone());
            shared.tree.send_modify(|tree| result = tree.insert_node(created));
            if let Ok(node) = &result {
                info!(stage = %node.id, order = node.order, "stage created");
            }
            result
        });
        settle(task).await
    }

    pub async fn rename_stage(&self, id: &StageId, name: impl Into<String>) -> Result<(), OrcaError> {
        let mut stored = self.gate()?;
        if !self.shared.tree.borrow().contains(id) {
            return Err(OrcaError::StageNotFound(id.clone()));
        }
        let name = name.into();
        let id = id.clone();

        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            let updated = shared
                .store
                .update_stage(&shared.budget, &id, StagePatch::rename(name.clone()))
                .await?;
            stored.insert(updated.id.clone(), updated);

            let mut result = Ok(());
            shared.tree.send_modify(|tree| result = tree.rename(&id, name));
            result
        });
        settle(task).await
    }

    /// Delete a stage. Its children become roots and the new placements of
    /// every shifted stage are written after the delete.
    pub async fn remove_stage(&self, id: &StageId) -> Result<StageNode, OrcaError> {
        let mut stored = self.gate()?;
        let mut next = self.snapshot();
        let removed = next.remove(id)?;
        let id = id.clone();

        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            shared.store.delete_stage(&shared.budget, &id).await?;
            stored.remove(&id);
            for record in stored.values_mut() {
                if record.parent_id.as_ref() == Some(&id) {
                    record.parent_id = None;
                }
            }

            let changes = next.changes_since(&stored);
            info!(stage = %id, changed = changes.len(), "stage removed");
            shared.tree.send_replace(next);
            if !changes.is_empty() {
                shared.persist(&mut stored, changes).await?;
            }
            Ok::<_, OrcaError>(removed)
        });
        settle(task).await
    }

    /// Replace the displayed tree with the stored one
    pub async fn reload(&self) -> Result<(), OrcaError> {
        let mut stored = self.gate()?;
        self.shared.reload_into(&mut stored).await
    }

    // ========== Internals ==========

    fn gate(&self) -> Result<OwnedMutexGuard<StageRecords>, OrcaError> {
        self.stored
            .clone()
            .try_lock_owned()
            .map_err(|_| OrcaError::ReorderInProgress)
    }
}

impl<S: StageStore> Shared<S> {
    /// Write every patch, waiting for all of them. On any failure the
    /// displayed tree is reloaded from the store.
    async fn persist(
        &self,
        stored: &mut StageRecords,
        changes: Vec<(StageId, StagePatch)>,
    ) -> Result<usize, OrcaError> {
        let total = changes.len();
        let results = self.store.update_stages(&self.budget, changes).await;

        let mut failures: Vec<StoreError> = Vec::new();
        for result in results {
            match result {
                Ok(node) => {
                    stored.insert(node.id.clone(), node);
                }
                Err(err) => failures.push(err),
            }
        }

        if failures.is_empty() {
            debug!(changed = total, "stage placements persisted");
            return Ok(total);
        }

        let failed = failures.len();
        let message = failures
            .first()
            .map(|e| e.to_string())
            .unwrap_or_default();
        warn!(failed, total, error = %message, "stage persistence failed, reloading");

        if let Err(reload_err) = self.reload_into(stored).await {
            // Fall back to what is known to have been written
            warn!(error = %reload_err, "reload failed, showing last stored arrangement");
            self.tree
                .send_replace(StageTree::from_nodes(stored.values().cloned()));
        }

        Err(OrcaError::Persistence {
            message: format!("{} of {} stage updates failed: {}", failed, total, message),
            failed,
        })
    }

    async fn reload_into(&self, stored: &mut StageRecords) -> Result<(), OrcaError> {
        let records = self.store.list_stages(&self.budget).await?;
        info!(budget = %self.budget, stages = records.len(), "stages reloaded");
        self.tree
            .send_replace(StageTree::from_nodes(records.iter().cloned()));
        *stored = to_records(records);
        Ok(())
    }
}

/// Wait for a write task. A panicked task has already released the gate.
async fn settle<T>(task: JoinHandle<Result<T, OrcaError>>) -> Result<T, OrcaError> {
    task.await
        .map_err(|err| OrcaError::persistence(format!("stage write task failed: {}", err)))?
}

fn to_records(nodes: Vec<StageNode>) -> StageRecords {
    nodes.into_iter().map(|n| (n.id.clone(), n)).collect()
}
