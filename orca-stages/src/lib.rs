//! Orca Stages - budget stage hierarchy
//!
//! - `StageTree`: arena of stage nodes with cycle-safe moves
//! - `aggregate`: per-stage subtotals rolled up through the hierarchy
//! - `StageCoordinator`: optimistic reorders written back to the store

mod aggregate;
mod reorder;
mod tree;

pub use aggregate::{aggregate, CostSummary};
pub use reorder::{DragGesture, ReorderOutcome, StageCoordinator};
pub use tree::{StageRecords, StageTree};
