//! Orca Store - persistence and catalog boundaries
//!
//! The budget's stages and line items live in an external record store and
//! prices come from a remote catalog. Both are reached through the async
//! traits here; `MemoryStore` implements all of them in process.

mod error;
mod memory;
mod records;
mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use records::{CatalogEntry, NewLineItem, NewStage, StagePatch};
pub use traits::{Catalog, LineItemStore, StageStore};
