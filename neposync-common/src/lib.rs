//! # Neposync Common Library
//!
//! Backend-independent core of neposync:
//! - Canonical rating scale and native scale conversion
//! - Tag sets and tag diffs
//! - Per-file metadata records and write operations
//! - The `StoreAdapter` capability trait and an in-memory reference store
//! - The reconciliation engine
//! - Configuration loading

pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod rating;
pub mod record;
pub mod store;
pub mod tags;

pub use engine::{plan_writes, reconcile, PlanOptions, ReconcileOutcome, SyncPolicy};
pub use error::{Error, Result, StoreError, StoreResult};
pub use memory::MemoryStore;
pub use rating::{Rating, RatingScale};
pub use record::{MetadataRecord, WriteOp};
pub use store::StoreAdapter;
pub use tags::{TagDiff, TagSet};
