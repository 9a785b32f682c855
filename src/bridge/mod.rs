//! Checkpointed synchronization engine
//!
//! This module bridges the Krist ledger into the broker stream. It is composed of:
//!
//! - `checkpoint`: Persists backfill progress and the last-seen transaction id.
//! - `publisher`: Filters reserved transactions and publishes the rest with a stable subject and dedup id.
//! - `backfill`: One-time, resumable walk of the full ledger history.
//! - `tail`: Publishes transactions appended since the last checkpoint, in ascending order.
//! - `dispatcher`: Single-flight queue that serializes tail runs and coalesces redundant triggers.
//!
//! Backfill must finish before any tail run starts; after that every tail run
//! goes through the dispatcher, so checkpoint and publisher are never touched
//! concurrently.

/// Resumable historical walk of the ledger
pub mod backfill;
/// Checkpoint records and their storage
pub mod checkpoint;
/// Single-flight job dispatch
pub mod dispatcher;
/// Idempotent transaction publishing
pub mod publisher;
/// Tailing of newly appended transactions
pub mod tail;
/// Engine state records and errors
pub mod types;

#[cfg(test)]
mod testing;

pub use backfill::BackfillController;
pub use checkpoint::{Checkpoints, KvCheckpointStore};
pub use dispatcher::Dispatcher;
pub use publisher::Publisher;
pub use tail::TailController;
pub use types::*;
