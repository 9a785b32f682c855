//! Krist ledger integration module
//!
//! This module provides the HTTP client and push listener for the Krist ledger,
//! along with typed records for everything the bridge reads from it.

/// HTTP client for paginated transaction listings
mod client;
/// WebSocket push listener
mod listener;
/// Type definitions for ledger data structures
mod types;

pub use client::{KristClient, LedgerApi};
pub use listener::{PushEvent, PushListener};
pub use types::*;
