//! Message broker integration module
//!
//! This module wraps NATS JetStream: stream declaration, idempotent publishing,
//! the last-message lookup used to bootstrap tailing, and the key-value bucket
//! that backs checkpoints.

/// JetStream-backed broker implementation
mod jetstream;
/// Type definitions for broker operations
mod types;

pub use jetstream::{JetStreamBroker, StreamPublisher, close, connect, ensure_stream};
pub use types::*;
