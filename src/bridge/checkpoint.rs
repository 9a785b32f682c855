//! Checkpoint persistence for backfill and tail progress.
//!
//! Both records are small JSON documents stored under fixed keys. `Checkpoints`
//! owns the encoding and the "absent means default" rule; the raw get/put
//! primitive sits behind `CheckpointStore` so the engine can run against the
//! JetStream key-value bucket or an in-memory map.

use crate::bridge::types::{BackfillState, BridgeError, TailState};
use crate::broker::BrokerError;

use async_nats::jetstream::kv;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

pub const BACKFILL_STATE_KEY: &str = "catchup_state";
pub const TAIL_STATE_KEY: &str = "latest_state";

/// Durable key/value storage for checkpoint records.
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BrokerError>;
	async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), BrokerError>;
}

/// `CheckpointStore` backed by a JetStream key-value bucket.
pub struct KvCheckpointStore {
	store: kv::Store,
}

impl KvCheckpointStore {
	pub fn new(store: kv::Store) -> Self {
		Self { store }
	}
}

#[async_trait::async_trait]
impl CheckpointStore for KvCheckpointStore {
	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BrokerError> {
		Ok(self.store.get(key).await?.map(|value| value.to_vec()))
	}

	async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), BrokerError> {
		let revision = self.store.put(key, value.into()).await?;
		debug!("Stored {} at revision {}", key, revision);
		Ok(())
	}
}

/// Typed access to the backfill and tail checkpoints.
#[derive(Clone)]
pub struct Checkpoints {
	store: Arc<dyn CheckpointStore>,
}

impl Checkpoints {
	pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
		Self { store }
	}

	/// Load backfill progress, defaulting to `{done: false, offset: 0}` when absent.
	pub async fn load_backfill(&self) -> Result<BackfillState, BridgeError> {
		Ok(self.load(BACKFILL_STATE_KEY).await?.unwrap_or_default())
	}

	pub async fn save_backfill(&self, state: BackfillState) -> Result<(), BridgeError> {
		self.save(BACKFILL_STATE_KEY, &state).await
	}

	/// Load the tail checkpoint, or `None` if no tail state has been written yet.
	pub async fn load_tail(&self) -> Result<Option<TailState>, BridgeError> {
		self.load(TAIL_STATE_KEY).await
	}

	pub async fn save_tail(&self, state: TailState) -> Result<(), BridgeError> {
		self.save(TAIL_STATE_KEY, &state).await
	}

	async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, BridgeError> {
		let Some(raw) = self.store.get(key).await? else {
			return Ok(None);
		};

		serde_json::from_slice(&raw)
			.map(Some)
			.map_err(|source| BridgeError::MalformedRecord {
				key: key.to_string(),
				source,
			})
	}

	async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), BridgeError> {
		let raw = serde_json::to_vec(value).map_err(BridgeError::Encode)?;
		self.store.put(key, raw).await?;
		Ok(())
	}
}
