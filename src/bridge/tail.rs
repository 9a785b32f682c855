//! Tailing of newly appended ledger transactions.
//!
//! Each run pages through `/transactions/latest` (newest first) until it meets
//! a transaction at or below the tail checkpoint, then publishes everything
//! newer in ascending id order and advances the checkpoint.

use crate::bridge::checkpoint::Checkpoints;
use crate::bridge::dispatcher::SyncJob;
use crate::bridge::publisher::{Publisher, catch_all_subject};
use crate::bridge::types::{BridgeError, TailState};
use crate::broker::StreamPublisher;
use crate::krist::{LedgerApi, Transaction, TransactionRef};

use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_TAIL_PAGE_SIZE: usize = 10;

pub struct TailController {
	ledger: Arc<dyn LedgerApi>,
	publisher: Arc<Publisher>,
	broker: Arc<dyn StreamPublisher>,
	checkpoints: Checkpoints,
	page_size: usize,
}

impl TailController {
	pub fn new(
		ledger: Arc<dyn LedgerApi>,
		publisher: Arc<Publisher>,
		broker: Arc<dyn StreamPublisher>,
		checkpoints: Checkpoints,
		page_size: usize,
	) -> Self {
		Self {
			ledger,
			publisher,
			broker,
			checkpoints,
			page_size,
		}
	}

	/// Tail checkpoint, bootstrapped from the newest message on the stream when absent.
	///
	/// An empty stream means nothing was ever published, so tailing starts from zero.
	async fn last_seen(&self) -> Result<u64, BridgeError> {
		if let Some(state) = self.checkpoints.load_tail().await? {
			return Ok(state.last_seen);
		}

		let subject = catch_all_subject();
		let Some(payload) = self.broker.last_message(&subject).await? else {
			info!("No tail checkpoint and no published messages, starting from 0");
			return Ok(0);
		};

		let last: TransactionRef =
			serde_json::from_slice(&payload).map_err(|source| BridgeError::MalformedRecord {
				key: subject,
				source,
			})?;

		info!("Bootstrapped tail checkpoint from stream at {}", last.id);
		Ok(last.id)
	}

	/// Collect every transaction newer than `last_seen`, newest first.
	async fn collect_new(&self, last_seen: u64) -> Result<Vec<Transaction>, BridgeError> {
		let mut fresh = Vec::new();
		let mut offset = 0;

		loop {
			let page = self
				.ledger
				.list_latest_transactions(self.page_size, offset)
				.await?;

			if page.transactions.is_empty() {
				return Ok(fresh);
			}
			offset += page.transactions.len() as u64;

			for transaction in page.transactions {
				if transaction.id <= last_seen {
					return Ok(fresh);
				}
				// Appends between page fetches shift earlier entries onto this page.
				if fresh
					.last()
					.is_some_and(|oldest: &Transaction| transaction.id >= oldest.id)
				{
					continue;
				}
				debug!("Found new transaction {}", transaction.id);
				fresh.push(transaction);
			}
		}
	}

	/// Publish everything appended since the last run.
	///
	/// Returns the number of new transactions found. The checkpoint is only
	/// written when there was at least one.
	pub async fn run(&self) -> Result<usize, BridgeError> {
		let last_seen = self.last_seen().await?;
		let mut fresh = self.collect_new(last_seen).await?;
		fresh.reverse();

		let Some(newest) = fresh.iter().map(|transaction| transaction.id).max() else {
			return Ok(0);
		};

		for transaction in &fresh {
			self.publisher.publish(transaction).await?;
		}

		self.checkpoints
			.save_tail(TailState { last_seen: newest })
			.await?;

		info!(
			"Processed latest transactions, {} new transactions",
			fresh.len()
		);
		Ok(fresh.len())
	}
}

#[async_trait::async_trait]
impl SyncJob for TailController {
	async fn run(&self) -> Result<usize, BridgeError> {
		TailController::run(self).await
	}

	fn name(&self) -> &'static str {
		"tail"
	}
}
