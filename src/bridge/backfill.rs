//! One-time historical backfill of the ledger.
//!
//! Walks `/transactions` from the last persisted offset to the end of the
//! ledger, publishing every page and checkpointing after each one. A crash
//! re-publishes at most the page that was in flight; the broker drops those
//! duplicates on the transaction id.

use crate::bridge::checkpoint::Checkpoints;
use crate::bridge::publisher::Publisher;
use crate::bridge::types::{BackfillState, BridgeError, TailState};
use crate::krist::LedgerApi;

use std::sync::Arc;
use tracing::info;

pub const DEFAULT_BACKFILL_PAGE_SIZE: usize = 1000;

/// Totals for a single backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillStats {
	pub pages: u64,
	pub transactions: u64,
	pub published: u64,
	pub final_offset: u64,
}

pub struct BackfillController {
	ledger: Arc<dyn LedgerApi>,
	publisher: Arc<Publisher>,
	checkpoints: Checkpoints,
	page_size: usize,
}

impl BackfillController {
	pub fn new(
		ledger: Arc<dyn LedgerApi>,
		publisher: Arc<Publisher>,
		checkpoints: Checkpoints,
		page_size: usize,
	) -> Self {
		Self {
			ledger,
			publisher,
			checkpoints,
			page_size,
		}
	}

	/// Run the backfill to the end of the ledger, resuming from the last checkpoint.
	///
	/// Returns immediately if a previous run already finished.
	pub async fn run(&self) -> Result<BackfillStats, BridgeError> {
		let state = self.checkpoints.load_backfill().await?;
		let mut stats = BackfillStats {
			final_offset: state.offset,
			..Default::default()
		};

		if state.done {
			info!("Already caught up at offset {}", state.offset);
			return Ok(stats);
		}

		let mut offset = state.offset;
		info!("Starting backfill from offset {}", offset);

		loop {
			let page = self.ledger.list_transactions(self.page_size, offset).await?;
			let count = page.transactions.len() as u64;

			info!("Got {} transactions, {} total", page.count, page.total);

			let Some(last) = page.transactions.last() else {
				self.checkpoints
					.save_backfill(BackfillState { done: true, offset })
					.await?;
				info!("Caught up at offset {}", offset);
				break;
			};

			for transaction in &page.transactions {
				if self.publisher.publish(transaction).await? {
					stats.published += 1;
				}
			}

			self.checkpoints
				.save_backfill(BackfillState {
					done: false,
					offset: offset + count,
				})
				.await?;
			self.checkpoints
				.save_tail(TailState { last_seen: last.id })
				.await?;

			offset += count;
			stats.pages += 1;
			stats.transactions += count;
		}

		stats.final_offset = offset;
		Ok(stats)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bridge::checkpoint::{BACKFILL_STATE_KEY, TAIL_STATE_KEY};
	use crate::bridge::testing::{FakeLedger, MemoryStore, RecordingBroker, ledger_of};

	struct Harness {
		ledger: Arc<FakeLedger>,
		broker: Arc<RecordingBroker>,
		store: Arc<MemoryStore>,
	}

	impl Harness {
		fn new(ledger: FakeLedger) -> Self {
			Self {
				ledger: Arc::new(ledger),
				broker: Arc::new(RecordingBroker::default()),
				store: Arc::new(MemoryStore::default()),
			}
		}

		fn controller(&self) -> BackfillController {
			BackfillController::new(
				self.ledger.clone(),
				Arc::new(Publisher::new(self.broker.clone())),
				Checkpoints::new(self.store.clone()),
				DEFAULT_BACKFILL_PAGE_SIZE,
			)
		}
	}

	#[tokio::test]
	async fn walks_ledger_in_pages_and_checkpoints_each() {
		let harness = Harness::new(ledger_of(2500));

		let stats = harness.controller().run().await.unwrap();

		assert_eq!(stats.pages, 3);
		assert_eq!(stats.transactions, 2500);
		assert_eq!(stats.final_offset, 2500);
		assert_eq!(harness.ledger.history_offsets(), vec![0, 1000, 2000, 2500]);

		let backfill_writes = harness.store.history(BACKFILL_STATE_KEY);
		assert_eq!(
			backfill_writes,
			vec![
				r#"{"done":false,"offset":1000}"#,
				r#"{"done":false,"offset":2000}"#,
				r#"{"done":false,"offset":2500}"#,
				r#"{"done":true,"offset":2500}"#,
			]
		);
		assert_eq!(
			harness.store.history(TAIL_STATE_KEY),
			vec![
				r#"{"lastSeen":1000}"#,
				r#"{"lastSeen":2000}"#,
				r#"{"lastSeen":2500}"#,
			]
		);

		let delivered = harness.broker.delivered_ids();
		assert!(delivered.windows(2).all(|w| w[0] < w[1]));
	}

	#[tokio::test]
	async fn finished_backfill_does_nothing() {
		let harness = Harness::new(ledger_of(10));
		harness
			.store
			.insert(BACKFILL_STATE_KEY, br#"{"done":true,"offset":10}"#);

		let stats = harness.controller().run().await.unwrap();

		assert_eq!(stats.pages, 0);
		assert!(harness.ledger.history_offsets().is_empty());
		assert!(harness.broker.published().is_empty());
	}

	#[tokio::test]
	async fn resumes_from_persisted_offset() {
		let harness = Harness::new(ledger_of(2500));
		harness
			.store
			.insert(BACKFILL_STATE_KEY, br#"{"done":false,"offset":1000}"#);

		harness.controller().run().await.unwrap();

		assert_eq!(harness.ledger.history_offsets(), vec![1000, 2000, 2500]);
		let delivered = harness.broker.delivered_ids();
		assert_eq!(delivered.first(), Some(&1001));
		assert_eq!(delivered.last(), Some(&2500));
		assert_eq!(delivered.len(), 1500);
	}

	#[tokio::test]
	async fn failed_page_leaves_checkpoint_untouched() {
		let harness = Harness::new(ledger_of(2500).failing_at(1000));

		assert!(harness.controller().run().await.is_err());
		assert_eq!(
			harness.store.raw(BACKFILL_STATE_KEY).unwrap(),
			r#"{"done":false,"offset":1000}"#
		);

		harness.ledger.clear_failure();
		harness.controller().run().await.unwrap();

		assert_eq!(
			harness.store.raw(BACKFILL_STATE_KEY).unwrap(),
			r#"{"done":true,"offset":2500}"#
		);
		assert_eq!(harness.broker.delivered_ids().len(), 2500);
	}

	#[tokio::test]
	async fn reserved_transactions_are_skipped_during_backfill() {
		let harness = Harness::new(
			ledger_of(5)
				.with_sender(2, None)
				.with_recipient(4, "name"),
		);

		let stats = harness.controller().run().await.unwrap();

		assert_eq!(stats.transactions, 5);
		assert_eq!(stats.published, 3);
		assert_eq!(harness.broker.delivered_ids(), vec![1, 3, 5]);
		assert_eq!(harness.store.raw(TAIL_STATE_KEY).unwrap(), r#"{"lastSeen":5}"#);
	}
}
