//! Idempotent publishing of ledger transactions.

use crate::bridge::types::BridgeError;
use crate::broker::StreamPublisher;
use crate::krist::Transaction;

use std::sync::Arc;
use tracing::debug;

/// Recipient pseudo-addresses used by synthetic ledger entries (name purchases and the like).
const RESERVED_RECIPIENTS: [&str; 2] = ["name", "a"];

/// Subject a transaction is published on.
pub fn routing_key(from: &str, to: &str) -> String {
	format!("krist.from.{}.to.{}", from, to)
}

/// Subject pattern matching every routed transaction.
pub fn catch_all_subject() -> String {
	routing_key("*", "*")
}

/// Synthetic transactions that never reach the broker.
pub fn is_reserved(transaction: &Transaction) -> bool {
	let no_sender = transaction.from.as_deref().is_none_or(str::is_empty);
	no_sender || RESERVED_RECIPIENTS.contains(&transaction.to.as_str())
}

/// Forwards transactions to the broker with the transaction id as dedup token.
pub struct Publisher {
	broker: Arc<dyn StreamPublisher>,
}

impl Publisher {
	pub fn new(broker: Arc<dyn StreamPublisher>) -> Self {
		Self { broker }
	}

	/// Publish one transaction. Returns `false` if it was filtered out.
	pub async fn publish(&self, transaction: &Transaction) -> Result<bool, BridgeError> {
		let Some(from) = transaction.from.as_deref().filter(|_| !is_reserved(transaction)) else {
			return Ok(false);
		};

		debug!(
			"Processing transaction {} from {} to {}",
			transaction.id, from, transaction.to
		);

		let payload = serde_json::to_vec(transaction).map_err(BridgeError::Encode)?;
		self.broker
			.publish(
				routing_key(from, &transaction.to),
				payload,
				transaction.id.to_string(),
			)
			.await?;

		Ok(true)
	}
}
