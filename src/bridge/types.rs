use crate::broker::BrokerError;
use crate::krist::KristError;

use serde::{Deserialize, Serialize};

/// Progress of the one-time historical walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillState {
	/// The walk has reached the end of the ledger at least once.
	pub done: bool,
	/// Start of the next page to fetch.
	pub offset: u64,
}

/// Highest transaction id known to have been published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TailState {
	pub last_seen: u64,
}

/// Error types for the synchronization engine
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
	#[error("Ledger error: {0}")]
	Ledger(#[from] KristError),

	#[error("Broker error: {0}")]
	Broker(#[from] BrokerError),

	#[error("Malformed record under {key}: {source}")]
	MalformedRecord {
		key: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("Encode error: {0}")]
	Encode(#[source] serde_json::Error),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}
