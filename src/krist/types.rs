//! Types for the Krist ledger HTTP API and its WebSocket push channel

use serde::{Deserialize, Serialize};

/// A ledger transaction as returned by the Krist API.
///
/// Only the fields the bridge routes on are typed; everything else the ledger
/// sends is kept in `extra` so the published payload is the full upstream record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
	/// Monotonically increasing ledger id. Ordering is strictly by this field.
	pub id: u64,
	/// Sender address. `None` (or empty) for mined and other synthetic transactions.
	#[serde(default)]
	pub from: Option<String>,
	/// Recipient address, or a reserved pseudo-address such as `name` or `a`.
	pub to: String,
	/// Amount transferred.
	pub value: u64,
	/// Time the ledger recorded the transaction, exactly as the ledger formats it.
	pub time: String,
	/// Remaining ledger-specific fields, passed through untouched.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Minimal view of a transaction when only its id matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TransactionRef {
	pub id: u64,
}

/// One page of a transaction listing.
///
/// `/transactions` pages are ascending by id; `/transactions/latest` pages are
/// descending by id.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionPage {
	/// Number of transactions in this page.
	pub count: usize,
	/// Total number of transactions the listing covers.
	#[serde(default)]
	pub total: u64,
	pub transactions: Vec<Transaction>,
}

/// Response to `POST /ws/start`.
#[derive(Debug, Clone, Deserialize)]
pub struct WsStart {
	/// One-shot WebSocket URL for this session.
	pub url: String,
	/// Seconds until the URL expires if unused.
	#[serde(default)]
	pub expires: u64,
}

/// Frames received on the Krist WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
	/// Greeting sent once after connecting.
	Hello {
		#[serde(default)]
		motd: Option<String>,
	},
	/// Periodic liveness frame.
	Keepalive {},
	/// Reply to a request we sent, such as `subscribe`.
	Response {
		#[serde(default)]
		ok: bool,
		#[serde(default)]
		responding_to: Option<String>,
		#[serde(default)]
		error: Option<String>,
	},
	/// A subscribed ledger event.
	Event {
		event: String,
		#[serde(default)]
		transaction: Option<TransactionRef>,
	},
	#[serde(other)]
	Unknown,
}

/// Error types for ledger API and push channel operations
#[derive(Debug, thiserror::Error)]
pub enum KristError {
	#[error("Krist API error: {0}")]
	Api(String),

	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("WebSocket error: {0}")]
	WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("Push channel error: {0}")]
	PushChannel(String),
}
