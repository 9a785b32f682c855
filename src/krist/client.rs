//!
//! HTTP client for the Krist ledger API.
//!
//! Provides paginated access to the full transaction history and to the
//! "latest transactions" listing, plus the handshake that opens a push
//! (WebSocket) session. All methods are async and designed for use with Tokio.

use super::types::*;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Read access to the ledger's transaction listings.
#[async_trait::async_trait]
pub trait LedgerApi: Send + Sync {
	/// List transactions in ascending id order, starting at `offset`.
	async fn list_transactions(
		&self,
		limit: usize,
		offset: u64,
	) -> Result<TransactionPage, KristError>;

	/// List the most recent transactions in descending id order, skipping `offset` of them.
	async fn list_latest_transactions(
		&self,
		limit: usize,
		offset: u64,
	) -> Result<TransactionPage, KristError>;
}

/// Krist HTTP API client
#[derive(Clone)]
pub struct KristClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL of the Krist node, without a trailing slash.
	base_url: String,
}

impl KristClient {
	/// Create a new ledger client.
	///
	/// # Arguments
	/// * `base_url` - The Krist node URL, e.g. `https://krist.dev`.
	pub fn new(base_url: String) -> Result<Self, KristError> {
		let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;

		Ok(Self {
			http_client,
			base_url: base_url.trim_end_matches('/').to_string(),
		})
	}

	/// Request a one-shot WebSocket URL for a new push session.
	///
	/// # Returns
	/// The URL to connect to, or a `KristError` if the node refused the request.
	pub async fn start_ws(&self) -> Result<String, KristError> {
		let url = format!("{}/ws/start", self.base_url);
		debug!("Requesting WebSocket session from {}", url);

		let response = self.http_client.post(&url).send().await?;
		let body = Self::check(response).await?;
		let start: WsStart = serde_json::from_value(body)?;

		debug!("WebSocket session URL expires in {}s", start.expires);
		Ok(start.url)
	}

	async fn get_page(
		&self,
		path: &str,
		limit: usize,
		offset: u64,
	) -> Result<TransactionPage, KristError> {
		let url = format!("{}{}", self.base_url, path);

		let response = self
			.http_client
			.get(&url)
			.query(&[("limit", limit as u64), ("offset", offset)])
			.send()
			.await?;

		let body = Self::check(response).await?;
		Ok(serde_json::from_value(body)?)
	}

	async fn check(response: reqwest::Response) -> Result<serde_json::Value, KristError> {
		let status = response.status();
		let body: serde_json::Value = response.json().await?;
		check_body(status, body)
	}
}

/// Validate the `ok` flag Krist puts on every response body.
fn check_body(
	status: reqwest::StatusCode,
	body: serde_json::Value,
) -> Result<serde_json::Value, KristError> {
	if body.get("ok").and_then(|ok| ok.as_bool()) != Some(true) {
		let code = body
			.get("error")
			.and_then(|e| e.as_str())
			.unwrap_or("unknown_error");
		return Err(KristError::Api(format!("{} (HTTP {})", code, status)));
	}

	Ok(body)
}

#[async_trait::async_trait]
impl LedgerApi for KristClient {
	async fn list_transactions(
		&self,
		limit: usize,
		offset: u64,
	) -> Result<TransactionPage, KristError> {
		self.get_page("/transactions", limit, offset).await
	}

	async fn list_latest_transactions(
		&self,
		limit: usize,
		offset: u64,
	) -> Result<TransactionPage, KristError> {
		self.get_page("/transactions/latest", limit, offset).await
	}
}
