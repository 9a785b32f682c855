//! Push listener for the Krist WebSocket API.
//!
//! Keeps a subscription to the `transactions` event open for the life of the
//! process and reports every frame of interest through a callback. Connection
//! loss is handled here with exponential backoff; callers only see events.

use super::client::KristClient;
use super::types::*;
use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Signals delivered to the listener callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
	/// The subscription is established.
	Open,
	/// The ledger recorded a new transaction.
	Transaction(u64),
	/// The connection closed; a reconnect follows.
	Close,
	/// The connection failed; a reconnect follows.
	Error(String),
}

/// Long-lived subscription to ledger push notifications.
pub struct PushListener {
	client: KristClient,
	max_retry_interval: Duration,
}

impl PushListener {
	pub fn new(client: KristClient) -> Self {
		Self {
			client,
			max_retry_interval: Duration::from_secs(30),
		}
	}

	/// Run the listener until the task is aborted.
	pub async fn run<F>(&self, on_event: F)
	where
		F: Fn(PushEvent) + Send + Sync,
	{
		let mut backoff = ExponentialBackoffBuilder::new()
			.with_max_interval(self.max_retry_interval)
			.with_max_elapsed_time(None)
			.build();

		loop {
			match self.session(&on_event, &mut backoff).await {
				Ok(()) => on_event(PushEvent::Close),
				Err(e) => on_event(PushEvent::Error(e.to_string())),
			}

			let delay = backoff.next_backoff().unwrap_or(self.max_retry_interval);
			info!("Reconnecting to Krist push channel in {:?}", delay);
			tokio::time::sleep(delay).await;
		}
	}

	/// One connection, from handshake to close. Resets `backoff` once subscribed.
	async fn session<F, B>(&self, on_event: &F, backoff: &mut B) -> Result<(), KristError>
	where
		F: Fn(PushEvent) + Send + Sync,
		B: Backoff,
	{
		let url = self.client.start_ws().await?;
		let (ws_stream, response) = connect_async(url.as_str()).await?;
		debug!(
			"WebSocket connection established, response status: {}",
			response.status()
		);
		let (mut ws_sender, mut ws_receiver) = ws_stream.split();

		let subscribe = json!({
			"id": 1,
			"type": "subscribe",
			"event": "transactions"
		});
		ws_sender.send(Message::Text(subscribe.to_string())).await?;

		while let Some(msg) = ws_receiver.next().await {
			match msg? {
				Message::Text(text) => {
					if let Some(event) = handle_frame(&text)? {
						if event == PushEvent::Open {
							backoff.reset();
						}
						on_event(event);
					}
				}
				Message::Close(frame) => {
					warn!("Krist push channel closed: {:?}", frame);
					return Ok(());
				}
				_ => {}
			}
		}

		Ok(())
	}
}

/// Decode one text frame into the event it signals, if any.
///
/// A rejected request ends the session. Frames that do not decode are skipped.
fn handle_frame(text: &str) -> Result<Option<PushEvent>, KristError> {
	let message = match serde_json::from_str::<WsMessage>(text) {
		Ok(message) => message,
		Err(e) => {
			debug!("Skipping undecodable Krist frame ({}): {}", e, text);
			return Ok(None);
		}
	};

	match message {
		WsMessage::Hello { motd } => {
			debug!("Krist says hello: {}", motd.unwrap_or_default());
			Ok(None)
		}
		WsMessage::Keepalive {} => Ok(None),
		WsMessage::Response {
			ok,
			responding_to,
			error,
		} => {
			let request = responding_to.unwrap_or_default();
			if !ok {
				return Err(KristError::PushChannel(format!(
					"{} rejected: {}",
					request,
					error.unwrap_or_default()
				)));
			}
			if request == "subscribe" {
				info!("Subscribed to Krist transactions");
				return Ok(Some(PushEvent::Open));
			}
			Ok(None)
		}
		WsMessage::Event {
			event,
			transaction: Some(transaction),
		} if event == "transaction" => Ok(Some(PushEvent::Transaction(transaction.id))),
		WsMessage::Event { event, .. } => {
			debug!("Ignoring Krist event: {}", event);
			Ok(None)
		}
		WsMessage::Unknown => {
			debug!("Ignoring Krist frame: {}", text);
			Ok(None)
		}
	}
}
