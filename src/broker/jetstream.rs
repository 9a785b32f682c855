//! JetStream broker: stream declaration, idempotent publish and key-value access.

use super::types::*;
use async_nats::jetstream::context::CreateStreamErrorKind;
use async_nats::jetstream::stream::{Config as StreamConfig, LastRawMessageErrorKind};
use async_nats::jetstream::{self, ErrorCode, kv};
use async_nats::{Client, ConnectOptions, HeaderMap, header};
use tracing::{debug, info, warn};

/// Stream management calls used at startup.
#[async_trait::async_trait]
pub trait StreamAdmin: Send + Sync {
	/// Create the stream. Fails with `BrokerError::StreamExists` if the name is taken.
	async fn create_stream(&self, spec: &StreamSpec) -> Result<(), BrokerError>;

	/// Replace the configuration of an existing stream.
	async fn update_stream(&self, spec: &StreamSpec) -> Result<(), BrokerError>;
}

/// Publishing side of the broker, as seen by the bridge.
#[async_trait::async_trait]
pub trait StreamPublisher: Send + Sync {
	/// Publish `payload` to `subject`, deduplicated on `dedup_id`.
	///
	/// Returns `true` if the broker stored the message, `false` if it was a duplicate.
	async fn publish(
		&self,
		subject: String,
		payload: Vec<u8>,
		dedup_id: String,
	) -> Result<bool, BrokerError>;

	/// Payload of the most recent message whose subject matches `subject`, if any.
	async fn last_message(&self, subject: &str) -> Result<Option<Vec<u8>>, BrokerError>;
}

/// Connect to NATS with user/password credentials.
pub async fn connect(host: &str, user: &str, pass: &str) -> Result<Client, BrokerError> {
	let client = ConnectOptions::with_user_and_password(user.to_string(), pass.to_string())
		.name("krist-nats-bridge")
		.connect(host)
		.await?;

	info!("Connected to NATS at {}", host);
	Ok(client)
}

/// Flush outstanding writes before the connection is dropped.
pub async fn close(client: Client) {
	if let Err(e) = client.flush().await {
		warn!("Failed to flush NATS connection on shutdown: {}", e);
	}
	drop(client);
	info!("NATS connection closed");
}

/// Create the stream, or update it in place if it already exists.
pub async fn ensure_stream<A>(admin: &A, spec: &StreamSpec) -> Result<(), BrokerError>
where
	A: StreamAdmin + ?Sized,
{
	match admin.create_stream(spec).await {
		Ok(()) => {
			info!("Stream {} created", spec.name);
			Ok(())
		}
		Err(BrokerError::StreamExists(_)) => {
			debug!("Stream {} already exists, updating", spec.name);
			admin.update_stream(spec).await?;
			info!("Stream {} updated", spec.name);
			Ok(())
		}
		Err(e) => Err(e),
	}
}

/// Broker backed by a JetStream context.
#[derive(Clone)]
pub struct JetStreamBroker {
	context: jetstream::Context,
	stream_name: String,
}

impl JetStreamBroker {
	pub fn new(client: Client, stream_name: String) -> Self {
		Self {
			context: jetstream::new(client),
			stream_name,
		}
	}

	/// Open the key-value bucket, creating it on first use.
	pub async fn open_kv(&self, bucket: &str) -> Result<kv::Store, BrokerError> {
		match self.context.get_key_value(bucket).await {
			Ok(store) => Ok(store),
			Err(e) => {
				debug!("Key-value bucket {} unavailable ({}), creating", bucket, e);
				let store = self
					.context
					.create_key_value(kv::Config {
						bucket: bucket.to_string(),
						history: 1,
						..Default::default()
					})
					.await?;
				info!("Key-value bucket {} created", bucket);
				Ok(store)
			}
		}
	}

	fn stream_config(spec: &StreamSpec) -> StreamConfig {
		StreamConfig {
			name: spec.name.clone(),
			subjects: spec.subjects.clone(),
			..Default::default()
		}
	}
}

#[async_trait::async_trait]
impl StreamAdmin for JetStreamBroker {
	async fn create_stream(&self, spec: &StreamSpec) -> Result<(), BrokerError> {
		match self.context.create_stream(Self::stream_config(spec)).await {
			Ok(_) => Ok(()),
			Err(e) => match e.kind() {
				CreateStreamErrorKind::JetStream(err)
					if err.error_code() == ErrorCode::STREAM_NAME_EXIST =>
				{
					Err(BrokerError::StreamExists(spec.name.clone()))
				}
				_ => Err(BrokerError::CreateStream(e)),
			},
		}
	}

	async fn update_stream(&self, spec: &StreamSpec) -> Result<(), BrokerError> {
		self.context
			.update_stream(Self::stream_config(spec))
			.await
			.map_err(BrokerError::UpdateStream)?;
		Ok(())
	}
}

#[async_trait::async_trait]
impl StreamPublisher for JetStreamBroker {
	async fn publish(
		&self,
		subject: String,
		payload: Vec<u8>,
		dedup_id: String,
	) -> Result<bool, BrokerError> {
		let mut headers = HeaderMap::new();
		headers.insert(header::NATS_MESSAGE_ID, dedup_id.as_str());

		let ack = self
			.context
			.publish_with_headers(subject, headers, payload.into())
			.await?
			.await?;

		if ack.duplicate {
			debug!("Message {} was already stored at sequence {}", dedup_id, ack.sequence);
		}
		Ok(!ack.duplicate)
	}

	async fn last_message(&self, subject: &str) -> Result<Option<Vec<u8>>, BrokerError> {
		let stream = self.context.get_stream(&self.stream_name).await?;

		match stream.get_last_raw_message_by_subject(subject).await {
			Ok(message) => Ok(Some(message.payload.to_vec())),
			Err(e) if matches!(e.kind(), LastRawMessageErrorKind::NoMessageFound) => Ok(None),
			Err(e) => Err(e.into()),
		}
	}
}
