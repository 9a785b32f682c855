//! Types for JetStream stream management and publishing

use async_nats::jetstream::context::{
	CreateKeyValueError, CreateStreamError, GetStreamError, KeyValueError, PublishError,
};
use async_nats::jetstream::kv::{EntryError, PutError};
use async_nats::jetstream::stream::LastRawMessageError;

/// Declaration of a stream and the subjects it captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSpec {
	pub name: String,
	pub subjects: Vec<String>,
}

/// Error types for broker operations
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
	#[error("Connect error: {0}")]
	Connect(#[from] async_nats::ConnectError),

	#[error("Stream {0} already exists")]
	StreamExists(String),

	#[error("Stream create error: {0}")]
	CreateStream(CreateStreamError),

	#[error("Stream update error: {0}")]
	UpdateStream(CreateStreamError),

	#[error("Stream lookup error: {0}")]
	GetStream(#[from] GetStreamError),

	#[error("Publish error: {0}")]
	Publish(#[from] PublishError),

	#[error("Last message lookup error: {0}")]
	LastMessage(#[from] LastRawMessageError),

	#[error("Key-value bucket error: {0}")]
	KeyValue(#[from] KeyValueError),

	#[error("Key-value bucket create error: {0}")]
	CreateKeyValue(#[from] CreateKeyValueError),

	#[error("Key-value read error: {0}")]
	Entry(#[from] EntryError),

	#[error("Key-value write error: {0}")]
	Put(#[from] PutError),
}
