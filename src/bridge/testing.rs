//! In-memory collaborators for engine tests.

use crate::bridge::checkpoint::CheckpointStore;
use crate::broker::{BrokerError, StreamPublisher};
use crate::krist::{KristError, LedgerApi, Transaction, TransactionPage};

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::Mutex;

/// Build a plain transfer (or a reserved one, depending on the arguments).
pub fn tx(id: u64, from: Option<&str>, to: &str) -> Transaction {
	Transaction {
		id,
		from: from.map(str::to_string),
		to: to.to_string(),
		value: 1,
		time: "2024-01-02T03:04:05.000Z".to_string(),
		extra: serde_json::Map::new(),
	}
}

/// Ledger of `count` ordinary transfers with ids `1..=count`.
pub fn ledger_of(count: u64) -> FakeLedger {
	FakeLedger {
		transactions: (1..=count)
			.map(|id| tx(id, Some("kaaaaaaaaa"), "kbbbbbbbbb"))
			.collect(),
		..Default::default()
	}
}

#[derive(Default)]
pub struct FakeLedger {
	transactions: Vec<Transaction>,
	fail_at: Mutex<Option<u64>>,
	appends: Option<(usize, Vec<Transaction>)>,
	history_calls: Mutex<Vec<u64>>,
	latest_calls: Mutex<Vec<u64>>,
}

impl FakeLedger {
	/// Fail any listing request made at `offset`.
	pub fn failing_at(self, offset: u64) -> Self {
		*self.fail_at.lock().unwrap() = Some(offset);
		self
	}

	pub fn clear_failure(&self) {
		*self.fail_at.lock().unwrap() = None;
	}

	pub fn with_sender(mut self, id: u64, from: Option<&str>) -> Self {
		if let Some(transaction) = self.transactions.iter_mut().find(|t| t.id == id) {
			transaction.from = from.map(str::to_string);
		}
		self
	}

	pub fn with_recipient(mut self, id: u64, to: &str) -> Self {
		if let Some(transaction) = self.transactions.iter_mut().find(|t| t.id == id) {
			transaction.to = to.to_string();
		}
		self
	}

	/// Append transfers with ids `ids` right before the newest-first listing is
	/// requested for the `call`-th time (zero based).
	pub fn growing_before_latest_call(mut self, call: usize, ids: RangeInclusive<u64>) -> Self {
		let appended = ids
			.map(|id| tx(id, Some("kaaaaaaaaa"), "kbbbbbbbbb"))
			.collect();
		self.appends = Some((call, appended));
		self
	}

	/// Offsets requested from the ascending listing.
	pub fn history_offsets(&self) -> Vec<u64> {
		self.history_calls.lock().unwrap().clone()
	}

	/// Offsets requested from the newest-first listing.
	pub fn latest_offsets(&self) -> Vec<u64> {
		self.latest_calls.lock().unwrap().clone()
	}

	fn check_failure(&self, offset: u64) -> Result<(), KristError> {
		if *self.fail_at.lock().unwrap() == Some(offset) {
			return Err(KristError::Api("rate_limit_hit".to_string()));
		}
		Ok(())
	}

	fn page<'a>(
		transactions: impl Iterator<Item = &'a Transaction>,
		limit: usize,
		offset: u64,
		total: u64,
	) -> TransactionPage {
		let transactions: Vec<Transaction> = transactions
			.skip(offset as usize)
			.take(limit)
			.cloned()
			.collect();
		TransactionPage {
			count: transactions.len(),
			total,
			transactions,
		}
	}
}

#[async_trait::async_trait]
impl LedgerApi for FakeLedger {
	async fn list_transactions(
		&self,
		limit: usize,
		offset: u64,
	) -> Result<TransactionPage, KristError> {
		self.history_calls.lock().unwrap().push(offset);
		self.check_failure(offset)?;
		let total = self.transactions.len() as u64;
		Ok(Self::page(self.transactions.iter(), limit, offset, total))
	}

	async fn list_latest_transactions(
		&self,
		limit: usize,
		offset: u64,
	) -> Result<TransactionPage, KristError> {
		let call = {
			let mut calls = self.latest_calls.lock().unwrap();
			calls.push(offset);
			calls.len() - 1
		};
		self.check_failure(offset)?;

		let mut transactions = self.transactions.clone();
		if let Some((at, appended)) = &self.appends {
			if call >= *at {
				transactions.extend(appended.iter().cloned());
			}
		}

		let total = transactions.len() as u64;
		Ok(Self::page(transactions.iter().rev(), limit, offset, total))
	}
}

/// Checkpoint store that also keeps every value written per key.
#[derive(Default)]
pub struct MemoryStore {
	values: Mutex<HashMap<String, Vec<u8>>>,
	writes: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryStore {
	/// Seed a value without recording it as a write.
	pub fn insert(&self, key: &str, value: &[u8]) {
		self.values
			.lock()
			.unwrap()
			.insert(key.to_string(), value.to_vec());
	}

	pub fn raw(&self, key: &str) -> Option<String> {
		self.values
			.lock()
			.unwrap()
			.get(key)
			.map(|value| String::from_utf8_lossy(value).into_owned())
	}

	/// Values written under `key`, oldest first.
	pub fn history(&self, key: &str) -> Vec<String> {
		self.writes
			.lock()
			.unwrap()
			.iter()
			.filter(|(k, _)| k == key)
			.map(|(_, value)| String::from_utf8_lossy(value).into_owned())
			.collect()
	}
}

#[async_trait::async_trait]
impl CheckpointStore for MemoryStore {
	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BrokerError> {
		Ok(self.values.lock().unwrap().get(key).cloned())
	}

	async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), BrokerError> {
		self.writes
			.lock()
			.unwrap()
			.push((key.to_string(), value.clone()));
		self.values.lock().unwrap().insert(key.to_string(), value);
		Ok(())
	}
}

#[derive(Debug, Clone)]
pub struct Published {
	pub subject: String,
	pub dedup_id: String,
	pub transaction: Transaction,
}

/// Broker that records publishes and drops duplicate dedup ids the way JetStream does.
#[derive(Default)]
pub struct RecordingBroker {
	published: Mutex<Vec<Published>>,
	seen: Mutex<HashSet<String>>,
	delivered: Mutex<Vec<u64>>,
	last_message: Mutex<Option<Vec<u8>>>,
	last_message_subjects: Mutex<Vec<String>>,
}

impl RecordingBroker {
	/// Every publish call, duplicates included.
	pub fn published(&self) -> Vec<Published> {
		self.published.lock().unwrap().clone()
	}

	/// Ids a consumer would see, in delivery order.
	pub fn delivered_ids(&self) -> Vec<u64> {
		self.delivered.lock().unwrap().clone()
	}

	pub fn set_last_message(&self, transaction: &Transaction) {
		*self.last_message.lock().unwrap() = Some(serde_json::to_vec(transaction).unwrap());
	}

	pub fn last_message_subjects(&self) -> Vec<String> {
		self.last_message_subjects.lock().unwrap().clone()
	}
}

#[async_trait::async_trait]
impl StreamPublisher for RecordingBroker {
	async fn publish(
		&self,
		subject: String,
		payload: Vec<u8>,
		dedup_id: String,
	) -> Result<bool, BrokerError> {
		let transaction: Transaction = serde_json::from_slice(&payload).unwrap();
		let fresh = self.seen.lock().unwrap().insert(dedup_id.clone());
		if fresh {
			self.delivered.lock().unwrap().push(transaction.id);
		}
		self.published.lock().unwrap().push(Published {
			subject,
			dedup_id,
			transaction,
		});
		Ok(fresh)
	}

	async fn last_message(&self, subject: &str) -> Result<Option<Vec<u8>>, BrokerError> {
		self.last_message_subjects
			.lock()
			.unwrap()
			.push(subject.to_string());
		Ok(self.last_message.lock().unwrap().clone())
	}
}
