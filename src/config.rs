//! Environment configuration for the bridge process.

use crate::bridge::backfill::DEFAULT_BACKFILL_PAGE_SIZE;
use crate::bridge::tail::DEFAULT_TAIL_PAGE_SIZE;

use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Invalid value {value:?} for {var}")]
	Invalid { var: &'static str, value: String },
}

/// Settings read from the environment (and an optional `.env` file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	pub nats_host: String,
	pub nats_user: String,
	pub nats_pass: String,
	/// Krist node base URL.
	pub krist_url: String,
	/// Stream that receives published transactions.
	pub stream: String,
	/// Key-value bucket holding checkpoints.
	pub kv_bucket: String,
	/// Period of the tail timer.
	pub poll_interval: Duration,
	pub backfill_page_size: usize,
	pub tail_page_size: usize,
}

impl Config {
	pub fn from_env() -> Result<Self, ConfigError> {
		dotenv::dotenv().ok();
		Self::from_lookup(|var| std::env::var(var).ok())
	}

	/// Build the configuration from an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let text = |var: &str, default: &str| lookup(var).unwrap_or_else(|| default.to_string());

		let poll_interval_ms: u64 = parse(&lookup, "BRIDGE_POLL_INTERVAL_MS", 1000)?;
		let backfill_page_size = parse(
			&lookup,
			"BRIDGE_BACKFILL_PAGE_SIZE",
			DEFAULT_BACKFILL_PAGE_SIZE,
		)?;
		let tail_page_size = parse(&lookup, "BRIDGE_TAIL_PAGE_SIZE", DEFAULT_TAIL_PAGE_SIZE)?;

		Ok(Self {
			nats_host: text("NATS_HOST", "127.0.0.1"),
			nats_user: text("NATS_USER", "krist"),
			nats_pass: text("NATS_PASS", "krist"),
			krist_url: text("KRIST_URL", "https://krist.dev"),
			stream: text("BRIDGE_STREAM", "krist"),
			kv_bucket: text("BRIDGE_KV_BUCKET", "kats"),
			poll_interval: Duration::from_millis(positive(
				"BRIDGE_POLL_INTERVAL_MS",
				poll_interval_ms,
			)?),
			backfill_page_size: positive("BRIDGE_BACKFILL_PAGE_SIZE", backfill_page_size)?,
			tail_page_size: positive("BRIDGE_TAIL_PAGE_SIZE", tail_page_size)?,
		})
	}
}

fn parse<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
	F: Fn(&str) -> Option<String>,
	T: FromStr,
{
	match lookup(var) {
		Some(value) => value
			.trim()
			.parse()
			.map_err(|_| ConfigError::Invalid { var, value }),
		None => Ok(default),
	}
}

fn positive<T>(var: &'static str, value: T) -> Result<T, ConfigError>
where
	T: Default + PartialEq + ToString,
{
	if value == T::default() {
		return Err(ConfigError::Invalid {
			var,
			value: value.to_string(),
		});
	}
	Ok(value)
}
