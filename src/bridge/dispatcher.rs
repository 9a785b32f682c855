//! Single-flight dispatch of sync jobs.
//!
//! Triggers may arrive from any task at any rate. At most one job run executes
//! at a time and at most one more waits behind it; anything beyond that is
//! coalesced into the run that is already queued.

use crate::bridge::types::BridgeError;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Queued plus running runs allowed before new triggers are dropped.
const MAX_DEPTH: usize = 2;

/// A unit of work the dispatcher can run repeatedly.
#[async_trait::async_trait]
pub trait SyncJob: Send + Sync {
	/// Run once, returning the number of items processed.
	async fn run(&self) -> Result<usize, BridgeError>;

	/// Get the name of this job for logging.
	fn name(&self) -> &'static str;
}

/// Handle for triggering runs. Cheap to clone; the worker stops once every
/// handle is dropped.
#[derive(Clone)]
pub struct Dispatcher {
	sender: mpsc::Sender<()>,
	depth: Arc<AtomicUsize>,
}

impl Dispatcher {
	/// Spawn the worker task for `job`.
	pub fn spawn<J>(job: Arc<J>) -> (Self, JoinHandle<()>)
	where
		J: SyncJob + ?Sized + 'static,
	{
		let (sender, receiver) = mpsc::channel(MAX_DEPTH);
		let depth = Arc::new(AtomicUsize::new(0));
		let worker = tokio::spawn(Self::work(job, receiver, depth.clone()));

		(Self { sender, depth }, worker)
	}

	/// Request a run. Returns `false` if the request was coalesced.
	pub fn trigger(&self) -> bool {
		let admitted = self
			.depth
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| {
				(depth < MAX_DEPTH).then_some(depth + 1)
			})
			.is_ok();

		if !admitted {
			debug!("Run already queued, dropping trigger");
			return false;
		}

		if self.sender.try_send(()).is_err() {
			self.depth.fetch_sub(1, Ordering::SeqCst);
			debug!("Dispatcher worker has stopped, dropping trigger");
			return false;
		}

		true
	}

	/// Number of runs queued or executing.
	pub fn depth(&self) -> usize {
		self.depth.load(Ordering::SeqCst)
	}

	async fn work<J>(job: Arc<J>, mut receiver: mpsc::Receiver<()>, depth: Arc<AtomicUsize>)
	where
		J: SyncJob + ?Sized,
	{
		while receiver.recv().await.is_some() {
			match job.run().await {
				Ok(0) => {}
				Ok(count) => debug!("{} run processed {} items", job.name(), count),
				Err(e) => error!("Error in {} run: {}", job.name(), e),
			}
			depth.fetch_sub(1, Ordering::SeqCst);
		}

		info!("{} dispatcher stopped", job.name());
	}
}
