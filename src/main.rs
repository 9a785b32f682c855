mod bridge;
mod broker;
mod config;
mod krist;

use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::bridge::{
	BackfillController, BridgeError, Checkpoints, Dispatcher, KvCheckpointStore, Publisher,
	TailController, publisher::catch_all_subject,
};
use crate::broker::{JetStreamBroker, StreamSpec};
use crate::config::Config;
use crate::krist::{KristClient, PushEvent, PushListener};

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let config = match Config::from_env() {
		Ok(config) => config,
		Err(e) => {
			error!("Invalid configuration: {}", e);
			std::process::exit(1);
		}
	};

	let nats = match broker::connect(&config.nats_host, &config.nats_user, &config.nats_pass).await
	{
		Ok(client) => client,
		Err(e) => {
			error!("Failed to connect to NATS: {}", e);
			std::process::exit(1);
		}
	};

	let result = run(&config, nats.clone()).await;
	broker::close(nats).await;

	if let Err(e) = result {
		error!("Bridge stopped: {}", e);
		std::process::exit(1);
	}
}

async fn run(config: &Config, nats: async_nats::Client) -> Result<(), BridgeError> {
	let jetstream = Arc::new(JetStreamBroker::new(nats, config.stream.clone()));

	broker::ensure_stream(
		jetstream.as_ref(),
		&StreamSpec {
			name: config.stream.clone(),
			subjects: vec![catch_all_subject()],
		},
	)
	.await?;

	let store = jetstream.open_kv(&config.kv_bucket).await?;
	info!("Key-value bucket {} ready", config.kv_bucket);

	let checkpoints = Checkpoints::new(Arc::new(KvCheckpointStore::new(store)));
	let krist = KristClient::new(config.krist_url.clone())?;
	let ledger = Arc::new(krist.clone());
	let publisher = Arc::new(Publisher::new(jetstream.clone()));

	let stats = BackfillController::new(
		ledger.clone(),
		publisher.clone(),
		checkpoints.clone(),
		config.backfill_page_size,
	)
	.run()
	.await?;
	info!(
		"Backfill complete: {} pages, {} transactions, {} published",
		stats.pages, stats.transactions, stats.published
	);

	let tail = Arc::new(TailController::new(
		ledger,
		publisher,
		jetstream,
		checkpoints,
		config.tail_page_size,
	));
	let (dispatcher, worker) = Dispatcher::spawn(tail);

	let push_dispatcher = dispatcher.clone();
	let listener = PushListener::new(krist);
	let listener_task = tokio::spawn(async move {
		listener
			.run(move |event| match event {
				PushEvent::Transaction(id) => {
					debug!("Push notification for transaction {}", id);
					push_dispatcher.trigger();
				}
				PushEvent::Open => {
					info!("Krist push channel open");
					push_dispatcher.trigger();
				}
				PushEvent::Close => warn!("Krist push channel closed"),
				PushEvent::Error(e) => error!("Krist push channel error: {}", e),
			})
			.await;
	});

	let timer_dispatcher = dispatcher.clone();
	let poll_interval = config.poll_interval;
	let timer_task = tokio::spawn(async move {
		let mut ticker = tokio::time::interval(poll_interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
		loop {
			ticker.tick().await;
			if !timer_dispatcher.trigger() {
				debug!("Tail busy, {} runs pending", timer_dispatcher.depth());
			}
		}
	});

	info!("Tailing Krist transactions");
	let signal = shutdown_signal().await;
	info!("Shutting down");

	listener_task.abort();
	timer_task.abort();
	let _ = listener_task.await;
	let _ = timer_task.await;
	drop(dispatcher);
	if let Err(e) = worker.await {
		error!("Dispatcher worker failed: {}", e);
	}

	signal?;
	Ok(())
}

/// Wait for Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{SignalKind, signal};

		let mut terminate = signal(SignalKind::terminate())?;
		tokio::select! {
			result = tokio::signal::ctrl_c() => result,
			_ = terminate.recv() => {
				info!("Received SIGTERM");
				Ok(())
			}
		}
	}

	#[cfg(not(unix))]
	{
		tokio::signal::ctrl_c().await
	}
}
