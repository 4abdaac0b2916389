use std::time::Duration;

use tokio::time::{self as tokio_time, Instant};
use tokio_util::sync::CancellationToken;

use vox_service::VoxService;
use vox_storage::KvStore;

/// What one loop iteration did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Iteration {
	pub drained: Vec<String>,
	pub warmed: Vec<String>,
	pub purged: Option<u64>,
}

pub struct WorkerState {
	pub service: VoxService,
	last_purge: Instant,
}
impl WorkerState {
	pub fn new(service: VoxService) -> Self {
		Self { service, last_purge: Instant::now() }
	}

	fn interval(&self) -> Duration {
		Duration::from_secs(self.service.cfg.scheduler.interval_seconds)
	}

	fn purge_interval(&self) -> Duration {
		Duration::from_secs(self.service.cfg.scheduler.purge_interval_seconds)
	}
}

/// Runs iterations until `shutdown` fires. An in-flight iteration always completes; only the
/// sleep between iterations is interrupted.
pub async fn run(mut state: WorkerState, shutdown: CancellationToken) {
	while !shutdown.is_cancelled() {
		run_once(&mut state).await;

		tokio::select! {
			_ = shutdown.cancelled() => break,
			_ = tokio_time::sleep(state.interval()) => {},
		}
	}
}

/// One unit of work: drain the queue, warm top predictions when the queue is empty, then purge
/// expired store rows when the purge interval has elapsed. Failures are logged, never returned.
pub async fn run_once(state: &mut WorkerState) -> Iteration {
	let scheduler = &state.service.scheduler;
	let cfg = &state.service.cfg.scheduler;
	let mut iteration = Iteration {
		drained: scheduler.drain(cfg.drain_max_jobs as usize).await,
		..Default::default()
	};

	if !iteration.drained.is_empty() {
		tracing::info!(count = iteration.drained.len(), "Pre-generation jobs processed.");
	}

	match scheduler.pending_count().await {
		Ok(0) => match scheduler.pregenerate_top_predictions(cfg.top_predictions_limit as usize).await
		{
			Ok(job_ids) => iteration.warmed = job_ids,
			Err(err) => tracing::error!(error = %err, "Top prediction warming failed."),
		},
		Ok(_) => {},
		Err(err) => tracing::error!(error = %err, "Pending queue size lookup failed."),
	}

	let now = Instant::now();

	if now.duration_since(state.last_purge) >= state.purge_interval() {
		state.last_purge = now;

		match state.service.store.purge_expired().await {
			Ok(count) => {
				tracing::debug!(count, "Expired store rows purged.");

				iteration.purged = Some(count);
			},
			Err(err) => tracing::error!(error = %err, "Store purge failed."),
		}
	}

	iteration
}
