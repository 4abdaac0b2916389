use std::{
	collections::HashSet,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::Duration,
};

use futures::future;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, Result, cache::SmartCache, prediction::PredictionEngine};
use vox_providers::{GenerationPipeline, PollBudget};
use vox_storage::KvStore;

pub const PENDING_KEY: &str = "pregen:pending";
pub const JOB_PREFIX: &str = "pregen:job:";

const SECONDS_PER_HOUR: u64 = 3_600;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Pending,
	Processing,
	Completed,
	Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
	pub job_id: String,
	pub response_text: String,
	pub priority: f32,
	pub status: JobStatus,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(default, with = "crate::time_serde::option")]
	pub started_at: Option<OffsetDateTime>,
	#[serde(default, with = "crate::time_serde::option")]
	pub completed_at: Option<OffsetDateTime>,
	pub result_uri: Option<String>,
	pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingJob {
	pub job_id: String,
	pub priority: f32,
}

/// Priority queue of pre-generation jobs, drained through the live generation pipeline.
///
/// Pulling a job removes it from the pending collection in the same store operation, so no two
/// drains ever run the same pending entry.
pub struct PreGenerationScheduler {
	store: Arc<dyn KvStore>,
	pipeline: Arc<dyn GenerationPipeline>,
	cache: Arc<SmartCache>,
	predictions: Arc<PredictionEngine>,
	cfg: vox_config::Scheduler,
}
impl PreGenerationScheduler {
	pub fn new(
		store: Arc<dyn KvStore>,
		pipeline: Arc<dyn GenerationPipeline>,
		cache: Arc<SmartCache>,
		predictions: Arc<PredictionEngine>,
		cfg: vox_config::Scheduler,
	) -> Self {
		Self { store, pipeline, cache, predictions, cfg }
	}

	pub fn budget(&self) -> PollBudget {
		PollBudget::new(self.cfg.poll_attempts, Duration::from_millis(self.cfg.poll_interval_ms))
	}

	/// Adds `text` to the pending collection and returns its job id.
	///
	/// The queue does not deduplicate: enqueueing the same text twice leaves two pending entries
	/// that share one job record.
	pub async fn enqueue(&self, text: &str, priority: f32) -> Result<String> {
		if text.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "text must be non-empty.".to_string() });
		}
		if !priority.is_finite() {
			return Err(Error::InvalidRequest {
				message: "priority must be a finite number.".to_string(),
			});
		}

		let priority = priority.clamp(0.0, 1.0);
		let job_id = vox_domain::short_hash(text);
		let job = GenerationJob {
			job_id: job_id.clone(),
			response_text: text.trim().to_string(),
			priority,
			status: JobStatus::Pending,
			created_at: OffsetDateTime::now_utc(),
			started_at: None,
			completed_at: None,
			result_uri: None,
			error: None,
		};

		self.save_job(&job).await?;
		self.store.zadd(PENDING_KEY, &pending_member(&job_id), priority as f64).await?;

		tracing::debug!(job_id, priority, "Pre-generation job enqueued.");

		Ok(job_id)
	}

	/// Pulls up to `max_jobs` distinct highest-priority pending jobs and generates them
	/// concurrently. Returns the processed job ids in pull order.
	///
	/// Generation failures are recorded on their job and never abort sibling jobs.
	pub async fn drain(&self, max_jobs: usize) -> Vec<String> {
		if max_jobs == 0 {
			return Vec::new();
		}

		let mut seen = HashSet::new();
		let mut jobs = Vec::with_capacity(max_jobs);

		// Duplicate entries of a claimed job are consumed without taking a slot.
		while seen.len() < max_jobs {
			let pulled = match self.store.zpop_max(PENDING_KEY, max_jobs - seen.len()).await {
				Ok(pulled) => pulled,
				Err(err) => {
					tracing::warn!(error = %err, "Failed to pull pending jobs.");

					break;
				},
			};

			if pulled.is_empty() {
				break;
			}

			for entry in pulled {
				let job_id = job_id_of(&entry.member).to_string();

				if !seen.insert(job_id.clone()) {
					continue;
				}

				match self.start_job(&job_id).await {
					Ok(Some(job)) => jobs.push(job),
					Ok(None) => tracing::warn!(job_id, "Pending job has no record. Skipping."),
					Err(err) => tracing::warn!(error = %err, job_id, "Failed to start job."),
				}
			}
		}

		let ids = jobs.iter().map(|job| job.job_id.clone()).collect();

		future::join_all(jobs.into_iter().map(|job| self.process(job))).await;

		ids
	}

	/// Enqueues every top prediction above the probability floor, at its probability.
	pub async fn pregenerate_top_predictions(&self, limit: usize) -> Result<Vec<String>> {
		let mut job_ids = Vec::new();

		for prediction in self.predictions.top_predictions(limit).await {
			if prediction.probability <= self.cfg.min_probability {
				continue;
			}

			job_ids.push(self.enqueue(&prediction.response_text, prediction.probability).await?);
		}

		if !job_ids.is_empty() {
			tracing::info!(count = job_ids.len(), "Top predictions queued for pre-generation.");
		}

		Ok(job_ids)
	}

	pub async fn get_job(&self, job_id: &str) -> Result<Option<GenerationJob>> {
		let Some(raw) = self.store.get(&job_key(job_id)).await? else {
			return Ok(None);
		};

		Ok(Some(serde_json::from_str(&raw)?))
	}

	pub async fn pending_count(&self) -> Result<usize> {
		Ok(self.store.zcard(PENDING_KEY).await?)
	}

	/// The next `limit` pending entries in pull order, without removing them.
	pub async fn pending(&self, limit: usize) -> Result<Vec<PendingJob>> {
		let members = self.store.zrange_desc(PENDING_KEY, limit).await?;

		Ok(members
			.into_iter()
			.map(|entry| PendingJob {
				job_id: job_id_of(&entry.member).to_string(),
				priority: entry.score as f32,
			})
			.collect())
	}

	async fn start_job(&self, job_id: &str) -> Result<Option<GenerationJob>> {
		let Some(mut job) = self.get_job(job_id).await? else {
			return Ok(None);
		};

		job.status = JobStatus::Processing;
		job.started_at = Some(OffsetDateTime::now_utc());
		job.completed_at = None;
		job.result_uri = None;
		job.error = None;

		self.save_job(&job).await?;

		Ok(Some(job))
	}

	async fn process(&self, mut job: GenerationJob) {
		match self.generate(&job).await {
			Ok(uri) => {
				job.status = JobStatus::Completed;
				job.result_uri = Some(uri);

				tracing::info!(job_id = job.job_id, "Pre-generation job completed.");
			},
			Err(err) => {
				let err = err.into_generation();

				job.status = JobStatus::Failed;
				job.error = Some(err.to_string());

				tracing::warn!(error = %err, job_id = job.job_id, "Pre-generation job failed.");
			},
		}

		job.completed_at = Some(OffsetDateTime::now_utc());

		if let Err(err) = self.save_job(&job).await {
			tracing::error!(error = %err, job_id = job.job_id, "Failed to record job outcome.");
		}
	}

	async fn generate(&self, job: &GenerationJob) -> Result<String> {
		match self.cache.peek(&job.response_text).await {
			Ok(Some(entry)) => {
				tracing::debug!(job_id = job.job_id, "Response already cached. Skipping generation.");

				return Ok(entry.artifact_uri);
			},
			Ok(None) => {},
			Err(err) => tracing::warn!(error = %err, job_id = job.job_id, "Cache peek failed."),
		}

		let budget = self.budget();
		let limit = budget.window() + Duration::from_millis(self.cfg.generation_slack_ms);
		let artifact =
			match tokio::time::timeout(limit, self.pipeline.generate(&job.response_text, budget))
				.await
			{
				Ok(result) => result?,
				Err(_) =>
					return Err(Error::Timeout {
						message: format!("Generation exceeded {} ms.", limit.as_millis()),
					}),
			};
		let metadata = serde_json::json!({
			"source": "pregeneration",
			"job_id": job.job_id,
			"job_code": artifact.job_code,
			"audio_url": artifact.audio_url,
		});

		self.cache.put(&job.response_text, &artifact.uri, metadata).await?;

		Ok(artifact.uri)
	}

	async fn save_job(&self, job: &GenerationJob) -> Result<()> {
		let ttl = Duration::from_secs(self.cfg.job_ttl_hours.max(0) as u64 * SECONDS_PER_HOUR);

		self.store.set(&job_key(&job.job_id), &serde_json::to_string(job)?, Some(ttl)).await?;

		Ok(())
	}
}

fn job_key(job_id: &str) -> String {
	format!("{JOB_PREFIX}{job_id}")
}

// Each enqueue gets its own member so repeated text stays as separate pending entries.
fn pending_member(job_id: &str) -> String {
	static NONCE: AtomicU64 = AtomicU64::new(0);

	let nonce = NONCE.fetch_add(1, Ordering::Relaxed);

	format!("{job_id}:{}:{nonce}", OffsetDateTime::now_utc().unix_timestamp_nanos())
}

fn job_id_of(member: &str) -> &str {
	member.split(':').next().unwrap_or(member)
}
