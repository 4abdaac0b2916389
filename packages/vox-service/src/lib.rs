pub mod cache;
pub mod history;
pub mod prediction;
pub mod scheduler;
pub mod streamer;
pub mod time_serde;

mod error;

pub use cache::{CacheEntry, CacheStats, SmartCache};
pub use error::{Error, Result};
pub use history::{InteractionHistory, InteractionRecord};
pub use prediction::{Prediction, PredictionEngine, PredictionSource};
pub use scheduler::{GenerationJob, JobStatus, PendingJob, PreGenerationScheduler};
pub use streamer::{
	ChunkEvent, ChunkStatus, CompletedChunk, ProgressiveStreamer, StreamEvent, StreamSummary,
};

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use vox_config::{Config, StorageBackend};
use vox_providers::GenerationPipeline;
use vox_storage::{KvStore, MemoryStore, PgStore};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderedResponse {
	pub artifact_uri: String,
	pub cached: bool,
	pub hit_count: u64,
}

/// All components wired over one store and one generation pipeline.
pub struct VoxService {
	pub cfg: Config,
	pub store: Arc<dyn KvStore>,
	pub pipeline: Arc<dyn GenerationPipeline>,
	pub history: Arc<InteractionHistory>,
	pub predictions: Arc<PredictionEngine>,
	pub cache: Arc<SmartCache>,
	pub scheduler: PreGenerationScheduler,
	pub streamer: ProgressiveStreamer,
}
impl VoxService {
	pub fn new(cfg: Config, store: Arc<dyn KvStore>, pipeline: Arc<dyn GenerationPipeline>) -> Self {
		let history = Arc::new(InteractionHistory::new(store.clone(), cfg.history.clone()));
		let predictions = Arc::new(PredictionEngine::new(
			store.clone(),
			history.clone(),
			cfg.prediction.clone(),
		));
		let cache = Arc::new(
			SmartCache::new(store.clone(), cache::RESPONSE_NAMESPACE, cfg.cache.clone())
				.with_predictions(predictions.clone()),
		);
		let chunk_cache =
			Arc::new(SmartCache::new(store.clone(), cache::CHUNK_NAMESPACE, cfg.cache.clone()));
		let scheduler = PreGenerationScheduler::new(
			store.clone(),
			pipeline.clone(),
			cache.clone(),
			predictions.clone(),
			cfg.scheduler.clone(),
		);
		let streamer = ProgressiveStreamer::new(pipeline.clone(), chunk_cache, cfg.streaming.clone());

		Self { cfg, store, pipeline, history, predictions, cache, scheduler, streamer }
	}

	/// Live path: serve `text` from the cache, or generate it with the scheduler's budget and
	/// cache the artifact.
	pub async fn render_response(&self, text: &str) -> Result<RenderedResponse> {
		if text.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "text must be non-empty.".to_string() });
		}
		if let Some(entry) = self.cache.get(text).await {
			return Ok(RenderedResponse {
				artifact_uri: entry.artifact_uri,
				cached: true,
				hit_count: entry.hit_count,
			});
		}

		let budget = self.scheduler.budget();
		let limit = budget.window() + Duration::from_millis(self.cfg.scheduler.generation_slack_ms);
		let artifact = tokio::time::timeout(limit, self.pipeline.generate(text, budget))
			.await
			.map_err(|_| Error::Timeout {
				message: format!("Generation exceeded {} ms.", limit.as_millis()),
			})??;
		let metadata = serde_json::json!({
			"source": "live",
			"job_code": artifact.job_code,
			"audio_url": artifact.audio_url,
		});
		let entry = self.cache.put(text, &artifact.uri, metadata).await?;

		Ok(RenderedResponse { artifact_uri: entry.artifact_uri, cached: false, hit_count: 0 })
	}
}

/// Opens the configured store backend.
pub async fn connect_store(cfg: &Config) -> Result<Arc<dyn KvStore>> {
	match cfg.storage.backend {
		StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
		StorageBackend::Postgres => {
			let Some(postgres) = cfg.storage.postgres.as_ref() else {
				return Err(Error::InvalidRequest {
					message: "storage.postgres must be set when storage.backend is postgres."
						.to_string(),
				});
			};
			let store = PgStore::connect(postgres).await?;

			store.ensure_schema().await?;

			Ok(Arc::new(store))
		},
	}
}
