use std::{sync::Arc, time::Duration};

use futures::{Stream, future};
use serde::{Deserialize, Serialize};

use crate::{Error, cache::SmartCache};
use vox_chunking::{Chunk, ChunkingConfig};
use vox_providers::{GenerationPipeline, PollBudget};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
	Ready,
	Failed,
	Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkEvent {
	/// 1-based position in the response.
	pub chunk_number: usize,
	pub total_chunks: usize,
	pub text: String,
	pub status: ChunkStatus,
	pub progress_percent: f32,
	pub artifact_uri: Option<String>,
	pub cached: bool,
	pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletedChunk {
	pub chunk_number: usize,
	pub text: String,
	pub artifact_uri: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamSummary {
	pub total_chunks: usize,
	pub completed: Vec<CompletedChunk>,
	pub failed_chunks: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
	Chunk(ChunkEvent),
	Summary(StreamSummary),
}

struct ChunkOutcome {
	status: ChunkStatus,
	artifact_uri: Option<String>,
	cached: bool,
	error: Option<String>,
}
impl ChunkOutcome {
	fn ready(artifact_uri: String, cached: bool) -> Self {
		Self { status: ChunkStatus::Ready, artifact_uri: Some(artifact_uri), cached, error: None }
	}

	fn failed(status: ChunkStatus, err: Error) -> Self {
		Self { status, artifact_uri: None, cached: false, error: Some(err.to_string()) }
	}
}

/// Splits responses into short chunks and generates them batch by batch.
pub struct ProgressiveStreamer {
	pipeline: Arc<dyn GenerationPipeline>,
	cache: Arc<SmartCache>,
	cfg: vox_config::Streaming,
}
impl ProgressiveStreamer {
	pub fn new(
		pipeline: Arc<dyn GenerationPipeline>,
		cache: Arc<SmartCache>,
		cfg: vox_config::Streaming,
	) -> Self {
		Self { pipeline, cache, cfg }
	}

	pub fn chunking(&self) -> ChunkingConfig {
		ChunkingConfig {
			words_per_second: self.cfg.words_per_second,
			min_seconds: self.cfg.min_seconds,
			max_seconds: self.cfg.max_seconds,
			keep_trailing_fragment: self.cfg.keep_trailing_fragment,
		}
	}

	pub fn budget(&self) -> PollBudget {
		PollBudget::new(self.cfg.poll_attempts, Duration::from_millis(self.cfg.poll_interval_ms))
	}

	pub fn split(&self, text: &str) -> Vec<Chunk> {
		vox_chunking::split_text(text, &self.chunking())
	}

	/// Chunk events in text order, then one summary event.
	///
	/// Each batch is generated concurrently and yielded only after the whole batch resolves. A
	/// failed chunk is reported and the stream moves on.
	pub fn stream<'a>(&'a self, response_text: &'a str) -> impl Stream<Item = StreamEvent> + Send + 'a {
		async_stream::stream! {
			let chunks = self.split(response_text);
			let total_chunks = chunks.len();
			let batch_size = (self.cfg.batch_size as usize).max(1);
			let mut completed = Vec::new();
			let mut failed_chunks = 0;

			for batch in chunks.chunks(batch_size) {
				let outcomes = future::join_all(batch.iter().map(|chunk| self.generate(chunk))).await;

				for (chunk, outcome) in batch.iter().zip(outcomes) {
					let chunk_number = chunk.index + 1;

					match outcome.artifact_uri.as_ref() {
						Some(uri) if outcome.status == ChunkStatus::Ready => completed.push(CompletedChunk {
							chunk_number,
							text: chunk.text.clone(),
							artifact_uri: uri.clone(),
						}),
						_ => failed_chunks += 1,
					}

					yield StreamEvent::Chunk(ChunkEvent {
						chunk_number,
						total_chunks,
						text: chunk.text.clone(),
						status: outcome.status,
						progress_percent: chunk_number as f32 / total_chunks as f32 * 100.0,
						artifact_uri: outcome.artifact_uri,
						cached: outcome.cached,
						error: outcome.error,
					});
				}
			}

			tracing::debug!(total_chunks, completed = completed.len(), failed_chunks, "Stream finished.");

			yield StreamEvent::Summary(StreamSummary { total_chunks, completed, failed_chunks });
		}
	}

	async fn generate(&self, chunk: &Chunk) -> ChunkOutcome {
		if let Some(entry) = self.cache.get(&chunk.text).await {
			return ChunkOutcome::ready(entry.artifact_uri, true);
		}

		let budget = self.budget();
		let limit = budget.window() + Duration::from_millis(self.cfg.generation_slack_ms);
		let artifact =
			match tokio::time::timeout(limit, self.pipeline.generate(&chunk.text, budget)).await {
				Ok(Ok(artifact)) => artifact,
				Ok(Err(err)) => {
					let err = Error::from(err).into_generation();

					tracing::warn!(error = %err, chunk = chunk.index, "Chunk generation failed.");

					return ChunkOutcome::failed(ChunkStatus::Failed, err);
				},
				Err(_) => {
					tracing::warn!(chunk = chunk.index, "Chunk generation timed out.");

					return ChunkOutcome::failed(
						ChunkStatus::Failed,
						Error::Timeout {
							message: format!("Chunk generation exceeded {} ms.", limit.as_millis()),
						}
						.into_generation(),
					);
				},
			};
		let metadata = serde_json::json!({
			"source": "stream",
			"chunk_index": chunk.index,
			"job_code": artifact.job_code,
			"audio_url": artifact.audio_url,
		});

		match self.cache.put(&chunk.text, &artifact.uri, metadata).await {
			Ok(_) => ChunkOutcome::ready(artifact.uri, false),
			Err(err) => {
				tracing::warn!(error = %err, chunk = chunk.index, "Failed to cache chunk artifact.");

				ChunkOutcome::failed(ChunkStatus::Error, err)
			},
		}
	}
}
