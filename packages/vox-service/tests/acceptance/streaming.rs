use std::{sync::Arc, time::Duration};

use futures::StreamExt;

use vox_providers::PollBudget;
use vox_service::{ChunkStatus, StreamEvent};
use vox_testkit::ScriptedPipeline;

const RESPONSE: &str = "Hello world. This is a test, and it continues further.";

#[test]
fn split_reconstructs_the_response_within_duration_bounds() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));
	let chunks = service.streamer.split(RESPONSE);
	let joined = chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>().join(" ");

	assert_eq!(joined, RESPONSE);

	for chunk in &chunks[..chunks.len() - 1] {
		assert!(
			(0.5..=1.0).contains(&chunk.estimated_duration_seconds),
			"Chunk {:?} lasts {}s.",
			chunk.text,
			chunk.estimated_duration_seconds
		);
	}
}

#[test]
fn split_keeps_every_chunk_within_bounds_for_mixed_tokens() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));
	let inputs = [
		"Hello well-known world, said the old man.",
		"Try our state-of-the-art model today, friend.",
		"Order #4521 ships on 2024-05-01, costs $1,299.99, and arrives by 9:30.",
		"He replied, \"absolutely not,\" then left. 'Fine,' she said.",
	];

	for text in inputs {
		let chunks = service.streamer.split(text);

		assert!(!chunks.is_empty(), "No chunks for {text:?}.");

		for chunk in &chunks {
			assert!(
				(0.5..=1.0).contains(&chunk.estimated_duration_seconds),
				"Chunk {:?} of {text:?} lasts {}s.",
				chunk.text,
				chunk.estimated_duration_seconds
			);
			assert!(text.contains(&chunk.text));
		}
	}
}

#[tokio::test]
async fn stream_yields_ordered_chunks_then_summary() {
	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = super::service(pipeline.clone());
	let events: Vec<StreamEvent> = service.streamer.stream(RESPONSE).collect().await;
	let chunks = super::chunk_events(&events);
	let summary = super::summary(&events);

	assert_eq!(chunks.len(), 5);
	assert_eq!(events.len(), 6);

	for (idx, chunk) in chunks.iter().enumerate() {
		assert_eq!(chunk.chunk_number, idx + 1);
		assert_eq!(chunk.total_chunks, 5);
		assert_eq!(chunk.status, ChunkStatus::Ready);
		assert!(!chunk.cached);
		assert!((chunk.progress_percent - (idx + 1) as f32 * 20.0).abs() < 1e-4);
	}

	let ready = chunks.iter().filter(|chunk| chunk.status == ChunkStatus::Ready).count();

	assert_eq!(summary.total_chunks, 5);
	assert_eq!(summary.completed.len(), ready);
	assert_eq!(summary.failed_chunks, 0);
	assert_eq!(summary.completed[1].text, "This is");
	assert_eq!(pipeline.budgets()[0], PollBudget::new(60, Duration::from_millis(500)));
}

#[tokio::test]
async fn second_stream_reuses_cached_chunks() {
	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = super::service(pipeline.clone());
	let _: Vec<StreamEvent> = service.streamer.stream(RESPONSE).collect().await;

	assert_eq!(pipeline.call_count(), 5);

	let events: Vec<StreamEvent> = service.streamer.stream(RESPONSE).collect().await;

	assert!(super::chunk_events(&events).iter().all(|chunk| chunk.cached));
	assert_eq!(pipeline.call_count(), 5);
	assert!(service.cache.peek("Hello world.").await.unwrap().is_none());
}

#[tokio::test]
async fn failed_chunk_does_not_abort_the_stream() {
	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = super::service(pipeline.clone());

	pipeline.fail_on("This is");

	let events: Vec<StreamEvent> = service.streamer.stream(RESPONSE).collect().await;
	let chunks = super::chunk_events(&events);
	let summary = super::summary(&events);

	assert_eq!(chunks.len(), 5);
	assert_eq!(chunks[1].status, ChunkStatus::Failed);
	assert!(chunks[1].error.as_deref().unwrap().starts_with("Generation failed"));
	assert!(chunks[1].artifact_uri.is_none());
	assert_eq!(summary.failed_chunks, 1);
	assert_eq!(summary.completed.len(), 4);
	assert!(summary.completed.iter().all(|chunk| chunk.chunk_number != 2));
}

#[tokio::test(start_paused = true)]
async fn stalled_chunk_is_reported_as_a_generation_failure() {
	let mut cfg = vox_testkit::sample_config();

	cfg.streaming.poll_attempts = 2;
	cfg.streaming.poll_interval_ms = 10;
	cfg.streaming.generation_slack_ms = 10;

	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = super::service_with_config(cfg, pipeline.clone());

	pipeline.stall_on("a test,");

	let events: Vec<StreamEvent> = service.streamer.stream(RESPONSE).collect().await;
	let chunks = super::chunk_events(&events);

	assert_eq!(chunks[2].status, ChunkStatus::Failed);
	assert!(chunks[2].error.as_deref().unwrap().starts_with("Generation failed: Timed out"));
	assert_eq!(super::summary(&events).failed_chunks, 1);
}

#[tokio::test(start_paused = true)]
async fn chunks_generate_in_batches_of_three() {
	let pipeline = Arc::new(ScriptedPipeline::with_delay(Duration::from_millis(20)));
	let service = super::service(pipeline.clone());
	let events: Vec<StreamEvent> = service.streamer.stream(RESPONSE).collect().await;

	assert_eq!(super::chunk_events(&events).len(), 5);
	assert_eq!(pipeline.peak_concurrency(), 3);
	assert_eq!(pipeline.calls(), vec![
		"Hello world.",
		"This is",
		"a test,",
		"and it",
		"continues further."
	]);
}

#[tokio::test]
async fn too_short_response_only_yields_a_summary() {
	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = super::service(pipeline.clone());
	let events: Vec<StreamEvent> = service.streamer.stream("Hi.").collect().await;
	let summary = super::summary(&events);

	assert_eq!(events.len(), 1);
	assert_eq!(summary.total_chunks, 0);
	assert!(summary.completed.is_empty());
	assert_eq!(pipeline.call_count(), 0);
}
