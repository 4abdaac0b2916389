use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;

use vox_service::{CacheStats, ChunkStatus, Error, StreamEvent, VoxService};
use vox_testkit::{FailingStore, ScriptedPipeline};

fn broken(pipeline: Arc<ScriptedPipeline>) -> VoxService {
	super::service_with_store(vox_testkit::sample_config(), Arc::new(FailingStore), pipeline)
}

#[tokio::test]
async fn reads_degrade_to_empty_results() {
	let service = broken(Arc::new(ScriptedPipeline::new()));

	assert!(service.history.get_recent(10).await.is_empty());
	assert_eq!(service.history.keyword_count("paris").await, 0);
	assert!(service.predictions.predict("what is your name", 5).await.is_empty());
	assert!(service.predictions.top_predictions(10).await.is_empty());
	assert!(service.cache.get("Status ok.").await.is_none());
	assert_eq!(service.cache.stats().await, CacheStats::default());
	assert_eq!(service.cache.predict_hit_probability("Status ok.").await, 0.0);
}

#[tokio::test]
async fn critical_writes_report_store_errors() {
	let service = broken(Arc::new(ScriptedPipeline::new()));

	assert!(matches!(
		service.history.record("what is your name", "I am the assistant", None).await,
		Err(Error::Store { .. })
	));
	assert!(matches!(
		service.cache.put("Status ok.", "uri-1", json!({})).await,
		Err(Error::Store { .. })
	));
	assert!(matches!(service.scheduler.pending_count().await, Err(Error::Store { .. })));
}

#[tokio::test]
async fn stream_marks_uncacheable_chunks_as_errors() {
	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = broken(pipeline.clone());
	let events: Vec<StreamEvent> =
		service.streamer.stream("Hello world. This is a test.").collect().await;
	let chunks = super::chunk_events(&events);
	let summary = super::summary(&events);

	assert!(!chunks.is_empty());
	assert!(chunks.iter().all(|chunk| chunk.status == ChunkStatus::Error));
	assert!(summary.completed.is_empty());
	assert_eq!(summary.failed_chunks, chunks.len());
	assert_eq!(pipeline.call_count(), chunks.len());
}
