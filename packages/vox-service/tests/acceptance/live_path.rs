use std::sync::Arc;

use vox_service::Error;
use vox_testkit::ScriptedPipeline;

#[tokio::test]
async fn live_render_generates_once_then_serves_from_cache() {
	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = super::service(pipeline.clone());
	let first = service.render_response("I am the assistant").await.unwrap();

	assert!(!first.cached);
	assert_eq!(first.artifact_uri, ScriptedPipeline::uri_for("I am the assistant"));

	let second = service.render_response("i am the assistant ").await.unwrap();

	assert!(second.cached);
	assert_eq!(second.hit_count, 1);
	assert_eq!(second.artifact_uri, first.artifact_uri);
	assert_eq!(pipeline.call_count(), 1);
}

#[tokio::test]
async fn live_render_reports_generation_failures() {
	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = super::service(pipeline.clone());

	pipeline.fail_on("Render breaks.");

	assert!(matches!(
		service.render_response("Render breaks.").await,
		Err(Error::Generation { .. })
	));
	assert!(service.cache.peek("Render breaks.").await.unwrap().is_none());
}
