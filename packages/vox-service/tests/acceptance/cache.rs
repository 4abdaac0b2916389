use std::{sync::Arc, time::Duration};

use serde_json::json;

use vox_testkit::ScriptedPipeline;

#[tokio::test]
async fn equal_normalized_text_hits_the_same_entry() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));

	service.cache.put("Hello World.", "https://cdn.test/a.mp4", json!({})).await.unwrap();

	for variant in ["hello world.", "  HELLO WORLD.\n", "Hello World."] {
		let entry = service.cache.get(variant).await.expect("Variant should hit the cache.");

		assert_eq!(entry.artifact_uri, "https://cdn.test/a.mp4");
	}

	assert_eq!(service.cache.entry_key("Hello World."), service.cache.entry_key(" hello world. "));
}

#[tokio::test]
async fn put_then_get_counts_hits() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));

	service.cache.put("Status ok.", "uri-1", json!({ "source": "test" })).await.unwrap();

	let first = service.cache.get("Status ok.").await.unwrap();

	assert_eq!(first.hit_count, 1);
	assert_eq!(first.artifact_uri, "uri-1");
	assert_eq!(first.metadata["source"], "test");
	assert!(first.last_hit_at.is_some());
	assert_eq!(service.cache.get("Status ok.").await.unwrap().hit_count, 2);

	let peeked = service.cache.peek("Status ok.").await.unwrap().unwrap();

	assert_eq!(peeked.hit_count, 2);

	service.cache.put("Status ok.", "uri-2", json!({})).await.unwrap();

	let replaced = service.cache.get("Status ok.").await.unwrap();

	assert_eq!(replaced.hit_count, 1);
	assert_eq!(replaced.artifact_uri, "uri-2");
}

#[tokio::test(start_paused = true)]
async fn expired_entry_is_a_miss() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));

	service.cache.put("Status ok.", "uri-1", json!({})).await.unwrap();

	tokio::time::advance(Duration::from_secs(7 * 86_400 + 1)).await;

	assert!(service.cache.get("Status ok.").await.is_none());
	assert_eq!(service.cache.stats().await.misses, 1);
}

#[tokio::test(start_paused = true)]
async fn hits_refresh_the_entry_ttl() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));

	service.cache.put("Status ok.", "uri-1", json!({})).await.unwrap();

	tokio::time::advance(Duration::from_secs(6 * 86_400)).await;

	assert!(service.cache.get("Status ok.").await.is_some());

	tokio::time::advance(Duration::from_secs(6 * 86_400)).await;

	let entry = service.cache.get("Status ok.").await.expect("Hit should have refreshed the TTL.");

	assert_eq!(entry.hit_count, 2);
}

#[tokio::test]
async fn stats_cover_hits_misses_and_sets() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));

	service.cache.put("Status ok.", "uri-1", json!({})).await.unwrap();
	service.cache.get("Status ok.").await;
	service.cache.get("Unknown.").await;

	let stats = service.cache.stats().await;

	assert_eq!(stats.hits, 1);
	assert_eq!(stats.misses, 1);
	assert_eq!(stats.sets, 1);
	assert_eq!(stats.total_requests, 2);
	assert!((stats.hit_rate - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn hit_probability_blends_similar_predictions_and_cache_coverage() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));

	service.history.record("paris weather today", "It is sunny in Paris.", None).await.unwrap();
	service.cache.put("It is sunny in Paris.", "uri-sunny", json!({})).await.unwrap();

	assert_eq!(service.cache.predict_hit_probability("It is sunny in Paris.").await, 1.0);
	assert_eq!(service.cache.predict_hit_probability("completely unrelated").await, 0.0);

	let probability = service.cache.predict_hit_probability("paris weather tomorrow").await;

	assert!((probability - 0.7).abs() < 1e-6, "Unexpected probability {probability}.");
}

#[tokio::test]
async fn invalidate_removes_the_entry() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));

	service.cache.put("Status ok.", "uri-1", json!({})).await.unwrap();

	assert!(service.cache.invalidate("status ok.").await.unwrap());
	assert!(service.cache.peek("Status ok.").await.unwrap().is_none());
	assert!(!service.cache.invalidate("Status ok.").await.unwrap());
}
