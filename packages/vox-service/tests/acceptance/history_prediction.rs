use std::{collections::HashSet, sync::Arc, time::Duration};

use vox_service::PredictionSource;
use vox_testkit::ScriptedPipeline;

#[tokio::test]
async fn exact_repeat_is_the_sole_top_prediction() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));

	for _ in 0..3 {
		service.history.record("what is your name", "I am the assistant", None).await.unwrap();
	}

	let predictions = service.predictions.predict("what is your name", 5).await;

	assert_eq!(predictions.len(), 1);
	assert_eq!(predictions[0].response_text, "I am the assistant");
	assert_eq!(predictions[0].source, PredictionSource::Exact);
	assert!(predictions[0].probability >= 0.9);
}

#[tokio::test]
async fn predictions_are_unique_and_ordered() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));
	let exchanges = [
		("paris weather today", "It is sunny in Paris."),
		("paris weather tomorrow", "Rain is expected in Paris."),
		("weather in paris", "It is sunny in Paris."),
		("best hotels paris", "Try the Ritz."),
		("paris weather today", "It is sunny in Paris."),
	];

	for (query, response) in exchanges {
		service.history.record(query, response, Some("user-1")).await.unwrap();
	}

	let predictions = service.predictions.predict("Paris weather today", 10).await;
	let unique: HashSet<String> = predictions
		.iter()
		.map(|prediction| vox_domain::cache_key(&prediction.response_text))
		.collect();

	assert!(!predictions.is_empty());
	assert_eq!(unique.len(), predictions.len());
	assert!(predictions.windows(2).all(|pair| pair[0].probability >= pair[1].probability));
	assert_eq!(predictions[0].response_text, "It is sunny in Paris.");
	assert_eq!(predictions[0].source, PredictionSource::Exact);
	assert_eq!(service.predictions.predict("Paris weather today", 1).await.len(), 1);
}

#[tokio::test]
async fn history_never_exceeds_capacity() {
	let mut cfg = vox_testkit::sample_config();

	cfg.history.capacity = 3;

	let service = super::service_with_config(cfg, Arc::new(ScriptedPipeline::new()));

	for idx in 0..5 {
		service.history.record(&format!("question {idx}"), &format!("answer {idx}"), None).await.unwrap();
	}

	let recent = service.history.get_recent(10).await;

	assert_eq!(recent.len(), 3);
	assert_eq!(recent[0].query_normalized, "question 2");
	assert_eq!(recent[2].response_text, "answer 4");
}

#[tokio::test]
async fn records_are_normalized_and_count_keywords() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));
	let record = service.history.record("  Weather in PARIS ", "Sunny.", None).await.unwrap();

	service.history.record("paris hotels", "Try the Ritz.", None).await.unwrap();

	assert_eq!(record.query_normalized, "weather in paris");
	assert_eq!(record.response_normalized, "sunny.");
	assert_eq!(service.history.keyword_count("paris").await, 2);
	assert_eq!(service.history.keyword_count("weather").await, 1);
	assert_eq!(service.history.keyword_count("london").await, 0);
	assert!(service.history.record(" ", "Sunny.", None).await.is_err());
}

#[tokio::test]
async fn pattern_prediction_falls_back_to_generic_text() {
	let mut cfg = vox_testkit::sample_config();

	cfg.prediction.exact_window = 1;
	cfg.prediction.similar_window = 1;

	let service = super::service_with_config(cfg, Arc::new(ScriptedPipeline::new()));

	service.history.record("paris hotels", "Try the Ritz.", None).await.unwrap();
	service.history.record("tokyo food", "Try the ramen.", None).await.unwrap();

	let predictions = service.predictions.predict("paris", 5).await;

	assert_eq!(predictions.len(), 1);
	assert_eq!(predictions[0].response_text, "Here is what I know about paris.");
	assert_eq!(predictions[0].source, PredictionSource::Pattern);
	assert!((predictions[0].probability - 0.6).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn prediction_results_are_cached_for_an_hour() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));

	assert!(service.predictions.predict("what is your name", 5).await.is_empty());

	service.history.record("what is your name", "I am the assistant", None).await.unwrap();

	assert!(service.predictions.predict("What is your name", 5).await.is_empty());

	tokio::time::advance(Duration::from_secs(3_601)).await;

	let predictions = service.predictions.predict("what is your name", 5).await;

	assert_eq!(predictions[0].response_text, "I am the assistant");
}

#[tokio::test]
async fn top_predictions_rank_by_repeat_frequency() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));

	for _ in 0..3 {
		service.history.record("status", "All systems nominal.", None).await.unwrap();
	}

	service.history.record("report", "Report generated.", None).await.unwrap();

	let top = service.predictions.top_predictions(10).await;

	assert_eq!(top.len(), 2);
	assert_eq!(top[0].response_text, "All systems nominal.");
	assert!((top[0].probability - 0.75).abs() < 1e-6);
	assert_eq!(top[0].source, PredictionSource::Frequency);
	assert!((top[1].probability - 0.25).abs() < 1e-6);
	assert_eq!(service.predictions.top_predictions(1).await.len(), 1);
}
