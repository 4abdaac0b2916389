use std::{sync::Arc, time::Duration};

use serde_json::json;

use vox_providers::PollBudget;
use vox_service::{Error, JobStatus};
use vox_testkit::{FailingStore, ScriptedPipeline};

#[tokio::test]
async fn drain_processes_only_the_highest_priority_job() {
	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = super::service(pipeline.clone());
	let report = service.scheduler.enqueue("Report generated.", 0.9).await.unwrap();
	let status = service.scheduler.enqueue("Status ok.", 0.2).await.unwrap();
	let processed = service.scheduler.drain(1).await;

	assert_eq!(processed, vec![report.clone()]);
	assert_eq!(pipeline.calls(), vec!["Report generated."]);
	assert_eq!(
		service.scheduler.get_job(&report).await.unwrap().unwrap().status,
		JobStatus::Completed
	);
	assert_eq!(service.scheduler.get_job(&status).await.unwrap().unwrap().status, JobStatus::Pending);
	assert_eq!(service.scheduler.pending_count().await.unwrap(), 1);
}

#[tokio::test]
async fn drain_pulls_at_most_n_in_descending_priority() {
	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = super::service(pipeline.clone());
	let mut ids = Vec::new();

	for (text, priority) in [("One.", 0.1), ("Two.", 0.7), ("Three.", 0.4), ("Four.", 0.9), ("Five.", 0.5)]
	{
		ids.push(service.scheduler.enqueue(text, priority).await.unwrap());
	}

	let pending = service.scheduler.pending(10).await.unwrap();

	assert_eq!(pending.len(), 5);
	assert_eq!(pending[0].job_id, ids[3]);

	let processed = service.scheduler.drain(3).await;

	assert_eq!(processed, vec![ids[3].clone(), ids[1].clone(), ids[4].clone()]);
	assert_eq!(pipeline.calls(), vec!["Four.", "Two.", "Five."]);
	assert_eq!(service.scheduler.drain(3).await, vec![ids[2].clone(), ids[0].clone()]);
	assert!(service.scheduler.drain(3).await.is_empty());
}

#[tokio::test]
async fn drained_jobs_end_completed_with_cache_or_failed_without() {
	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = super::service(pipeline.clone());

	pipeline.fail_on("Render breaks.");

	let good = service.scheduler.enqueue("Report generated.", 0.5).await.unwrap();
	let bad = service.scheduler.enqueue("Render breaks.", 0.6).await.unwrap();

	service.scheduler.drain(5).await;

	let good_job = service.scheduler.get_job(&good).await.unwrap().unwrap();
	let bad_job = service.scheduler.get_job(&bad).await.unwrap().unwrap();

	assert_eq!(good_job.status, JobStatus::Completed);
	assert_eq!(good_job.result_uri, Some(ScriptedPipeline::uri_for("Report generated.")));
	assert!(good_job.started_at.is_some() && good_job.completed_at.is_some());
	assert_eq!(
		service.cache.peek("Report generated.").await.unwrap().unwrap().artifact_uri,
		ScriptedPipeline::uri_for("Report generated.")
	);
	assert_eq!(bad_job.status, JobStatus::Failed);
	assert!(bad_job.error.is_some());
	assert!(bad_job.result_uri.is_none());
	assert!(service.cache.peek("Render breaks.").await.unwrap().is_none());
	assert_eq!(service.scheduler.pending_count().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn stuck_generation_times_out_as_a_failure() {
	let mut cfg = vox_testkit::sample_config();

	cfg.scheduler.poll_attempts = 2;
	cfg.scheduler.poll_interval_ms = 10;
	cfg.scheduler.generation_slack_ms = 10;

	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = super::service_with_config(cfg, pipeline.clone());

	pipeline.stall_on("Never finishes.");

	let stuck = service.scheduler.enqueue("Never finishes.", 0.9).await.unwrap();
	let fine = service.scheduler.enqueue("Finishes.", 0.1).await.unwrap();

	assert_eq!(service.scheduler.drain(5).await.len(), 2);

	let stuck_job = service.scheduler.get_job(&stuck).await.unwrap().unwrap();

	assert_eq!(stuck_job.status, JobStatus::Failed);
	assert!(stuck_job.error.unwrap().starts_with("Generation failed: Timed out"));
	assert_eq!(service.scheduler.get_job(&fine).await.unwrap().unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn cached_text_completes_without_generation() {
	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = super::service(pipeline.clone());

	service.cache.put("Status ok.", "uri-live", json!({ "source": "live" })).await.unwrap();

	let job_id = service.scheduler.enqueue("status OK.", 0.5).await.unwrap();

	service.scheduler.drain(5).await;

	let job = service.scheduler.get_job(&job_id).await.unwrap().unwrap();

	assert_eq!(job.status, JobStatus::Completed);
	assert_eq!(job.result_uri.as_deref(), Some("uri-live"));
	assert_eq!(pipeline.call_count(), 0);
}

#[tokio::test]
async fn re_enqueue_keeps_separate_pending_entries() {
	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = super::service(pipeline.clone());
	let first = service.scheduler.enqueue("Report generated.", 0.3).await.unwrap();
	let second = service.scheduler.enqueue("Report generated.", 0.8).await.unwrap();

	assert_eq!(first, second);
	assert_eq!(first.len(), 16);
	assert_eq!(service.scheduler.pending_count().await.unwrap(), 2);
	assert_eq!(service.scheduler.drain(5).await, vec![first]);
	assert_eq!(pipeline.call_count(), 1);
	assert_eq!(service.scheduler.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn duplicate_entries_do_not_use_up_drain_slots() {
	let pipeline = Arc::new(ScriptedPipeline::new());
	let service = super::service(pipeline.clone());
	let report = service.scheduler.enqueue("Report generated.", 0.9).await.unwrap();

	service.scheduler.enqueue("Report generated.", 0.8).await.unwrap();

	let status = service.scheduler.enqueue("Status ok.", 0.5).await.unwrap();
	let later = service.scheduler.enqueue("Later.", 0.1).await.unwrap();

	assert_eq!(service.scheduler.drain(2).await, vec![report, status]);
	assert_eq!(pipeline.calls(), vec!["Report generated.", "Status ok."]);
	assert_eq!(service.scheduler.pending(5).await.unwrap()[0].job_id, later);
	assert_eq!(service.scheduler.pending_count().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn drain_fan_out_is_bounded_by_max_jobs() {
	let pipeline = Arc::new(ScriptedPipeline::with_delay(Duration::from_millis(50)));
	let service = super::service(pipeline.clone());

	for idx in 0..8 {
		service.scheduler.enqueue(&format!("Answer number {idx}."), 0.5).await.unwrap();
	}

	assert_eq!(service.scheduler.drain(5).await.len(), 5);
	assert_eq!(pipeline.peak_concurrency(), 5);
	assert_eq!(pipeline.budgets()[0], PollBudget::new(300, Duration::from_secs(1)));
	assert_eq!(service.scheduler.pending_count().await.unwrap(), 3);
}

#[tokio::test]
async fn top_predictions_above_the_floor_are_enqueued() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));

	for _ in 0..9 {
		service.history.record("status", "All systems nominal.", None).await.unwrap();
	}

	service.history.record("joke", "Why did the chicken cross the road?", None).await.unwrap();

	let queued = service.scheduler.pregenerate_top_predictions(10).await.unwrap();
	let pending = service.scheduler.pending(10).await.unwrap();

	assert_eq!(queued, vec![vox_domain::short_hash("All systems nominal.")]);
	assert_eq!(pending.len(), 1);
	assert!((pending[0].priority - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn enqueue_rejects_bad_input_and_reports_store_failures() {
	let service = super::service(Arc::new(ScriptedPipeline::new()));

	assert!(matches!(
		service.scheduler.enqueue("  ", 0.5).await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(matches!(
		service.scheduler.enqueue("Status ok.", f32::NAN).await,
		Err(Error::InvalidRequest { .. })
	));

	let job_id = service.scheduler.enqueue("Status ok.", 7.0).await.unwrap();

	assert_eq!(service.scheduler.get_job(&job_id).await.unwrap().unwrap().priority, 1.0);

	let broken = super::service_with_store(
		vox_testkit::sample_config(),
		Arc::new(FailingStore),
		Arc::new(ScriptedPipeline::new()),
	);

	assert!(matches!(broken.scheduler.enqueue("Status ok.", 0.5).await, Err(Error::Store { .. })));
	assert!(broken.scheduler.drain(5).await.is_empty());
}
