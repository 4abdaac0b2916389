use std::sync::Arc;

use vox_config::{Postgres, StorageBackend};
use vox_service::JobStatus;
use vox_testkit::ScriptedPipeline;

#[tokio::test]
#[ignore = "Requires external Postgres. Set VOX_PG_DSN to run."]
async fn scheduler_and_cache_run_on_postgres() {
	let Some(dsn) = vox_testkit::env_dsn() else {
		eprintln!("Skipping scheduler_and_cache_run_on_postgres; set VOX_PG_DSN to run this test.");

		return;
	};

	vox_testkit::with_test_db(&dsn, |db| {
		let mut cfg = vox_testkit::sample_config();

		cfg.storage.backend = StorageBackend::Postgres;
		cfg.storage.postgres = Some(Postgres { dsn: db.dsn().to_string(), pool_max_conns: 4 });

		async move {
			let store = vox_service::connect_store(&cfg).await.expect("Failed to open store.");
			let pipeline = Arc::new(ScriptedPipeline::new());
			let service = super::service_with_store(cfg, store, pipeline.clone());
			let report = service.scheduler.enqueue("Report generated.", 0.9).await.unwrap();

			service.scheduler.enqueue("Status ok.", 0.2).await.unwrap();

			assert_eq!(service.scheduler.drain(1).await, vec![report.clone()]);
			assert_eq!(
				service.scheduler.get_job(&report).await.unwrap().unwrap().status,
				JobStatus::Completed
			);
			assert_eq!(service.cache.get("report generated.").await.unwrap().hit_count, 1);
			assert_eq!(service.scheduler.pending_count().await.unwrap(), 1);

			for _ in 0..3 {
				service.history.record("what is your name", "I am the assistant", None).await.unwrap();
			}

			let predictions = service.predictions.predict("what is your name", 5).await;

			assert_eq!(predictions[0].response_text, "I am the assistant");

			Ok(())
		}
	})
	.await
	.expect("Postgres acceptance run failed.");
}
