use std::{
	collections::HashSet,
	sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use vox_providers::{Artifact, BoxFuture, Error, GenerationPipeline, PollBudget};

/// In-process [`GenerationPipeline`] with scripted outcomes.
///
/// Every text succeeds with [`ScriptedPipeline::uri_for`] unless marked with `fail_on` or
/// `stall_on`. Calls are recorded in arrival order.
#[derive(Default)]
pub struct ScriptedPipeline {
	delay: Duration,
	script: Mutex<Script>,
	in_flight: AtomicUsize,
	peak: AtomicUsize,
}

#[derive(Default)]
struct Script {
	calls: Vec<(String, PollBudget)>,
	failures: HashSet<String>,
	stalls: HashSet<String>,
}

impl ScriptedPipeline {
	pub fn new() -> Self {
		Self::default()
	}

	/// Each generation sleeps for `delay` before resolving.
	pub fn with_delay(delay: Duration) -> Self {
		Self { delay, ..Self::default() }
	}

	pub fn uri_for(text: &str) -> String {
		format!("https://cdn.test/{}.mp4", vox_domain::short_hash(text))
	}

	pub fn fail_on(&self, text: &str) {
		self.script().failures.insert(text.to_string());
	}

	/// Generations of `text` never resolve.
	pub fn stall_on(&self, text: &str) {
		self.script().stalls.insert(text.to_string());
	}

	pub fn calls(&self) -> Vec<String> {
		self.script().calls.iter().map(|(text, _)| text.clone()).collect()
	}

	pub fn budgets(&self) -> Vec<PollBudget> {
		self.script().calls.iter().map(|(_, budget)| *budget).collect()
	}

	pub fn call_count(&self) -> usize {
		self.script().calls.len()
	}

	/// Highest number of generations observed in flight at once.
	pub fn peak_concurrency(&self) -> usize {
		self.peak.load(Ordering::SeqCst)
	}

	fn script(&self) -> std::sync::MutexGuard<'_, Script> {
		self.script.lock().unwrap_or_else(|err| err.into_inner())
	}

	async fn run(&self, text: &str, budget: PollBudget) -> vox_providers::Result<Artifact> {
		let (fails, stalls) = {
			let mut script = self.script();

			script.calls.push((text.to_string(), budget));

			(script.failures.contains(text), script.stalls.contains(text))
		};
		let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;

		self.peak.fetch_max(now, Ordering::SeqCst);

		if !self.delay.is_zero() {
			tokio::time::sleep(self.delay).await;
		}
		if stalls {
			std::future::pending::<()>().await;
		}

		self.in_flight.fetch_sub(1, Ordering::SeqCst);

		let job_code = format!("job-{}", vox_domain::short_hash(text));

		if fails {
			return Err(Error::RenderFailed { job_code, message: "Scripted failure.".to_string() });
		}

		Ok(Artifact {
			uri: Self::uri_for(text),
			audio_url: format!("https://cdn.test/{}.wav", vox_domain::short_hash(text)),
			job_code,
		})
	}
}

impl GenerationPipeline for ScriptedPipeline {
	fn generate<'a>(
		&'a self,
		text: &'a str,
		budget: PollBudget,
	) -> BoxFuture<'a, vox_providers::Result<Artifact>> {
		Box::pin(self.run(text, budget))
	}
}
