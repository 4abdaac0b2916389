use std::time::Duration;

use uuid::Uuid;

use crate::{BoxFuture, Result, render, synthesis, upload};

/// How long to wait for a render job: `attempts` status checks, `interval` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
	pub attempts: u32,
	pub interval: Duration,
}
impl PollBudget {
	pub fn new(attempts: u32, interval: Duration) -> Self {
		Self { attempts, interval }
	}

	/// Upper bound on time spent polling.
	pub fn window(&self) -> Duration {
		self.interval.saturating_mul(self.attempts)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
	pub uri: String,
	pub audio_url: String,
	pub job_code: String,
}

/// Synthesize, upload, submit render, poll to completion.
///
/// Live responses, background pre-generation and stream chunks all go through the same
/// implementation so their artifacts are interchangeable.
pub trait GenerationPipeline
where
	Self: Send + Sync,
{
	fn generate<'a>(&'a self, text: &'a str, budget: PollBudget) -> BoxFuture<'a, Result<Artifact>>;
}

pub struct HttpPipeline {
	pub synthesis: vox_config::SynthesisProviderConfig,
	pub upload: vox_config::UploadProviderConfig,
	pub render: vox_config::RenderProviderConfig,
}
impl HttpPipeline {
	pub fn new(cfg: &vox_config::Providers) -> Self {
		Self {
			synthesis: cfg.synthesis.clone(),
			upload: cfg.upload.clone(),
			render: cfg.render.clone(),
		}
	}

	async fn run(&self, text: &str, budget: PollBudget) -> Result<Artifact> {
		let job_code = Uuid::new_v4().to_string();
		let audio = synthesis::synthesize(&self.synthesis, text).await?;
		let file_name = format!("{job_code}.{}", self.synthesis.format);
		let mime = format!("audio/{}", self.synthesis.format);
		let audio_url = upload::upload(&self.upload, audio, &file_name, &mime).await?;

		render::submit(&self.render, &audio_url, &job_code).await?;

		tracing::debug!(job_code, audio_url, "Render job submitted.");

		let uri = render::wait_for_result(&self.render, &job_code, budget).await?;

		Ok(Artifact { uri, audio_url, job_code })
	}
}

impl GenerationPipeline for HttpPipeline {
	fn generate<'a>(&'a self, text: &'a str, budget: PollBudget) -> BoxFuture<'a, Result<Artifact>> {
		Box::pin(self.run(text, budget))
	}
}
