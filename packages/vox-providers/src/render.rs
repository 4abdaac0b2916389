use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result, pipeline::PollBudget};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderStatus {
	Pending,
	Completed { result_url: String },
	Failed { message: String },
}

pub async fn submit(
	cfg: &vox_config::RenderProviderConfig,
	audio_url: &str,
	job_code: &str,
) -> Result<()> {
	let client = crate::client(cfg.timeout_ms)?;
	let body = serde_json::json!({
		"audio_url": audio_url,
		"video_url": cfg.video_url,
		"job_code": job_code,
		"rendering_flags": cfg.rendering_flags,
	});
	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.submit_path))
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;

	res.error_for_status()?;

	Ok(())
}

pub async fn fetch_status(
	client: &Client,
	cfg: &vox_config::RenderProviderConfig,
	job_code: &str,
) -> Result<RenderStatus> {
	let res = client
		.get(crate::endpoint(&cfg.api_base, &cfg.status_path))
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.query(&[("code", job_code)])
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_render_status(&json)
}

/// Polls the render status until it completes, fails, or `budget` runs out.
///
/// Transport errors on a single status check are logged and count as a pending attempt.
pub async fn wait_for_result(
	cfg: &vox_config::RenderProviderConfig,
	job_code: &str,
	budget: PollBudget,
) -> Result<String> {
	let client = crate::client(cfg.timeout_ms)?;

	for attempt in 1..=budget.attempts {
		match fetch_status(&client, cfg, job_code).await {
			Ok(RenderStatus::Completed { result_url }) => return Ok(result_url),
			Ok(RenderStatus::Failed { message }) =>
				return Err(Error::RenderFailed { job_code: job_code.to_string(), message }),
			Ok(RenderStatus::Pending) => {},
			Err(err) => {
				tracing::warn!(error = %err, job_code, attempt, "Render status check failed.");
			},
		}

		if attempt < budget.attempts {
			tokio::time::sleep(budget.interval).await;
		}
	}

	Err(Error::Timeout { job_code: job_code.to_string(), attempts: budget.attempts })
}

pub fn parse_render_status(json: &Value) -> Result<RenderStatus> {
	let data = json.get("data").filter(|data| data.is_object());
	let status = json
		.get("status")
		.or_else(|| data.and_then(|data| data.get("status")))
		.ok_or_else(|| Error::InvalidResponse {
			message: "Render status response is missing status.".to_string(),
		})?;
	let status = match status {
		Value::String(raw) => raw.trim().to_ascii_lowercase(),
		Value::Number(number) => number.to_string(),
		_ =>
			return Err(Error::InvalidResponse {
				message: "Render status must be a string or a number.".to_string(),
			}),
	};

	match status.as_str() {
		"completed" | "success" | "done" | "2" => {
			let result_url = json
				.get("result_url")
				.or_else(|| data.and_then(|data| data.get("result_url")))
				.and_then(Value::as_str)
				.filter(|url| !url.trim().is_empty())
				.ok_or_else(|| Error::InvalidResponse {
					message: "Completed render status is missing result_url.".to_string(),
				})?;

			Ok(RenderStatus::Completed { result_url: result_url.to_string() })
		},
		"failed" | "error" | "-1" => {
			let message = json
				.get("message")
				.or_else(|| data.and_then(|data| data.get("message")))
				.and_then(Value::as_str)
				.unwrap_or("Render service reported failure.")
				.to_string();

			Ok(RenderStatus::Failed { message })
		},
		_ => Ok(RenderStatus::Pending),
	}
}
