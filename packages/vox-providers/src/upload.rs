use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::{Error, Result};

/// Uploads synthesized audio and returns its public URL.
pub async fn upload(
	cfg: &vox_config::UploadProviderConfig,
	audio: Vec<u8>,
	file_name: &str,
	mime: &str,
) -> Result<String> {
	let client = crate::client(cfg.timeout_ms)?;
	let part = Part::bytes(audio).file_name(file_name.to_string()).mime_str(mime)?;
	let form = Form::new().part("file", part);
	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.path))
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.multipart(form)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let path = parse_upload_path(&json)?;

	Ok(public_url(&cfg.public_base, &path))
}

fn parse_upload_path(json: &Value) -> Result<String> {
	json.get("path")
		.or_else(|| json.get("data").and_then(|data| data.get("path")))
		.and_then(Value::as_str)
		.map(str::trim)
		.filter(|path| !path.is_empty())
		.map(ToString::to_string)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Upload response is missing path.".to_string(),
		})
}

fn public_url(public_base: &str, path: &str) -> String {
	if path.starts_with("http://") || path.starts_with("https://") {
		return path.to_string();
	}

	format!("{}/{}", public_base.trim_end_matches('/'), path.trim_start_matches('/'))
}
