use serde_json::{Map, Value};

use crate::{Error, Result};

/// Synthesizes `text` into audio bytes.
pub async fn synthesize(cfg: &vox_config::SynthesisProviderConfig, text: &str) -> Result<Vec<u8>> {
	let client = crate::client(cfg.timeout_ms)?;
	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.path))
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(&synthesis_body(cfg, text))
		.send()
		.await?;
	let audio = res.error_for_status()?.bytes().await?;

	if audio.is_empty() {
		return Err(Error::InvalidResponse {
			message: "Synthesis response contained no audio.".to_string(),
		});
	}

	Ok(audio.to_vec())
}

fn synthesis_body(cfg: &vox_config::SynthesisProviderConfig, text: &str) -> Value {
	let mut body = Map::new();

	body.insert("text".to_string(), Value::from(text));
	body.insert("speaker_id".to_string(), Value::from(cfg.speaker_id.as_str()));
	body.insert("format".to_string(), Value::from(cfg.format.as_str()));

	if let Some(reference_audio) = cfg.reference_audio.as_deref() {
		body.insert("reference_audio".to_string(), Value::from(reference_audio));
	}
	if let Some(reference_text) = cfg.reference_text.as_deref() {
		body.insert("reference_text".to_string(), Value::from(reference_text));
	}

	Value::Object(body)
}
