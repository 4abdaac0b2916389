mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, History, Postgres, Prediction, Providers, RenderProviderConfig, Scheduler,
	Service, Storage, StorageBackend, Streaming, SynthesisProviderConfig, UploadProviderConfig,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}

	validate_storage(cfg)?;
	validate_providers(cfg)?;

	if cfg.history.capacity == 0 {
		return Err(Error::Validation {
			message: "history.capacity must be greater than zero.".to_string(),
		});
	}
	if cfg.history.ttl_days <= 0 {
		return Err(Error::Validation {
			message: "history.ttl_days must be greater than zero.".to_string(),
		});
	}
	if cfg.history.keyword_ttl_days <= 0 {
		return Err(Error::Validation {
			message: "history.keyword_ttl_days must be greater than zero.".to_string(),
		});
	}
	if cfg.history.max_keywords == 0 {
		return Err(Error::Validation {
			message: "history.max_keywords must be greater than zero.".to_string(),
		});
	}
	if cfg.prediction.cache_ttl_seconds == 0 {
		return Err(Error::Validation {
			message: "prediction.cache_ttl_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.prediction.exact_window == 0 || cfg.prediction.similar_window == 0 {
		return Err(Error::Validation {
			message: "prediction.exact_window and prediction.similar_window must be greater than zero."
				.to_string(),
		});
	}

	for (label, value) in [
		("prediction.exact_probability", cfg.prediction.exact_probability),
		("prediction.similarity_threshold", cfg.prediction.similarity_threshold),
		("prediction.similarity_weight", cfg.prediction.similarity_weight),
		("prediction.pattern_weight", cfg.prediction.pattern_weight),
		("cache.max_hit_probability", cfg.cache.max_hit_probability),
		("scheduler.min_probability", cfg.scheduler.min_probability),
	] {
		validate_unit_interval(label, value)?;
	}

	if cfg.cache.ttl_days <= 0 {
		return Err(Error::Validation {
			message: "cache.ttl_days must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.stats_window_hours == 0 {
		return Err(Error::Validation {
			message: "cache.stats_window_hours must be greater than zero.".to_string(),
		});
	}

	validate_scheduler(cfg)?;
	validate_streaming(cfg)?;

	Ok(())
}

fn validate_storage(cfg: &Config) -> Result<()> {
	if cfg.storage.backend == StorageBackend::Postgres {
		let Some(postgres) = cfg.storage.postgres.as_ref() else {
			return Err(Error::Validation {
				message: "storage.postgres must be set when storage.backend is postgres."
					.to_string(),
			});
		};

		if postgres.dsn.trim().is_empty() {
			return Err(Error::Validation {
				message: "storage.postgres.dsn must be non-empty.".to_string(),
			});
		}
		if postgres.pool_max_conns == 0 {
			return Err(Error::Validation {
				message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
			});
		}
	}

	Ok(())
}

fn validate_providers(cfg: &Config) -> Result<()> {
	let providers = &cfg.providers;

	for (label, api_base, timeout_ms) in [
		("synthesis", &providers.synthesis.api_base, providers.synthesis.timeout_ms),
		("upload", &providers.upload.api_base, providers.upload.timeout_ms),
		("render", &providers.render.api_base, providers.render.timeout_ms),
	] {
		if api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("providers.{label}.api_base must be non-empty."),
			});
		}
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("providers.{label}.timeout_ms must be greater than zero."),
			});
		}
	}

	if providers.synthesis.speaker_id.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.synthesis.speaker_id must be non-empty.".to_string(),
		});
	}
	if providers.upload.public_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.upload.public_base must be non-empty.".to_string(),
		});
	}
	if providers.render.video_url.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.render.video_url must be non-empty.".to_string(),
		});
	}

	Ok(())
}

fn validate_scheduler(cfg: &Config) -> Result<()> {
	let scheduler = &cfg.scheduler;

	if scheduler.drain_max_jobs == 0 {
		return Err(Error::Validation {
			message: "scheduler.drain_max_jobs must be greater than zero.".to_string(),
		});
	}
	if scheduler.interval_seconds == 0 {
		return Err(Error::Validation {
			message: "scheduler.interval_seconds must be greater than zero.".to_string(),
		});
	}
	if scheduler.poll_attempts == 0 || scheduler.poll_interval_ms == 0 {
		return Err(Error::Validation {
			message: "scheduler.poll_attempts and scheduler.poll_interval_ms must be greater than zero."
				.to_string(),
		});
	}
	if scheduler.job_ttl_hours <= 0 {
		return Err(Error::Validation {
			message: "scheduler.job_ttl_hours must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_streaming(cfg: &Config) -> Result<()> {
	let streaming = &cfg.streaming;

	if !streaming.words_per_second.is_finite() || streaming.words_per_second <= 0.0 {
		return Err(Error::Validation {
			message: "streaming.words_per_second must be a positive finite number.".to_string(),
		});
	}
	if !streaming.min_seconds.is_finite() || streaming.min_seconds < 0.0 {
		return Err(Error::Validation {
			message: "streaming.min_seconds must be zero or greater.".to_string(),
		});
	}
	if !streaming.max_seconds.is_finite() || streaming.max_seconds < streaming.min_seconds {
		return Err(Error::Validation {
			message: "streaming.max_seconds must be at least streaming.min_seconds.".to_string(),
		});
	}
	if 1.0 / streaming.words_per_second > streaming.max_seconds {
		return Err(Error::Validation {
			message: "streaming.max_seconds must fit at least one word at streaming.words_per_second."
				.to_string(),
		});
	}
	if 1.0 / streaming.words_per_second > streaming.max_seconds - streaming.min_seconds + 1e-6 {
		return Err(Error::Validation {
			message: "streaming.max_seconds - streaming.min_seconds must span at least one word at streaming.words_per_second."
				.to_string(),
		});
	}
	if streaming.batch_size == 0 {
		return Err(Error::Validation {
			message: "streaming.batch_size must be greater than zero.".to_string(),
		});
	}
	if streaming.poll_attempts == 0 || streaming.poll_interval_ms == 0 {
		return Err(Error::Validation {
			message: "streaming.poll_attempts and streaming.poll_interval_ms must be greater than zero."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_unit_interval(label: &str, value: f32) -> Result<()> {
	if !value.is_finite() {
		return Err(Error::Validation { message: format!("{label} must be a finite number.") });
	}
	if !(0.0..=1.0).contains(&value) {
		return Err(Error::Validation {
			message: format!("{label} must be in the range 0.0-1.0."),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let providers = &mut cfg.providers;

	for key in [
		&mut providers.synthesis.api_key,
		&mut providers.upload.api_key,
		&mut providers.render.api_key,
		&mut providers.synthesis.reference_audio,
		&mut providers.synthesis.reference_text,
	] {
		if key.as_deref().map(|value| value.trim().is_empty()).unwrap_or(false) {
			*key = None;
		}
	}
}
