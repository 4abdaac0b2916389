use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub history: History,
	#[serde(default)]
	pub prediction: Prediction,
	#[serde(default)]
	pub cache: Cache,
	#[serde(default)]
	pub scheduler: Scheduler,
	#[serde(default)]
	pub streaming: Streaming,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
	#[default]
	Memory,
	Postgres,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
	#[serde(default)]
	pub backend: StorageBackend,
	pub postgres: Option<Postgres>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub synthesis: SynthesisProviderConfig,
	pub upload: UploadProviderConfig,
	pub render: RenderProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisProviderConfig {
	pub api_base: String,
	pub path: String,
	pub api_key: Option<String>,
	pub speaker_id: String,
	pub format: String,
	/// Optional voice-cloning prompt audio, forwarded verbatim.
	pub reference_audio: Option<String>,
	/// Transcript of `reference_audio`.
	pub reference_text: Option<String>,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadProviderConfig {
	pub api_base: String,
	pub path: String,
	pub api_key: Option<String>,
	/// Base URL joined to relative upload paths to form the audio URL handed to the renderer.
	pub public_base: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderProviderConfig {
	pub api_base: String,
	pub submit_path: String,
	pub status_path: String,
	pub api_key: Option<String>,
	/// Template video the renderer drives with the synthesized audio.
	pub video_url: String,
	#[serde(default)]
	pub rendering_flags: Map<String, Value>,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct History {
	pub capacity: u32,
	pub ttl_days: i64,
	pub keyword_ttl_days: i64,
	pub max_keywords: u32,
}
impl Default for History {
	fn default() -> Self {
		Self { capacity: 100, ttl_days: 7, keyword_ttl_days: 30, max_keywords: 10 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Prediction {
	pub cache_ttl_seconds: u64,
	pub exact_window: u32,
	pub exact_probability: f32,
	pub similar_window: u32,
	pub similarity_threshold: f32,
	pub similarity_weight: f32,
	pub pattern_weight: f32,
}
impl Default for Prediction {
	fn default() -> Self {
		Self {
			cache_ttl_seconds: 3_600,
			exact_window: 50,
			exact_probability: 0.95,
			similar_window: 100,
			similarity_threshold: 0.3,
			similarity_weight: 0.8,
			pattern_weight: 0.6,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub ttl_days: i64,
	pub stats_window_hours: u32,
	pub max_hit_probability: f32,
}
impl Default for Cache {
	fn default() -> Self {
		Self { ttl_days: 7, stats_window_hours: 24, max_hit_probability: 0.8 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Scheduler {
	pub drain_max_jobs: u32,
	pub interval_seconds: u64,
	pub top_predictions_limit: u32,
	pub min_probability: f32,
	pub poll_attempts: u32,
	pub poll_interval_ms: u64,
	pub generation_slack_ms: u64,
	pub job_ttl_hours: i64,
	pub purge_interval_seconds: u64,
}
impl Default for Scheduler {
	fn default() -> Self {
		Self {
			drain_max_jobs: 5,
			interval_seconds: 60,
			top_predictions_limit: 10,
			min_probability: 0.1,
			poll_attempts: 300,
			poll_interval_ms: 1_000,
			generation_slack_ms: 30_000,
			job_ttl_hours: 24,
			purge_interval_seconds: 900,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Streaming {
	pub words_per_second: f32,
	pub min_seconds: f32,
	pub max_seconds: f32,
	pub batch_size: u32,
	pub poll_attempts: u32,
	pub poll_interval_ms: u64,
	pub generation_slack_ms: u64,
	/// Emit a final fragment shorter than `min_seconds` instead of dropping it.
	pub keep_trailing_fragment: bool,
}
impl Default for Streaming {
	fn default() -> Self {
		Self {
			words_per_second: 2.5,
			min_seconds: 0.5,
			max_seconds: 1.0,
			batch_size: 3,
			poll_attempts: 60,
			poll_interval_ms: 500,
			generation_slack_ms: 15_000,
			keep_trailing_fragment: false,
		}
	}
}
