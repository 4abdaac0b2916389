use serde_json::Map;

/// Providers pointing at `base`, with the paths the HTTP tests mock.
pub fn providers(base: &str) -> vox_config::Providers {
	vox_config::Providers {
		synthesis: vox_config::SynthesisProviderConfig {
			api_base: base.to_string(),
			path: "/tts".to_string(),
			api_key: None,
			speaker_id: "assistant".to_string(),
			format: "wav".to_string(),
			reference_audio: None,
			reference_text: None,
			timeout_ms: 2_000,
			default_headers: Map::new(),
		},
		upload: vox_config::UploadProviderConfig {
			api_base: base.to_string(),
			path: "/upload".to_string(),
			api_key: None,
			public_base: format!("{base}/files"),
			timeout_ms: 2_000,
			default_headers: Map::new(),
		},
		render: vox_config::RenderProviderConfig {
			api_base: base.to_string(),
			submit_path: "/render/submit".to_string(),
			status_path: "/render/query".to_string(),
			api_key: None,
			video_url: "https://cdn.test/template.mp4".to_string(),
			rendering_flags: Map::new(),
			timeout_ms: 2_000,
			default_headers: Map::new(),
		},
	}
}

/// A valid in-memory configuration with default tuning and unreachable providers.
pub fn sample_config() -> vox_config::Config {
	vox_config::Config {
		service: vox_config::Service { log_level: "info".to_string() },
		storage: vox_config::Storage::default(),
		providers: providers("http://127.0.0.1:9"),
		history: vox_config::History::default(),
		prediction: vox_config::Prediction::default(),
		cache: vox_config::Cache::default(),
		scheduler: vox_config::Scheduler::default(),
		streaming: vox_config::Streaming::default(),
	}
}
