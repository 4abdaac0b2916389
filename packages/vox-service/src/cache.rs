use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{
	Error, Result,
	history::days,
	prediction::{PredictionEngine, PredictionSource},
	time_serde,
};
use vox_storage::KvStore;

pub const RESPONSE_NAMESPACE: &str = "cache";
pub const CHUNK_NAMESPACE: &str = "chunk";

const SECONDS_PER_HOUR: i64 = 3_600;
const HIT_PROBABILITY_SAMPLE: usize = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
	pub key: String,
	pub text: String,
	pub artifact_uri: String,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(default, with = "crate::time_serde::option")]
	pub last_hit_at: Option<OffsetDateTime>,
	#[serde(default)]
	pub hit_count: u64,
	#[serde(default)]
	pub metadata: Value,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
	pub hits: u64,
	pub misses: u64,
	pub sets: u64,
	pub hit_rate: f32,
	pub total_requests: u64,
}

#[derive(Clone, Copy, Debug)]
enum StatKind {
	Hit,
	Miss,
	Set,
}
impl StatKind {
	fn as_str(self) -> &'static str {
		match self {
			Self::Hit => "hits",
			Self::Miss => "misses",
			Self::Set => "sets",
		}
	}
}

/// Content-addressed artifact cache. Equal normalized text shares one entry.
///
/// The hit counter and last-hit time live in their own keys beside the entry, so a hit never
/// rewrites an entry a concurrent `put` just replaced.
pub struct SmartCache {
	store: Arc<dyn KvStore>,
	namespace: &'static str,
	cfg: vox_config::Cache,
	predictions: Option<Arc<PredictionEngine>>,
}
impl SmartCache {
	pub fn new(store: Arc<dyn KvStore>, namespace: &'static str, cfg: vox_config::Cache) -> Self {
		Self { store, namespace, cfg, predictions: None }
	}

	pub fn with_predictions(mut self, predictions: Arc<PredictionEngine>) -> Self {
		self.predictions = Some(predictions);

		self
	}

	pub fn namespace(&self) -> &'static str {
		self.namespace
	}

	pub fn entry_key(&self, text: &str) -> String {
		format!("{}:{}", self.namespace, vox_domain::cache_key(text))
	}

	/// Looks up `text` and counts the hit or miss. Store failures read as a miss.
	pub async fn get(&self, text: &str) -> Option<CacheEntry> {
		let key = self.entry_key(text);
		let entry = match self.read_entry(&key).await {
			Ok(entry) => entry,
			Err(err) => {
				tracing::warn!(error = %err, key, "Cache read failed. Treating as a miss.");

				None
			},
		};
		let Some(mut entry) = entry else {
			self.bump(StatKind::Miss).await;

			return None;
		};
		let now = OffsetDateTime::now_utc();
		let ttl = self.ttl();

		match self.store.incr(&hits_key(&key), 1, Some(ttl)).await {
			Ok(count) => entry.hit_count = count.max(0) as u64,
			Err(err) => {
				tracing::warn!(error = %err, key, "Failed to count cache hit.");

				entry.hit_count += 1;
			},
		}

		if let Err(err) = self.touch(&key, now, ttl).await {
			tracing::warn!(error = %err, key, "Failed to refresh cache entry.");
		}

		entry.last_hit_at = Some(now);

		self.bump(StatKind::Hit).await;

		Some(entry)
	}

	/// Reads `text`'s entry without touching counters or expiry.
	pub async fn peek(&self, text: &str) -> Result<Option<CacheEntry>> {
		self.read_entry(&self.entry_key(text)).await
	}

	/// Stores `artifact_uri` for `text`, replacing any entry and resetting its hit count.
	pub async fn put(&self, text: &str, artifact_uri: &str, metadata: Value) -> Result<CacheEntry> {
		let key = self.entry_key(text);
		let ttl = Some(self.ttl());
		let entry = CacheEntry {
			key: vox_domain::cache_key(text),
			text: text.trim().to_string(),
			artifact_uri: artifact_uri.to_string(),
			created_at: OffsetDateTime::now_utc(),
			last_hit_at: None,
			hit_count: 0,
			metadata,
		};

		self.store.set(&key, &serde_json::to_string(&entry)?, ttl).await?;
		self.store.set(&hits_key(&key), "0", ttl).await?;
		self.store.delete(&last_hit_key(&key)).await?;
		self.bump(StatKind::Set).await;

		tracing::debug!(key, artifact_uri, "Cache entry stored.");

		Ok(entry)
	}

	/// Removes `text`'s entry and counters. Returns whether an entry existed.
	pub async fn invalidate(&self, text: &str) -> Result<bool> {
		let key = self.entry_key(text);
		let existed = self.store.delete(&key).await?;

		self.store.delete(&hits_key(&key)).await?;
		self.store.delete(&last_hit_key(&key)).await?;

		Ok(existed)
	}

	/// 1.0 when `text` is cached; otherwise a signal from similar predictions and how many of
	/// them are cached, capped at `max_hit_probability`.
	pub async fn predict_hit_probability(&self, text: &str) -> f32 {
		if self.is_cached(text).await {
			return 1.0;
		}

		let Some(predictions) = self.predictions.as_ref() else {
			return 0.0;
		};
		let similar: Vec<_> = predictions
			.predict(text, HIT_PROBABILITY_SAMPLE)
			.await
			.into_iter()
			.filter(|prediction| prediction.source == PredictionSource::Similar)
			.collect();

		if similar.is_empty() {
			return 0.0;
		}

		let n = similar.len() as f32;
		let mean = similar.iter().map(|prediction| prediction.probability).sum::<f32>() / n;
		let mut cached = 0_usize;

		for prediction in &similar {
			if self.is_cached(&prediction.response_text).await {
				cached += 1;
			}
		}

		(0.5 * mean + 0.5 * cached as f32 / n).min(self.cfg.max_hit_probability)
	}

	/// Hit, miss and set counts over the rolling window. Zeros when the store is unavailable.
	pub async fn stats(&self) -> CacheStats {
		match self.read_stats().await {
			Ok(stats) => stats,
			Err(err) => {
				tracing::warn!(error = %err, namespace = self.namespace, "Failed to read cache stats.");

				CacheStats::default()
			},
		}
	}

	async fn read_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
		let Some(raw) = self.store.get(key).await? else {
			return Ok(None);
		};
		let mut entry: CacheEntry = serde_json::from_str(&raw)?;

		if let Some(count) = self.store.get(&hits_key(key)).await? {
			entry.hit_count = count.parse().unwrap_or(0);
		}
		if let Some(raw) = self.store.get(&last_hit_key(key)).await? {
			entry.last_hit_at = time_serde::parse(&raw).ok();
		}

		Ok(Some(entry))
	}

	async fn touch(&self, key: &str, now: OffsetDateTime, ttl: Duration) -> Result<()> {
		let stamp = time_serde::format(&now)
			.map_err(|err| Error::Store { message: format!("Failed to format hit time: {err}") })?;

		self.store.set(&last_hit_key(key), &stamp, Some(ttl)).await?;
		self.store.expire(key, ttl).await?;

		Ok(())
	}

	async fn is_cached(&self, text: &str) -> bool {
		match self.store.get(&self.entry_key(text)).await {
			Ok(found) => found.is_some(),
			Err(err) => {
				tracing::warn!(error = %err, "Cache lookup failed.");

				false
			},
		}
	}

	async fn bump(&self, kind: StatKind) {
		let key = self.stat_key(kind, current_hour());
		let ttl = Duration::from_secs((self.cfg.stats_window_hours as u64 + 1) * SECONDS_PER_HOUR as u64);

		if let Err(err) = self.store.incr(&key, 1, Some(ttl)).await {
			tracing::warn!(error = %err, key, "Failed to update cache stats.");
		}
	}

	async fn read_stats(&self) -> Result<CacheStats> {
		let hour = current_hour();
		let mut totals = [0_u64; 3];

		for (slot, kind) in [StatKind::Hit, StatKind::Miss, StatKind::Set].into_iter().enumerate() {
			for offset in 0..self.cfg.stats_window_hours as i64 {
				if let Some(raw) = self.store.get(&self.stat_key(kind, hour - offset)).await? {
					totals[slot] += raw.parse::<u64>().unwrap_or(0);
				}
			}
		}

		let [hits, misses, sets] = totals;
		let total_requests = hits + misses;
		let hit_rate = if total_requests == 0 { 0.0 } else { hits as f32 / total_requests as f32 };

		Ok(CacheStats { hits, misses, sets, hit_rate, total_requests })
	}

	fn stat_key(&self, kind: StatKind, hour: i64) -> String {
		format!("{}:stats:{}:{hour}", self.namespace, kind.as_str())
	}

	fn ttl(&self) -> Duration {
		days(self.cfg.ttl_days)
	}
}

fn hits_key(key: &str) -> String {
	format!("{key}:hits")
}

fn last_hit_key(key: &str) -> String {
	format!("{key}:last_hit")
}

fn current_hour() -> i64 {
	OffsetDateTime::now_utc().unix_timestamp().div_euclid(SECONDS_PER_HOUR)
}
