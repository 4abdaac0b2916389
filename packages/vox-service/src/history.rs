use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, Result};
use vox_storage::KvStore;

pub const HISTORY_KEY: &str = "history:records";
pub const PATTERN_PREFIX: &str = "pattern:";

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
	pub query_normalized: String,
	pub response_normalized: String,
	/// The response as supplied, so pre-generation renders the original wording.
	pub response_text: String,
	#[serde(with = "crate::time_serde")]
	pub timestamp: OffsetDateTime,
	pub user_id: Option<String>,
}

/// Bounded rolling log of recorded exchanges plus per-keyword counters.
pub struct InteractionHistory {
	store: Arc<dyn KvStore>,
	cfg: vox_config::History,
}
impl InteractionHistory {
	pub fn new(store: Arc<dyn KvStore>, cfg: vox_config::History) -> Self {
		Self { store, cfg }
	}

	pub fn capacity(&self) -> usize {
		self.cfg.capacity as usize
	}

	pub fn max_keywords(&self) -> usize {
		self.cfg.max_keywords as usize
	}

	pub async fn record(
		&self,
		query: &str,
		response: &str,
		user_id: Option<&str>,
	) -> Result<InteractionRecord> {
		if query.trim().is_empty() || response.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "query and response must be non-empty.".to_string(),
			});
		}

		let record = InteractionRecord {
			query_normalized: vox_domain::normalize(query),
			response_normalized: vox_domain::normalize(response),
			response_text: response.trim().to_string(),
			timestamp: OffsetDateTime::now_utc(),
			user_id: user_id.map(ToString::to_string),
		};
		let payload = serde_json::to_string(&record)?;

		self.store
			.push_bounded(HISTORY_KEY, &payload, self.capacity(), Some(days(self.cfg.ttl_days)))
			.await?;

		let keyword_ttl = Some(days(self.cfg.keyword_ttl_days));

		for keyword in vox_domain::extract_keywords(query, self.max_keywords()) {
			self.store.incr(&pattern_key(&keyword), 1, keyword_ttl).await?;
		}

		tracing::debug!(query = %record.query_normalized, "Interaction recorded.");

		Ok(record)
	}

	/// The newest `n` records, oldest first. Empty when the store is unavailable.
	pub async fn get_recent(&self, n: usize) -> Vec<InteractionRecord> {
		let raw = match self.store.list_tail(HISTORY_KEY, n).await {
			Ok(raw) => raw,
			Err(err) => {
				tracing::warn!(error = %err, "Failed to read interaction history.");

				return Vec::new();
			},
		};

		raw.iter()
			.filter_map(|payload| match serde_json::from_str(payload) {
				Ok(record) => Some(record),
				Err(err) => {
					tracing::warn!(error = %err, "Skipping malformed interaction record.");

					None
				},
			})
			.collect()
	}

	/// Current counter for `keyword`; zero when absent, expired, or unreadable.
	pub async fn keyword_count(&self, keyword: &str) -> u64 {
		match self.store.get(&pattern_key(keyword)).await {
			Ok(Some(raw)) => raw.parse().unwrap_or(0),
			Ok(None) => 0,
			Err(err) => {
				tracing::warn!(error = %err, keyword, "Failed to read keyword counter.");

				0
			},
		}
	}
}

fn pattern_key(keyword: &str) -> String {
	format!("{PATTERN_PREFIX}{keyword}")
}

pub(crate) fn days(days: i64) -> Duration {
	Duration::from_secs(days.max(0) as u64 * SECONDS_PER_DAY)
}
