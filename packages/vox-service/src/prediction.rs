use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::history::{InteractionHistory, InteractionRecord};
use vox_storage::KvStore;

pub const PREDICTION_PREFIX: &str = "prediction:";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
	Exact,
	Similar,
	Pattern,
	Frequency,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
	pub response_text: String,
	pub probability: f32,
	pub source: PredictionSource,
}
impl Prediction {
	fn new(response_text: &str, probability: f32, source: PredictionSource) -> Self {
		Self {
			response_text: response_text.to_string(),
			probability: probability.clamp(0.0, 1.0),
			source,
		}
	}
}

/// Ranks likely responses for a query from the interaction history.
pub struct PredictionEngine {
	store: Arc<dyn KvStore>,
	history: Arc<InteractionHistory>,
	cfg: vox_config::Prediction,
}
impl PredictionEngine {
	pub fn new(
		store: Arc<dyn KvStore>,
		history: Arc<InteractionHistory>,
		cfg: vox_config::Prediction,
	) -> Self {
		Self { store, history, cfg }
	}

	/// Deduplicated predictions for `query`, most probable first, at most `limit`.
	pub async fn predict(&self, query: &str, limit: usize) -> Vec<Prediction> {
		if vox_domain::normalize(query).is_empty() || limit == 0 {
			return Vec::new();
		}

		let key = format!("{PREDICTION_PREFIX}{}", vox_domain::short_hash(query));

		if let Some(mut cached) = self.cached(&key).await {
			cached.truncate(limit);

			return cached;
		}

		let mut predictions = self.compute(query).await;

		match serde_json::to_string(&predictions) {
			Ok(payload) => {
				let ttl = Some(Duration::from_secs(self.cfg.cache_ttl_seconds));

				if let Err(err) = self.store.set(&key, &payload, ttl).await {
					tracing::warn!(error = %err, "Failed to cache predictions.");
				}
			},
			Err(err) => tracing::warn!(error = %err, "Failed to encode predictions."),
		}

		predictions.truncate(limit);

		predictions
	}

	/// Historical (query, response) pairs ranked by how often they repeat.
	pub async fn top_predictions(&self, limit: usize) -> Vec<Prediction> {
		let records = self.history.get_recent(self.history.capacity()).await;

		if records.is_empty() || limit == 0 {
			return Vec::new();
		}

		let total = records.len() as f32;
		let mut pairs: HashMap<(&str, &str), (usize, usize, &str)> = HashMap::new();

		for (idx, record) in records.iter().enumerate() {
			let entry = pairs
				.entry((record.query_normalized.as_str(), record.response_normalized.as_str()))
				.or_insert((0, idx, record.response_text.as_str()));

			entry.0 += 1;
			entry.1 = idx;
			entry.2 = record.response_text.as_str();
		}

		let mut ranked: Vec<(usize, usize, &str)> = pairs.into_values().collect();

		ranked.sort_by(|left, right| right.0.cmp(&left.0).then(right.1.cmp(&left.1)));

		let predictions = ranked
			.into_iter()
			.map(|(count, _, response)| {
				Prediction::new(response, count as f32 / total, PredictionSource::Frequency)
			})
			.collect();
		let mut predictions = dedup_by_response(predictions);

		predictions.truncate(limit);

		predictions
	}

	async fn cached(&self, key: &str) -> Option<Vec<Prediction>> {
		let raw = match self.store.get(key).await {
			Ok(raw) => raw?,
			Err(err) => {
				tracing::warn!(error = %err, "Failed to read cached predictions.");

				return None;
			},
		};

		match serde_json::from_str(&raw) {
			Ok(predictions) => Some(predictions),
			Err(err) => {
				tracing::warn!(error = %err, "Ignoring malformed cached predictions.");

				None
			},
		}
	}

	async fn compute(&self, query: &str) -> Vec<Prediction> {
		let window = self.cfg.exact_window.max(self.cfg.similar_window) as usize;
		let records = self.history.get_recent(window).await;
		let normalized = vox_domain::normalize(query);
		let keywords = vox_domain::extract_keywords(query, self.history.max_keywords());
		let mut merged = self.exact(&records, &normalized);

		merged.extend(self.similar(&records, &keywords));
		merged.extend(self.pattern(&records, &keywords).await);

		dedup_by_response(merged)
	}

	fn exact(&self, records: &[InteractionRecord], normalized: &str) -> Vec<Prediction> {
		records
			.iter()
			.rev()
			.take(self.cfg.exact_window as usize)
			.filter(|record| record.query_normalized == normalized)
			.map(|record| {
				Prediction::new(
					&record.response_text,
					self.cfg.exact_probability,
					PredictionSource::Exact,
				)
			})
			.collect()
	}

	fn similar(&self, records: &[InteractionRecord], keywords: &[String]) -> Vec<Prediction> {
		if keywords.is_empty() {
			return Vec::new();
		}

		records
			.iter()
			.rev()
			.take(self.cfg.similar_window as usize)
			.filter_map(|record| {
				let candidate = vox_domain::extract_keywords(
					&record.query_normalized,
					self.history.max_keywords(),
				);
				let similarity = vox_domain::jaccard(keywords, &candidate);

				(similarity > self.cfg.similarity_threshold).then(|| {
					Prediction::new(
						&record.response_text,
						similarity * self.cfg.similarity_weight,
						PredictionSource::Similar,
					)
				})
			})
			.collect()
	}

	async fn pattern(&self, records: &[InteractionRecord], keywords: &[String]) -> Vec<Prediction> {
		let mut matched = Vec::new();

		for keyword in keywords {
			let count = self.history.keyword_count(keyword).await;

			if count > 0 {
				matched.push((keyword, count));
			}
		}

		let total: u64 = matched.iter().map(|(_, count)| count).sum();

		if total == 0 {
			return Vec::new();
		}

		matched
			.into_iter()
			.map(|(keyword, count)| {
				let probability = (count as f32 / total as f32 * self.cfg.pattern_weight)
					.min(self.cfg.pattern_weight);
				let text = latest_response_for_keyword(records, keyword, self.history.max_keywords())
					.unwrap_or_else(|| format!("Here is what I know about {keyword}."));

				Prediction::new(&text, probability, PredictionSource::Pattern)
			})
			.collect()
	}
}

fn latest_response_for_keyword(
	records: &[InteractionRecord],
	keyword: &str,
	max_keywords: usize,
) -> Option<String> {
	records
		.iter()
		.rev()
		.find(|record| {
			vox_domain::extract_keywords(&record.query_normalized, max_keywords)
				.iter()
				.any(|candidate| candidate == keyword)
		})
		.map(|record| record.response_text.clone())
}

/// Keeps the most probable prediction per response content, then sorts by probability.
///
/// Ties keep the earlier prediction, and the sort is stable, so input order breaks ties.
fn dedup_by_response(predictions: Vec<Prediction>) -> Vec<Prediction> {
	let mut positions: HashMap<String, usize> = HashMap::new();
	let mut out: Vec<Prediction> = Vec::with_capacity(predictions.len());

	for prediction in predictions {
		let key = vox_domain::cache_key(&prediction.response_text);

		match positions.get(&key) {
			Some(&idx) =>
				if prediction.probability > out[idx].probability {
					out[idx] = prediction;
				},
			None => {
				positions.insert(key, out.len());
				out.push(prediction);
			},
		}
	}

	out.sort_by(|left, right| right.probability.total_cmp(&left.probability));

	out
}
