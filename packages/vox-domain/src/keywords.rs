use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;

use crate::text;

pub const DEFAULT_MAX_KEYWORDS: usize = 10;

const MIN_KEYWORD_CHARS: usize = 3;
const STOP_WORDS: &[&str] = &[
	"about", "after", "all", "also", "and", "any", "are", "because", "been", "before", "being",
	"but", "can", "could", "did", "does", "doing", "for", "from", "had", "has", "have", "her",
	"here", "him", "his", "how", "into", "its", "just", "more", "most", "not", "now", "off",
	"once", "only", "other", "our", "out", "over", "own", "same", "she", "should", "some", "such",
	"than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
	"through", "too", "under", "until", "very", "was", "were", "what", "when", "where", "which",
	"while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
];

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}\p{N}]+)*").expect("Keyword token pattern must compile.")
});
static STOP_WORD_SET: LazyLock<HashSet<&'static str>> =
	LazyLock::new(|| STOP_WORDS.iter().copied().collect());

/// Salient tokens of `text` in order of first occurrence, at most `max_keywords`.
pub fn extract_keywords(text: &str, max_keywords: usize) -> Vec<String> {
	let normalized = text::normalize(text);
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for token in TOKEN.find_iter(&normalized).map(|m| m.as_str()) {
		if out.len() >= max_keywords {
			break;
		}
		if token.chars().count() < MIN_KEYWORD_CHARS || STOP_WORD_SET.contains(token) {
			continue;
		}
		if seen.insert(token) {
			out.push(token.to_string());
		}
	}

	out
}

/// Jaccard similarity of two keyword sets; zero when both are empty.
pub fn jaccard(left: &[String], right: &[String]) -> f32 {
	let left: HashSet<&str> = left.iter().map(String::as_str).collect();
	let right: HashSet<&str> = right.iter().map(String::as_str).collect();
	let union = left.union(&right).count();

	if union == 0 {
		return 0.0;
	}

	left.intersection(&right).count() as f32 / union as f32
}
