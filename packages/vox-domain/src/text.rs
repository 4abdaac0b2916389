use unicode_normalization::UnicodeNormalization;

/// Hex characters kept for job ids and prediction-cache keys (64 bits).
pub const SHORT_HASH_LEN: usize = 16;

/// Canonical form used for content addressing: NFKC, lowercased, trimmed.
pub fn normalize(text: &str) -> String {
	let composed: String = text.nfkc().collect();

	composed.to_lowercase().trim().to_string()
}

/// Full blake3 digest of the raw bytes.
pub fn content_hash(text: &str) -> String {
	blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Content address of `text`: the full digest of its normalized form.
pub fn cache_key(text: &str) -> String {
	content_hash(&normalize(text))
}

/// Truncated content address, for identifiers that travel through logs and URLs.
pub fn short_hash(text: &str) -> String {
	let mut key = cache_key(text);

	key.truncate(SHORT_HASH_LEN);

	key
}
