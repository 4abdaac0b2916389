use unicode_segmentation::UnicodeSegmentation;

const DURATION_EPSILON: f32 = 1e-6;
const FRAGMENT_BOUNDARIES: [char; 4] = ['.', '!', '?', ','];
const TRAILING_CLOSERS: [char; 7] = ['"', '\'', ')', ']', '\u{201D}', '\u{2019}', '\u{00BB}'];

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	pub words_per_second: f32,
	pub min_seconds: f32,
	pub max_seconds: f32,
	/// Emit a final chunk shorter than `min_seconds` instead of dropping it.
	pub keep_trailing_fragment: bool,
}
impl ChunkingConfig {
	pub fn estimate_seconds(&self, words: usize) -> f32 {
		words as f32 / self.words_per_second
	}

	fn exceeds_max(&self, words: usize) -> bool {
		self.estimate_seconds(words) > self.max_seconds + DURATION_EPSILON
	}

	fn below_min(&self, words: usize) -> bool {
		self.estimate_seconds(words) + DURATION_EPSILON < self.min_seconds
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
	pub index: usize,
	pub text: String,
	pub content_hash: String,
	pub estimated_duration_seconds: f32,
	pub word_count: usize,
	pub start_offset: usize,
	pub end_offset: usize,
}

// A whitespace-delimited token. Tokens are never split, so each one that carries a word counts as
// exactly one spoken word; punctuation-only tokens count as none.
struct Token {
	start: usize,
	end: usize,
	words: usize,
	closes_fragment: bool,
}

/// Splits `text` into chunks whose spoken duration stays within the configured bounds.
///
/// Chunks prefer to end on sentence or comma boundaries. A fragment too long for one chunk is
/// broken between words. Only the final chunk may be shorter than `min_seconds`, and it is
/// dropped unless `keep_trailing_fragment` is set.
///
/// Every non-final chunk lands within bounds as long as the `[min_seconds, max_seconds]` window is
/// at least one word long.
pub fn split_text(text: &str, cfg: &ChunkingConfig) -> Vec<Chunk> {
	let tokens = tokenize(text);
	let mut chunks = Vec::new();
	let mut begin = 0_usize;
	let mut words = 0_usize;
	let mut next = 0_usize;

	while next < tokens.len() {
		let token = &tokens[next];

		if next > begin && cfg.exceeds_max(words + token.words) {
			let cut = break_point(&tokens[begin..next], cfg);

			chunks.push(build_chunk(text, &tokens[begin..begin + cut], chunks.len(), cfg));

			begin += cut;
			words = tokens[begin..next].iter().map(|token| token.words).sum();

			continue;
		}

		words += token.words;
		next += 1;
	}

	if begin < tokens.len() {
		if !cfg.below_min(words) || cfg.keep_trailing_fragment {
			chunks.push(build_chunk(text, &tokens[begin..], chunks.len(), cfg));
		} else {
			tracing::warn!(
				words,
				start_offset = tokens[begin].start,
				"Dropping trailing fragment shorter than the minimum chunk duration."
			);
		}
	}

	chunks
}

fn tokenize(text: &str) -> Vec<Token> {
	let mut tokens = Vec::new();
	let mut start = None;

	for (idx, ch) in text.char_indices() {
		if ch.is_whitespace() {
			if let Some(begin) = start.take() {
				tokens.push(token(text, begin, idx));
			}
		} else if start.is_none() {
			start = Some(idx);
		}
	}

	if let Some(begin) = start {
		tokens.push(token(text, begin, text.len()));
	}

	tokens
}

fn token(text: &str, start: usize, end: usize) -> Token {
	let raw = &text[start..end];

	Token {
		start,
		end,
		words: usize::from(raw.unicode_words().next().is_some()),
		closes_fragment: raw.trim_end_matches(TRAILING_CLOSERS).ends_with(FRAGMENT_BOUNDARIES),
	}
}

// Number of leading tokens to close: the last fragment boundary that already meets the minimum,
// else every token.
fn break_point(tokens: &[Token], cfg: &ChunkingConfig) -> usize {
	let mut words = 0;
	let mut cut = tokens.len();

	for (idx, token) in tokens.iter().enumerate() {
		words += token.words;

		if token.closes_fragment && !cfg.below_min(words) {
			cut = idx + 1;
		}
	}

	cut
}

fn build_chunk(text: &str, tokens: &[Token], index: usize, cfg: &ChunkingConfig) -> Chunk {
	let start_offset = tokens.first().map(|token| token.start).unwrap_or(0);
	let end_offset = tokens.last().map(|token| token.end).unwrap_or(start_offset);
	let chunk_text = text[start_offset..end_offset].to_string();
	let word_count = tokens.iter().map(|token| token.words).sum();

	Chunk {
		index,
		content_hash: vox_domain::cache_key(&chunk_text),
		text: chunk_text,
		estimated_duration_seconds: cfg.estimate_seconds(word_count),
		word_count,
		start_offset,
		end_offset,
	}
}
