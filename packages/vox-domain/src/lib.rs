pub mod keywords;
pub mod text;

pub use keywords::{DEFAULT_MAX_KEYWORDS, extract_keywords, jaccard};
pub use text::{cache_key, content_hash, normalize, short_hash};
