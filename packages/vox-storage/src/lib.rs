pub mod memory;
pub mod postgres;
pub mod schema;

mod error;

pub use error::Error;
pub use futures::future::BoxFuture;
pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::time::Duration;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A member of a score-sorted collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
	pub member: String,
	pub score: f64,
}

/// Shared key-value store with TTL expiry, atomic counters, bounded lists and score-sorted
/// collections.
///
/// Every operation is atomic with respect to its key. Expired keys behave exactly like absent
/// keys for every operation.
pub trait KvStore
where
	Self: Send + Sync,
{
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;

	/// Overwrites `key`. `ttl = None` stores without expiry.
	fn set<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<()>>;

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>>;

	/// Adds `by` to the integer at `key` (absent counts as zero) and returns the new value.
	/// A `ttl` replaces the key's expiry; `None` keeps the current one.
	fn incr<'a>(
		&'a self,
		key: &'a str,
		by: i64,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<i64>>;

	/// Returns false when the key does not exist.
	fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, Result<bool>>;

	/// Appends `value` to the list at `key`, evicting the oldest items beyond `capacity`.
	/// Returns the resulting length.
	fn push_bounded<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		capacity: usize,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<usize>>;

	/// The newest `count` items of the list, oldest first.
	fn list_tail<'a>(&'a self, key: &'a str, count: usize) -> BoxFuture<'a, Result<Vec<String>>>;

	/// Inserts `member` or updates its score.
	fn zadd<'a>(&'a self, key: &'a str, member: &'a str, score: f64) -> BoxFuture<'a, Result<()>>;

	/// Removes and returns up to `count` members, highest score first. Equal scores pop in
	/// insertion order.
	fn zpop_max<'a>(
		&'a self,
		key: &'a str,
		count: usize,
	) -> BoxFuture<'a, Result<Vec<ScoredMember>>>;

	/// Same order as [`KvStore::zpop_max`] without removing anything.
	fn zrange_desc<'a>(
		&'a self,
		key: &'a str,
		count: usize,
	) -> BoxFuture<'a, Result<Vec<ScoredMember>>>;

	fn zcard<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<usize>>;

	/// Physically removes expired keys and returns how many were dropped.
	fn purge_expired(&self) -> BoxFuture<'_, Result<u64>>;
}
