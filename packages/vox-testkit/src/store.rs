use std::time::Duration;

use vox_storage::{BoxFuture, Error, KvStore, Result, ScoredMember};

/// A [`KvStore`] whose every operation fails, standing in for an unreachable backend.
#[derive(Debug, Default)]
pub struct FailingStore;

fn unavailable<'a, T>() -> BoxFuture<'a, Result<T>>
where
	T: Send + 'a,
{
	Box::pin(async { Err(Error::Backend("Store is unavailable.".to_string())) })
}

impl KvStore for FailingStore {
	fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
		unavailable()
	}

	fn set<'a>(
		&'a self,
		_key: &'a str,
		_value: &'a str,
		_ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<()>> {
		unavailable()
	}

	fn delete<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<bool>> {
		unavailable()
	}

	fn incr<'a>(
		&'a self,
		_key: &'a str,
		_by: i64,
		_ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<i64>> {
		unavailable()
	}

	fn expire<'a>(&'a self, _key: &'a str, _ttl: Duration) -> BoxFuture<'a, Result<bool>> {
		unavailable()
	}

	fn push_bounded<'a>(
		&'a self,
		_key: &'a str,
		_value: &'a str,
		_capacity: usize,
		_ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<usize>> {
		unavailable()
	}

	fn list_tail<'a>(&'a self, _key: &'a str, _count: usize) -> BoxFuture<'a, Result<Vec<String>>> {
		unavailable()
	}

	fn zadd<'a>(
		&'a self,
		_key: &'a str,
		_member: &'a str,
		_score: f64,
	) -> BoxFuture<'a, Result<()>> {
		unavailable()
	}

	fn zpop_max<'a>(
		&'a self,
		_key: &'a str,
		_count: usize,
	) -> BoxFuture<'a, Result<Vec<ScoredMember>>> {
		unavailable()
	}

	fn zrange_desc<'a>(
		&'a self,
		_key: &'a str,
		_count: usize,
	) -> BoxFuture<'a, Result<Vec<ScoredMember>>> {
		unavailable()
	}

	fn zcard<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<usize>> {
		unavailable()
	}

	fn purge_expired(&self) -> BoxFuture<'_, Result<u64>> {
		unavailable()
	}
}
