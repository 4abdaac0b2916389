use std::time::Duration;

use sqlx::{PgPool, Postgres, Transaction, postgres::PgPoolOptions};
use time::OffsetDateTime;

use crate::{
	BoxFuture, Error, KvStore, Result, ScoredMember,
	schema::{self, KIND_LIST, KIND_SORTED, KIND_TEXT},
};

const SCHEMA_LOCK_ID: i64 = 7_120_115;

/// [`KvStore`] backed by Postgres. Writers serialize per key with transaction-scoped advisory
/// locks; priority pulls use `FOR UPDATE SKIP LOCKED` so concurrent pullers never share a member.
pub struct PgStore {
	pub pool: PgPool,
}
impl PgStore {
	pub async fn connect(cfg: &vox_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)")
			.bind(SCHEMA_LOCK_ID)
			.execute(&mut *tx)
			.await?;

		for statement in schema::statements() {
			sqlx::query(statement).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		tracing::debug!(statements = schema::statements().count(), "Storage schema ensured.");

		Ok(())
	}

	async fn begin_locked(&self, key: &str) -> Result<Transaction<'static, Postgres>> {
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
			.bind(key)
			.execute(&mut *tx)
			.await?;

		Ok(tx)
	}

	async fn get_text(&self, key: &str) -> Result<Option<String>> {
		let now = OffsetDateTime::now_utc();
		let row: Option<(String, String)> = sqlx::query_as(
			"\
SELECT kind, value
FROM kv_entries
WHERE key = $1 AND (expires_at IS NULL OR expires_at > $2)",
		)
		.bind(key)
		.bind(now)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			None => Ok(None),
			Some((kind, value)) if kind == KIND_TEXT => Ok(Some(value)),
			Some(_) => Err(Error::WrongType { key: key.to_string() }),
		}
	}

	async fn set_text(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
		let now = OffsetDateTime::now_utc();
		let expires_at = expires_at(now, ttl)?;
		let mut tx = self.begin_locked(key).await?;

		sqlx::query("DELETE FROM kv_entries WHERE key = $1").bind(key).execute(&mut *tx).await?;
		sqlx::query(
			"INSERT INTO kv_entries (key, kind, value, expires_at) VALUES ($1, $2, $3, $4)",
		)
		.bind(key)
		.bind(KIND_TEXT)
		.bind(value)
		.bind(expires_at)
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;

		Ok(())
	}

	async fn delete_key(&self, key: &str) -> Result<bool> {
		let now = OffsetDateTime::now_utc();
		let live: Option<bool> = sqlx::query_scalar(
			"\
DELETE FROM kv_entries
WHERE key = $1
RETURNING (expires_at IS NULL OR expires_at > $2)",
		)
		.bind(key)
		.bind(now)
		.fetch_optional(&self.pool)
		.await?;

		Ok(live.unwrap_or(false))
	}

	async fn incr_counter(&self, key: &str, by: i64, ttl: Option<Duration>) -> Result<i64> {
		let now = OffsetDateTime::now_utc();
		let new_expiry = expires_at(now, ttl)?;
		let mut tx = self.begin_locked(key).await?;
		let current = lock_live_header(&mut tx, key, now).await?;
		let next = match current {
			None => {
				let next = by;

				sqlx::query(
					"INSERT INTO kv_entries (key, kind, value, expires_at) VALUES ($1, $2, $3, $4)",
				)
				.bind(key)
				.bind(KIND_TEXT)
				.bind(next.to_string())
				.bind(new_expiry)
				.execute(&mut *tx)
				.await?;

				next
			},
			Some((kind, value)) => {
				if kind != KIND_TEXT {
					return Err(Error::WrongType { key: key.to_string() });
				}

				let current: i64 = value.parse().map_err(|_| {
					Error::InvalidArgument(format!("Value at key {key} is not an integer."))
				})?;
				let next = current.saturating_add(by);

				sqlx::query(
					"\
UPDATE kv_entries
SET value = $2, expires_at = COALESCE($3, expires_at)
WHERE key = $1",
				)
				.bind(key)
				.bind(next.to_string())
				.bind(new_expiry)
				.execute(&mut *tx)
				.await?;

				next
			},
		};

		tx.commit().await?;

		Ok(next)
	}

	async fn expire_key(&self, key: &str, ttl: Duration) -> Result<bool> {
		let now = OffsetDateTime::now_utc();
		let expires_at = expires_at(now, Some(ttl))?;
		let result = sqlx::query(
			"\
UPDATE kv_entries
SET expires_at = $2
WHERE key = $1 AND (expires_at IS NULL OR expires_at > $3)",
		)
		.bind(key)
		.bind(expires_at)
		.bind(now)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn push_item(
		&self,
		key: &str,
		value: &str,
		capacity: usize,
		ttl: Option<Duration>,
	) -> Result<usize> {
		if capacity == 0 {
			return Err(Error::InvalidArgument("List capacity must be positive.".to_string()));
		}

		let now = OffsetDateTime::now_utc();
		let new_expiry = expires_at(now, ttl)?;
		let mut tx = self.begin_locked(key).await?;

		ensure_header(&mut tx, key, KIND_LIST, now).await?;

		sqlx::query("INSERT INTO kv_list_items (key, value) VALUES ($1, $2)")
			.bind(key)
			.bind(value)
			.execute(&mut *tx)
			.await?;
		sqlx::query(
			"\
DELETE FROM kv_list_items
WHERE key = $1
	AND seq <= (
		SELECT seq
		FROM kv_list_items
		WHERE key = $1
		ORDER BY seq DESC
		OFFSET $2
		LIMIT 1
	)",
		)
		.bind(key)
		.bind(to_i64(capacity)?)
		.execute(&mut *tx)
		.await?;

		if new_expiry.is_some() {
			sqlx::query("UPDATE kv_entries SET expires_at = $2 WHERE key = $1")
				.bind(key)
				.bind(new_expiry)
				.execute(&mut *tx)
				.await?;
		}

		let len: i64 = sqlx::query_scalar("SELECT count(*) FROM kv_list_items WHERE key = $1")
			.bind(key)
			.fetch_one(&mut *tx)
			.await?;

		tx.commit().await?;

		Ok(len as usize)
	}

	async fn tail_items(&self, key: &str, count: usize) -> Result<Vec<String>> {
		let now = OffsetDateTime::now_utc();

		if !self.header_is(key, KIND_LIST, now).await? {
			return Ok(Vec::new());
		}

		let rows: Vec<String> = sqlx::query_scalar(
			"\
SELECT value
FROM (
	SELECT value, seq
	FROM kv_list_items
	WHERE key = $1
	ORDER BY seq DESC
	LIMIT $2
) AS tail
ORDER BY seq ASC",
		)
		.bind(key)
		.bind(to_i64(count)?)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows)
	}

	async fn add_member(&self, key: &str, member: &str, score: f64) -> Result<()> {
		if !score.is_finite() {
			return Err(Error::InvalidArgument("Score must be a finite number.".to_string()));
		}

		let now = OffsetDateTime::now_utc();
		let mut tx = self.begin_locked(key).await?;

		ensure_header(&mut tx, key, KIND_SORTED, now).await?;

		sqlx::query(
			"\
INSERT INTO kv_sorted_members (key, member, score)
VALUES ($1, $2, $3)
ON CONFLICT (key, member) DO UPDATE SET score = EXCLUDED.score",
		)
		.bind(key)
		.bind(member)
		.bind(score)
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;

		Ok(())
	}

	async fn pop_members(&self, key: &str, count: usize) -> Result<Vec<ScoredMember>> {
		let now = OffsetDateTime::now_utc();

		if count == 0 || !self.header_is(key, KIND_SORTED, now).await? {
			return Ok(Vec::new());
		}

		let mut rows: Vec<(String, f64, i64)> = sqlx::query_as(
			"\
DELETE FROM kv_sorted_members
WHERE key = $1
	AND member IN (
		SELECT member
		FROM kv_sorted_members
		WHERE key = $1
		ORDER BY score DESC, seq ASC
		LIMIT $2
		FOR UPDATE SKIP LOCKED
	)
RETURNING member, score, seq",
		)
		.bind(key)
		.bind(to_i64(count)?)
		.fetch_all(&self.pool)
		.await?;

		rows.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.2.cmp(&right.2)));

		Ok(rows.into_iter().map(|(member, score, _)| ScoredMember { member, score }).collect())
	}

	async fn range_members(&self, key: &str, count: usize) -> Result<Vec<ScoredMember>> {
		let now = OffsetDateTime::now_utc();

		if !self.header_is(key, KIND_SORTED, now).await? {
			return Ok(Vec::new());
		}

		let rows: Vec<(String, f64)> = sqlx::query_as(
			"\
SELECT member, score
FROM kv_sorted_members
WHERE key = $1
ORDER BY score DESC, seq ASC
LIMIT $2",
		)
		.bind(key)
		.bind(to_i64(count)?)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows.into_iter().map(|(member, score)| ScoredMember { member, score }).collect())
	}

	async fn count_members(&self, key: &str) -> Result<usize> {
		let now = OffsetDateTime::now_utc();

		if !self.header_is(key, KIND_SORTED, now).await? {
			return Ok(0);
		}

		let count: i64 = sqlx::query_scalar("SELECT count(*) FROM kv_sorted_members WHERE key = $1")
			.bind(key)
			.fetch_one(&self.pool)
			.await?;

		Ok(count as usize)
	}

	async fn purge(&self) -> Result<u64> {
		let now = OffsetDateTime::now_utc();
		let result = sqlx::query(
			"DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= $1",
		)
		.bind(now)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected())
	}

	/// True when `key` is live and holds `kind`; a live key of another kind is an error.
	async fn header_is(&self, key: &str, kind: &str, now: OffsetDateTime) -> Result<bool> {
		let stored: Option<String> = sqlx::query_scalar(
			"\
SELECT kind
FROM kv_entries
WHERE key = $1 AND (expires_at IS NULL OR expires_at > $2)",
		)
		.bind(key)
		.bind(now)
		.fetch_optional(&self.pool)
		.await?;

		match stored {
			None => Ok(false),
			Some(stored) if stored == kind => Ok(true),
			Some(_) => Err(Error::WrongType { key: key.to_string() }),
		}
	}
}

impl KvStore for PgStore {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(self.get_text(key))
	}

	fn set<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.set_text(key, value, ttl))
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(self.delete_key(key))
	}

	fn incr<'a>(
		&'a self,
		key: &'a str,
		by: i64,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<i64>> {
		Box::pin(self.incr_counter(key, by, ttl))
	}

	fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, Result<bool>> {
		Box::pin(self.expire_key(key, ttl))
	}

	fn push_bounded<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		capacity: usize,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<usize>> {
		Box::pin(self.push_item(key, value, capacity, ttl))
	}

	fn list_tail<'a>(&'a self, key: &'a str, count: usize) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(self.tail_items(key, count))
	}

	fn zadd<'a>(&'a self, key: &'a str, member: &'a str, score: f64) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.add_member(key, member, score))
	}

	fn zpop_max<'a>(
		&'a self,
		key: &'a str,
		count: usize,
	) -> BoxFuture<'a, Result<Vec<ScoredMember>>> {
		Box::pin(self.pop_members(key, count))
	}

	fn zrange_desc<'a>(
		&'a self,
		key: &'a str,
		count: usize,
	) -> BoxFuture<'a, Result<Vec<ScoredMember>>> {
		Box::pin(self.range_members(key, count))
	}

	fn zcard<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<usize>> {
		Box::pin(self.count_members(key))
	}

	fn purge_expired(&self) -> BoxFuture<'_, Result<u64>> {
		Box::pin(self.purge())
	}
}

/// Drops an expired `key`, then returns the live header row locked for update.
async fn lock_live_header(
	tx: &mut Transaction<'static, Postgres>,
	key: &str,
	now: OffsetDateTime,
) -> Result<Option<(String, String)>> {
	sqlx::query("DELETE FROM kv_entries WHERE key = $1 AND expires_at IS NOT NULL AND expires_at <= $2")
		.bind(key)
		.bind(now)
		.execute(&mut **tx)
		.await?;

	let row: Option<(String, String)> =
		sqlx::query_as("SELECT kind, value FROM kv_entries WHERE key = $1 FOR UPDATE")
			.bind(key)
			.fetch_optional(&mut **tx)
			.await?;

	Ok(row)
}

async fn ensure_header(
	tx: &mut Transaction<'static, Postgres>,
	key: &str,
	kind: &str,
	now: OffsetDateTime,
) -> Result<()> {
	match lock_live_header(tx, key, now).await? {
		Some((stored, _)) if stored == kind => Ok(()),
		Some(_) => Err(Error::WrongType { key: key.to_string() }),
		None => {
			sqlx::query("INSERT INTO kv_entries (key, kind) VALUES ($1, $2)")
				.bind(key)
				.bind(kind)
				.execute(&mut **tx)
				.await?;

			Ok(())
		},
	}
}

fn expires_at(now: OffsetDateTime, ttl: Option<Duration>) -> Result<Option<OffsetDateTime>> {
	let Some(ttl) = ttl else { return Ok(None) };
	let ttl = time::Duration::try_from(ttl)
		.map_err(|_| Error::InvalidArgument(format!("TTL {ttl:?} is out of range.")))?;

	Ok(Some(now + ttl))
}

fn to_i64(value: usize) -> Result<i64> {
	i64::try_from(value).map_err(|_| Error::InvalidArgument(format!("{value} exceeds i64.")))
}
