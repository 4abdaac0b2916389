use std::{
	cmp::Ordering,
	collections::{HashMap, VecDeque},
	sync::Mutex,
	time::Duration,
};

use tokio::time::Instant;

use crate::{BoxFuture, Error, KvStore, Result, ScoredMember};

/// Process-local [`KvStore`]. One mutex guards the whole keyspace, so every operation is atomic.
///
/// Expiry follows the tokio clock, which lets tests drive TTLs with a paused runtime.
#[derive(Default)]
pub struct MemoryStore {
	state: Mutex<State>,
}

#[derive(Default)]
struct State {
	entries: HashMap<String, Entry>,
	next_seq: u64,
}

struct Entry {
	slot: Slot,
	expires_at: Option<Instant>,
}

enum Slot {
	Text(String),
	List(VecDeque<String>),
	Sorted(Vec<SortedItem>),
}

struct SortedItem {
	member: String,
	score: f64,
	seq: u64,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	fn with_state<T>(&self, f: impl FnOnce(&mut State, Instant) -> Result<T>) -> Result<T> {
		let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());

		f(&mut state, Instant::now())
	}
}

impl State {
	fn live(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
		self.evict_expired(key, now);

		self.entries.get_mut(key)
	}

	fn live_or_insert(&mut self, key: &str, now: Instant, empty: fn() -> Slot) -> &mut Entry {
		self.evict_expired(key, now);

		self.entries
			.entry(key.to_string())
			.or_insert_with(|| Entry { slot: empty(), expires_at: None })
	}

	fn evict_expired(&mut self, key: &str, now: Instant) {
		let expired = self.entries.get(key).map(|entry| entry.is_expired(now)).unwrap_or(false);

		if expired {
			self.entries.remove(key);
		}
	}

	fn next_seq(&mut self) -> u64 {
		self.next_seq += 1;

		self.next_seq
	}
}

impl Entry {
	fn is_expired(&self, now: Instant) -> bool {
		self.expires_at.map(|at| at <= now).unwrap_or(false)
	}
}

impl KvStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
		let result = self.with_state(|state, now| match state.live(key, now) {
			None => Ok(None),
			Some(Entry { slot: Slot::Text(value), .. }) => Ok(Some(value.clone())),
			Some(_) => Err(Error::WrongType { key: key.to_string() }),
		});

		Box::pin(async move { result })
	}

	fn set<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<()>> {
		let result = self.with_state(|state, now| {
			state.entries.insert(
				key.to_string(),
				Entry { slot: Slot::Text(value.to_string()), expires_at: ttl.map(|ttl| now + ttl) },
			);

			Ok(())
		});

		Box::pin(async move { result })
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		let result = self.with_state(|state, now| {
			let existed = state.live(key, now).is_some();

			state.entries.remove(key);

			Ok(existed)
		});

		Box::pin(async move { result })
	}

	fn incr<'a>(
		&'a self,
		key: &'a str,
		by: i64,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<i64>> {
		let result = self.with_state(|state, now| {
			let entry = state.live_or_insert(key, now, || Slot::Text("0".to_string()));
			let Slot::Text(raw) = &mut entry.slot else {
				return Err(Error::WrongType { key: key.to_string() });
			};
			let current: i64 = raw.parse().map_err(|_| {
				Error::InvalidArgument(format!("Value at key {key} is not an integer."))
			})?;
			let next = current.saturating_add(by);

			*raw = next.to_string();

			if let Some(ttl) = ttl {
				entry.expires_at = Some(now + ttl);
			}

			Ok(next)
		});

		Box::pin(async move { result })
	}

	fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, Result<bool>> {
		let result = self.with_state(|state, now| match state.live(key, now) {
			Some(entry) => {
				entry.expires_at = Some(now + ttl);

				Ok(true)
			},
			None => Ok(false),
		});

		Box::pin(async move { result })
	}

	fn push_bounded<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		capacity: usize,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<usize>> {
		let result = self.with_state(|state, now| {
			if capacity == 0 {
				return Err(Error::InvalidArgument("List capacity must be positive.".to_string()));
			}

			let entry = state.live_or_insert(key, now, || Slot::List(VecDeque::new()));
			let Slot::List(items) = &mut entry.slot else {
				return Err(Error::WrongType { key: key.to_string() });
			};

			items.push_back(value.to_string());

			while items.len() > capacity {
				items.pop_front();
			}

			let len = items.len();

			if let Some(ttl) = ttl {
				entry.expires_at = Some(now + ttl);
			}

			Ok(len)
		});

		Box::pin(async move { result })
	}

	fn list_tail<'a>(&'a self, key: &'a str, count: usize) -> BoxFuture<'a, Result<Vec<String>>> {
		let result = self.with_state(|state, now| match state.live(key, now) {
			None => Ok(Vec::new()),
			Some(Entry { slot: Slot::List(items), .. }) => {
				let skip = items.len().saturating_sub(count);

				Ok(items.iter().skip(skip).cloned().collect())
			},
			Some(_) => Err(Error::WrongType { key: key.to_string() }),
		});

		Box::pin(async move { result })
	}

	fn zadd<'a>(&'a self, key: &'a str, member: &'a str, score: f64) -> BoxFuture<'a, Result<()>> {
		let result = self.with_state(|state, now| {
			if !score.is_finite() {
				return Err(Error::InvalidArgument("Score must be a finite number.".to_string()));
			}

			let seq = state.next_seq();
			let entry = state.live_or_insert(key, now, || Slot::Sorted(Vec::new()));
			let Slot::Sorted(items) = &mut entry.slot else {
				return Err(Error::WrongType { key: key.to_string() });
			};

			match items.iter_mut().find(|item| item.member == member) {
				Some(item) => item.score = score,
				None => items.push(SortedItem { member: member.to_string(), score, seq }),
			}

			items.sort_by(rank_order);

			Ok(())
		});

		Box::pin(async move { result })
	}

	fn zpop_max<'a>(
		&'a self,
		key: &'a str,
		count: usize,
	) -> BoxFuture<'a, Result<Vec<ScoredMember>>> {
		let result = self.with_state(|state, now| match state.live(key, now) {
			None => Ok(Vec::new()),
			Some(Entry { slot: Slot::Sorted(items), .. }) => {
				let take = count.min(items.len());

				Ok(items
					.drain(..take)
					.map(|item| ScoredMember { member: item.member, score: item.score })
					.collect())
			},
			Some(_) => Err(Error::WrongType { key: key.to_string() }),
		});

		Box::pin(async move { result })
	}

	fn zrange_desc<'a>(
		&'a self,
		key: &'a str,
		count: usize,
	) -> BoxFuture<'a, Result<Vec<ScoredMember>>> {
		let result = self.with_state(|state, now| match state.live(key, now) {
			None => Ok(Vec::new()),
			Some(Entry { slot: Slot::Sorted(items), .. }) => Ok(items
				.iter()
				.take(count)
				.map(|item| ScoredMember { member: item.member.clone(), score: item.score })
				.collect()),
			Some(_) => Err(Error::WrongType { key: key.to_string() }),
		});

		Box::pin(async move { result })
	}

	fn zcard<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<usize>> {
		let result = self.with_state(|state, now| match state.live(key, now) {
			None => Ok(0),
			Some(Entry { slot: Slot::Sorted(items), .. }) => Ok(items.len()),
			Some(_) => Err(Error::WrongType { key: key.to_string() }),
		});

		Box::pin(async move { result })
	}

	fn purge_expired(&self) -> BoxFuture<'_, Result<u64>> {
		let result = self.with_state(|state, now| {
			let before = state.entries.len();

			state.entries.retain(|_, entry| !entry.is_expired(now));

			Ok((before - state.entries.len()) as u64)
		});

		Box::pin(async move { result })
	}
}

fn rank_order(left: &SortedItem, right: &SortedItem) -> Ordering {
	right.score.total_cmp(&left.score).then(left.seq.cmp(&right.seq))
}
