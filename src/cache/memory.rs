//! Sharded in-memory [`CacheStore`] implementation.

// self
use crate::{
	_prelude::*,
	cache::{CacheEntry, CacheFuture, CacheKey, CacheStore},
};

type Shard = RwLock<HashMap<CacheKey, CacheEntry>>;

/// Process-local cache store.
///
/// Keys are spread over independent shards so lookups for unrelated operations never contend
/// on the same lock. Expired entries are evicted lazily: when a read observes them, when a
/// store lands in their shard, and when the live keys are listed.
#[derive(Clone, Debug)]
pub struct MemoryCache(Arc<[Shard]>);
impl MemoryCache {
	/// Default shard count.
	pub const DEFAULT_SHARDS: usize = 16;

	/// Creates a store with `shards` independent locks (at least one).
	pub fn with_shards(shards: usize) -> Self {
		Self((0..shards.max(1)).map(|_| RwLock::new(HashMap::new())).collect())
	}

	fn shard(&self, key: &CacheKey) -> &Shard {
		let mut hasher = DefaultHasher::new();

		key.hash(&mut hasher);

		&self.0[(hasher.finish() % self.0.len() as u64) as usize]
	}

	fn fetch_now(&self, key: &CacheKey, now: OffsetDateTime) -> Option<CacheEntry> {
		let shard = self.shard(key);

		{
			let guard = shard.read();

			match guard.get(key) {
				Some(entry) if !entry.is_expired(now) => return Some(entry.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut guard = shard.write();

		if guard.get(key).is_some_and(|entry| entry.is_expired(now)) {
			guard.remove(key);
		}

		None
	}

	fn invalidate_now(&self, prefix: &str) -> usize {
		self.0
			.iter()
			.map(|shard| {
				let mut guard = shard.write();
				let before = guard.len();

				guard.retain(|key, _| !key.has_prefix(prefix));

				before - guard.len()
			})
			.sum()
	}

	fn store_now(&self, entry: CacheEntry) {
		let now = entry.created_at;
		let mut guard = self.shard(&entry.key).write();

		guard.retain(|_, cached| !cached.is_expired(now));
		guard.insert(entry.key.clone(), entry);
	}

	fn live_keys_now(&self, now: OffsetDateTime) -> Vec<CacheKey> {
		let mut keys = self
			.0
			.iter()
			.flat_map(|shard| {
				let mut guard = shard.write();

				guard.retain(|_, entry| !entry.is_expired(now));
				guard.keys().cloned().collect::<Vec<_>>()
			})
			.collect::<Vec<_>>();

		keys.sort();

		keys
	}
}
impl Default for MemoryCache {
	fn default() -> Self {
		Self::with_shards(Self::DEFAULT_SHARDS)
	}
}
impl CacheStore for MemoryCache {
	fn fetch<'a>(
		&'a self,
		key: &'a CacheKey,
		now: OffsetDateTime,
	) -> CacheFuture<'a, Option<CacheEntry>> {
		Box::pin(async move { Ok(self.fetch_now(key, now)) })
	}

	fn store(&self, entry: CacheEntry) -> CacheFuture<'_, ()> {
		Box::pin(async move {
			self.store_now(entry);

			Ok(())
		})
	}

	fn invalidate<'a>(&'a self, prefix: &'a str) -> CacheFuture<'a, usize> {
		Box::pin(async move { Ok(self.invalidate_now(prefix)) })
	}

	fn clear(&self) -> CacheFuture<'_, usize> {
		Box::pin(async move { Ok(self.invalidate_now("")) })
	}

	fn live_keys(&self, now: OffsetDateTime) -> CacheFuture<'_, Vec<CacheKey>> {
		Box::pin(async move { Ok(self.live_keys_now(now)) })
	}
}
