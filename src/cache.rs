//! Response cache: memoizes completed remote payloads under canonical request keys.
//!
//! [`ResponseCache`] is the facade the pager talks to. It owns the TTL and the enabled flag,
//! delegates storage to a [`CacheStore`], and absorbs every storage failure as a miss so the
//! cache can never fail a dispatch.

pub mod key;
pub mod memory;

pub use key::*;
pub use memory::MemoryCache;

// self
use crate::{_prelude::*, obs};

/// Boxed future returned by [`CacheStore`] operations.
pub type CacheFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, CacheStoreError>> + 'a + Send>>;

/// Storage backend contract implemented by cache stores.
pub trait CacheStore
where
	Self: Send + Sync,
{
	/// Returns the entry for `key` if it is still live at `now`. Expired entries must be treated
	/// as absent and may be evicted.
	fn fetch<'a>(&'a self, key: &'a CacheKey, now: OffsetDateTime)
	-> CacheFuture<'a, Option<CacheEntry>>;

	/// Inserts or replaces an entry.
	fn store(&self, entry: CacheEntry) -> CacheFuture<'_, ()>;

	/// Removes every entry whose key starts with `prefix`, returning how many were removed.
	fn invalidate<'a>(&'a self, prefix: &'a str) -> CacheFuture<'a, usize>;

	/// Removes every entry, returning how many were removed.
	fn clear(&self) -> CacheFuture<'_, usize>;

	/// Keys of the entries still live at `now`, sorted.
	fn live_keys(&self, now: OffsetDateTime) -> CacheFuture<'_, Vec<CacheKey>>;
}

/// Error type produced by [`CacheStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheStoreError {
	/// Payload could not be encoded or decoded by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// One memoized payload.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
	/// Canonical request identity.
	pub key: CacheKey,
	/// Raw response payload.
	pub value: Value,
	/// Insertion instant.
	pub created_at: OffsetDateTime,
	/// Lifetime granted at insertion.
	pub ttl: Duration,
}
impl CacheEntry {
	/// Instant at which the entry stops being served.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.created_at + self.ttl
	}

	/// Whether the entry's lifetime has fully elapsed at `now`.
	pub fn is_expired(&self, now: OffsetDateTime) -> bool {
		now - self.created_at >= self.ttl
	}
}

/// Cache policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
	/// Whether lookups and stores happen at all.
	pub enabled: bool,
	/// Entry lifetime in seconds.
	pub ttl_secs: u64,
}
impl CacheSettings {
	/// Default entry lifetime (five minutes).
	pub const DEFAULT_TTL_SECS: u64 = 300;

	/// Entry lifetime as a duration.
	pub fn ttl(&self) -> Duration {
		Duration::seconds(i64::try_from(self.ttl_secs).unwrap_or(i64::MAX))
	}
}
impl Default for CacheSettings {
	fn default() -> Self {
		Self { enabled: true, ttl_secs: Self::DEFAULT_TTL_SECS }
	}
}

/// Partial update applied by [`ResponseCache::configure`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheUpdate {
	/// New enabled flag.
	pub enabled: Option<bool>,
	/// New entry lifetime in seconds; applies to entries stored afterwards.
	pub ttl_secs: Option<u64>,
}

/// Snapshot returned by [`ResponseCache::info`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
	/// Whether the cache is active.
	pub enabled: bool,
	/// Entry lifetime in seconds.
	pub ttl_secs: u64,
	/// Number of live entries.
	pub entries: usize,
	/// Up to [`ResponseCache::INFO_KEY_LIMIT`] live keys, sorted.
	pub keys: Vec<String>,
}

/// Cache facade shared by every dispatch.
pub struct ResponseCache {
	store: Arc<dyn CacheStore>,
	settings: RwLock<CacheSettings>,
}
impl ResponseCache {
	/// Maximum number of keys listed by [`info`](Self::info).
	pub const INFO_KEY_LIMIT: usize = 100;

	/// Creates a cache backed by a fresh [`MemoryCache`].
	pub fn new(settings: CacheSettings) -> Self {
		Self::with_store(Arc::new(MemoryCache::default()), settings)
	}

	/// Creates a cache over a custom store.
	pub fn with_store(store: Arc<dyn CacheStore>, settings: CacheSettings) -> Self {
		Self { store, settings: RwLock::new(settings) }
	}

	/// Current policy.
	pub fn settings(&self) -> CacheSettings {
		self.settings.read().clone()
	}

	/// Whether the cache is active.
	pub fn is_enabled(&self) -> bool {
		self.settings.read().enabled
	}

	/// Returns the live payload for `key`, if any.
	pub async fn get(&self, key: &CacheKey) -> Option<Value> {
		self.get_at(key, OffsetDateTime::now_utc()).await
	}

	/// [`get`](Self::get) evaluated at an explicit instant.
	pub async fn get_at(&self, key: &CacheKey, now: OffsetDateTime) -> Option<Value> {
		self.entry_at(key, now).await.map(|entry| entry.value)
	}

	/// Returns the live entry for `key`, including its insertion instant and lifetime.
	pub async fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
		self.entry_at(key, OffsetDateTime::now_utc()).await
	}

	/// [`entry`](Self::entry) evaluated at an explicit instant.
	pub async fn entry_at(&self, key: &CacheKey, now: OffsetDateTime) -> Option<CacheEntry> {
		if !self.is_enabled() {
			return None;
		}

		let entry = match self.store.fetch(key, now).await {
			Ok(entry) => entry,
			Err(e) => {
				tracing::warn!(key = %key.fingerprint(), error = %e, "Cache lookup failed; treating as a miss.");

				None
			},
		};

		obs::record_cache_lookup(entry.is_some());

		if entry.is_some() {
			tracing::debug!(key = %key.fingerprint(), "Cache hit.");
		} else {
			tracing::debug!(key = %key.fingerprint(), "Cache miss.");
		}

		entry
	}

	/// Stores `value` under `key` with the configured TTL.
	pub async fn put(&self, key: CacheKey, value: Value) {
		self.put_at(key, value, OffsetDateTime::now_utc()).await;
	}

	/// [`put`](Self::put) with an explicit insertion instant.
	pub async fn put_at(&self, key: CacheKey, value: Value, now: OffsetDateTime) {
		let ttl = self.settings.read().ttl();

		self.put_with_ttl(key, value, now, ttl).await;
	}

	/// Stores `value` under `key` with an explicit lifetime.
	pub async fn put_with_ttl(&self, key: CacheKey, value: Value, now: OffsetDateTime, ttl: Duration) {
		if !self.is_enabled() {
			return;
		}

		let fingerprint = key.fingerprint();
		let entry = CacheEntry { key, value, created_at: now, ttl };

		match self.store.store(entry).await {
			Ok(()) => tracing::debug!(key = %fingerprint, ttl = %ttl, "Cached response."),
			Err(e) =>
				tracing::warn!(key = %fingerprint, error = %e, "Cache store failed; response not cached."),
		}
	}

	/// Removes every entry whose key starts with `prefix`.
	pub async fn invalidate(&self, prefix: &str) -> usize {
		match self.store.invalidate(prefix).await {
			Ok(removed) => {
				tracing::info!(prefix, removed, "Invalidated cache entries.");

				removed
			},
			Err(e) => {
				tracing::warn!(prefix, error = %e, "Cache invalidation failed.");

				0
			},
		}
	}

	/// Removes every entry.
	pub async fn clear(&self) -> usize {
		match self.store.clear().await {
			Ok(removed) => {
				tracing::info!(removed, "Cleared response cache.");

				removed
			},
			Err(e) => {
				tracing::warn!(error = %e, "Cache clear failed.");

				0
			},
		}
	}

	/// Policy plus the live keys.
	pub async fn info(&self) -> CacheInfo {
		let settings = self.settings();
		let keys = match self.store.live_keys(OffsetDateTime::now_utc()).await {
			Ok(keys) => keys,
			Err(e) => {
				tracing::warn!(error = %e, "Cache key listing failed.");

				Vec::new()
			},
		};

		CacheInfo {
			enabled: settings.enabled,
			ttl_secs: settings.ttl_secs,
			entries: keys.len(),
			keys: keys.into_iter().take(Self::INFO_KEY_LIMIT).map(String::from).collect(),
		}
	}

	/// Applies a partial policy update and returns the resulting policy.
	pub fn configure(&self, update: CacheUpdate) -> CacheSettings {
		let mut settings = self.settings.write();

		if let Some(enabled) = update.enabled {
			settings.enabled = enabled;
		}
		if let Some(ttl_secs) = update.ttl_secs {
			settings.ttl_secs = ttl_secs;
		}

		tracing::info!(enabled = settings.enabled, ttl_secs = settings.ttl_secs, "Cache reconfigured.");

		settings.clone()
	}
}
impl Default for ResponseCache {
	fn default() -> Self {
		Self::new(CacheSettings::default())
	}
}
impl Debug for ResponseCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResponseCache").field("settings", &*self.settings.read()).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::request::QueryParams;

	struct BrokenStore;
	impl CacheStore for BrokenStore {
		fn fetch<'a>(
			&'a self,
			_: &'a CacheKey,
			_: OffsetDateTime,
		) -> CacheFuture<'a, Option<CacheEntry>> {
			Box::pin(async { Err(CacheStoreError::Backend { message: "disk on fire".into() }) })
		}

		fn store(&self, _: CacheEntry) -> CacheFuture<'_, ()> {
			Box::pin(async { Err(CacheStoreError::Backend { message: "disk on fire".into() }) })
		}

		fn invalidate<'a>(&'a self, _: &'a str) -> CacheFuture<'a, usize> {
			Box::pin(async { Err(CacheStoreError::Backend { message: "disk on fire".into() }) })
		}

		fn clear(&self) -> CacheFuture<'_, usize> {
			Box::pin(async { Err(CacheStoreError::Backend { message: "disk on fire".into() }) })
		}

		fn live_keys(&self, _: OffsetDateTime) -> CacheFuture<'_, Vec<CacheKey>> {
			Box::pin(async { Err(CacheStoreError::Backend { message: "disk on fire".into() }) })
		}
	}

	fn key(page: u32) -> CacheKey {
		CacheKey::new("endpoints", None, &QueryParams::new(), KeyScope::Page(page))
	}

	#[tokio::test]
	async fn entries_expire_exactly_at_ttl() {
		let cache = ResponseCache::new(CacheSettings { enabled: true, ttl_secs: 60 });
		let created = OffsetDateTime::now_utc();

		cache.put_at(key(1), serde_json::json!([1, 2]), created).await;

		assert_eq!(
			cache.get_at(&key(1), created + Duration::seconds(59)).await,
			Some(serde_json::json!([1, 2]))
		);
		assert_eq!(cache.get_at(&key(1), created + Duration::seconds(60)).await, None);
		assert_eq!(cache.get_at(&key(1), created + Duration::seconds(59)).await, None);
	}

	#[tokio::test]
	async fn disabled_cache_neither_reads_nor_writes() {
		let cache = ResponseCache::default();

		cache.put(key(1), serde_json::json!(1)).await;
		cache.configure(CacheUpdate { enabled: Some(false), ttl_secs: None });

		assert_eq!(cache.get(&key(1)).await, None);

		cache.put(key(2), serde_json::json!(2)).await;
		cache.configure(CacheUpdate { enabled: Some(true), ttl_secs: None });

		assert_eq!(cache.get(&key(1)).await, Some(serde_json::json!(1)));
		assert_eq!(cache.get(&key(2)).await, None);
	}

	#[tokio::test]
	async fn store_failures_degrade_to_misses() {
		let cache = ResponseCache::with_store(Arc::new(BrokenStore), CacheSettings::default());

		cache.put(key(1), serde_json::json!(1)).await;

		assert_eq!(cache.get(&key(1)).await, None);
		assert_eq!(cache.invalidate("endpoints|").await, 0);
		assert_eq!(cache.clear().await, 0);
		assert_eq!(cache.info().await.entries, 0);
	}

	#[tokio::test]
	async fn info_reports_policy_and_keys() {
		let cache = ResponseCache::default();

		cache.put(key(2), serde_json::json!(2)).await;
		cache.put(key(1), serde_json::json!(1)).await;

		let settings = cache.configure(CacheUpdate { enabled: None, ttl_secs: Some(30) });

		assert_eq!(settings.ttl_secs, 30);

		let info = cache.info().await;

		assert!(info.enabled);
		assert_eq!(info.ttl_secs, 30);
		assert_eq!(info.entries, 2);
		assert_eq!(info.keys, vec!["endpoints|||page=1".to_owned(), "endpoints|||page=2".to_owned()]);
	}
}
