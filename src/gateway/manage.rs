//! Management actions over the shared cache and rate governor.

// self
use crate::{
	_prelude::*,
	cache::{CacheInfo, CacheKey, CacheSettings, CacheUpdate},
	gateway::Gateway,
	rate_limit::{RateLimitInfo, RateLimitUpdate},
	transport::RestTransport,
};

impl<T> Gateway<T>
where
	T: ?Sized + RestTransport,
{
	/// Cache policy plus up to 100 live keys.
	pub async fn cache_info(&self) -> CacheInfo {
		self.cache().info().await
	}

	/// Clears the cache, or only the entries under `target`.
	///
	/// A `target` naming a catalog operation clears that operation's entries; any other value
	/// is used as a raw key prefix. Returns the number of entries removed.
	pub async fn cache_clear(&self, target: Option<&str>) -> usize {
		match target.map(str::trim).filter(|target| !target.is_empty()) {
			None => self.cache().clear().await,
			Some(operation) if self.catalog.contains(operation) =>
				self.cache().invalidate(&CacheKey::operation_prefix(operation)).await,
			Some(prefix) => self.cache().invalidate(prefix).await,
		}
	}

	/// Applies a partial cache policy update.
	pub fn cache_configure(&self, update: CacheUpdate) -> CacheSettings {
		self.cache().configure(update)
	}

	/// Live rate bucket and backoff state.
	pub fn rate_limit_info(&self) -> RateLimitInfo {
		self.governor().info()
	}

	/// Applies a partial rate policy update.
	pub fn rate_limit_configure(&self, update: RateLimitUpdate) -> Result<RateLimitInfo> {
		Ok(self.governor().configure(update)?)
	}
}
