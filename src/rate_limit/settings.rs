//! Rate governor policy.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, catalog::DEFAULT_CATEGORY, error::ConfigError, rate_limit::BucketConfig};

/// Token-bucket policy: one global bucket plus one bucket per category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
	/// When `false`, admission is a no-op.
	pub enabled: bool,
	/// Bucket every request must pass.
	pub global: BucketConfig,
	/// Per-category buckets. Categories without an entry use the `default` entry.
	pub categories: BTreeMap<String, BucketConfig>,
	/// Longest a single admission may wait before failing, in milliseconds.
	pub max_wait_ms: u64,
	/// First throttle backoff, in milliseconds; doubles per consecutive throttle.
	pub backoff_base_ms: u64,
	/// Backoff ceiling, in milliseconds.
	pub backoff_max_ms: u64,
	/// How many times a throttled (429) page is retried before the failure surfaces.
	pub max_throttle_retries: u32,
}
impl RateLimitSettings {
	/// Fallback rate used when not even a `default` category is configured.
	pub const FALLBACK_RATE: u32 = 10;

	/// Bucket sizing for `category`.
	pub fn bucket_for(&self, category: &str) -> BucketConfig {
		self.categories
			.get(category)
			.or_else(|| self.categories.get(DEFAULT_CATEGORY))
			.copied()
			.unwrap_or_else(|| BucketConfig::per_second(Self::FALLBACK_RATE))
	}

	/// Rejects buckets that could never admit a request.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let invalid = |name: &'static str, label: &str, config: &BucketConfig| {
			ConfigError::InvalidSetting {
				name,
				value: format!(
					"{label}: capacity={}, refill_rate={}",
					config.capacity, config.refill_rate
				),
				reason: "Buckets need a positive capacity and a positive finite refill rate.".into(),
			}
		};

		if !self.global.is_valid() {
			return Err(invalid("rate_limit.global", "global", &self.global));
		}

		for (category, config) in &self.categories {
			if !config.is_valid() {
				return Err(invalid("rate_limit.categories", category, config));
			}
		}

		Ok(())
	}

	/// Maximum admission wait.
	pub fn max_wait(&self) -> StdDuration {
		StdDuration::from_millis(self.max_wait_ms)
	}

	/// Backoff after the `consecutive`-th throttle in a row: base doubled per repeat, capped.
	pub fn backoff_for(&self, consecutive: u32) -> StdDuration {
		let factor = 1_u64.checked_shl(consecutive.saturating_sub(1)).unwrap_or(u64::MAX);

		StdDuration::from_millis(self.backoff_base_ms.saturating_mul(factor).min(self.backoff_max_ms))
	}
}
impl Default for RateLimitSettings {
	fn default() -> Self {
		Self {
			enabled: true,
			global: BucketConfig::per_second(30),
			categories: BTreeMap::from_iter([
				("auth".to_owned(), BucketConfig::per_second(5)),
				("device".to_owned(), BucketConfig::per_second(15)),
				("policy".to_owned(), BucketConfig::per_second(8)),
				(DEFAULT_CATEGORY.to_owned(), BucketConfig::per_second(Self::FALLBACK_RATE)),
			]),
			max_wait_ms: 30_000,
			backoff_base_ms: 500,
			backoff_max_ms: 10_000,
			max_throttle_retries: 3,
		}
	}
}

/// Partial update applied by [`RateGovernor::configure`](crate::rate_limit::RateGovernor::configure).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitUpdate {
	/// New enabled flag.
	pub enabled: Option<bool>,
	/// New global requests per second.
	pub global_rate_limit: Option<u32>,
	/// New requests per second for the named categories.
	pub category_rate_limits: Option<BTreeMap<String, u32>>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn unknown_categories_inherit_the_default_bucket() {
		let settings = RateLimitSettings::default();

		assert_eq!(settings.bucket_for("device").capacity, 15);
		assert_eq!(settings.bucket_for("bulk").capacity, 10);

		let bare = RateLimitSettings { categories: BTreeMap::new(), ..Default::default() };

		assert_eq!(bare.bucket_for("bulk"), BucketConfig::per_second(RateLimitSettings::FALLBACK_RATE));
	}

	#[test]
	fn backoff_doubles_and_caps() {
		let settings = RateLimitSettings::default();

		assert_eq!(settings.backoff_for(1), StdDuration::from_millis(500));
		assert_eq!(settings.backoff_for(2), StdDuration::from_secs(1));
		assert_eq!(settings.backoff_for(4), StdDuration::from_secs(4));
		assert_eq!(settings.backoff_for(6), StdDuration::from_secs(10));
		assert_eq!(settings.backoff_for(200), StdDuration::from_secs(10));
	}

	#[test]
	fn partial_sections_deserialize_over_defaults() {
		let settings: RateLimitSettings =
			serde_json::from_str(r#"{ "enabled": false, "max_wait_ms": 100 }"#)
				.expect("Partial settings should deserialize.");

		assert!(!settings.enabled);
		assert_eq!(settings.max_wait_ms, 100);
		assert_eq!(settings.global, BucketConfig::per_second(30));
	}

	#[test]
	fn validation_rejects_buckets_that_never_admit() {
		assert!(RateLimitSettings::default().validate().is_ok());

		let empty_global: RateLimitSettings =
			serde_json::from_str(r#"{ "global": { "capacity": 0, "refill_rate": 0.0 } }"#)
				.expect("Zero bucket should still deserialize.");

		assert!(matches!(
			empty_global.validate(),
			Err(ConfigError::InvalidSetting { name: "rate_limit.global", .. })
		));

		let mut negative = RateLimitSettings::default();

		negative
			.categories
			.insert("device".into(), BucketConfig { capacity: 5, refill_rate: -1. });

		assert!(matches!(
			negative.validate(),
			Err(ConfigError::InvalidSetting { name: "rate_limit.categories", ref value, .. })
				if value.starts_with("device:")
		));
	}
}
