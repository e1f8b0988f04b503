//! Rate governor: token-bucket admission control for outbound requests.
//!
//! Every request must be admitted by the global bucket and by its category bucket; the longer
//! of the two waits dominates. Throttling reported by the remote resource drains the category
//! bucket and blocks it for an exponential backoff. Bucket state lives behind one lock per
//! bucket, so categories never contend with each other except on the shared global bucket.

pub mod bucket;
pub mod settings;

pub use bucket::*;
pub use settings::*;

// std
use std::{
	sync::atomic::{AtomicBool, Ordering},
	time::Duration as StdDuration,
};
// crates.io
use tokio::time::Instant;
// self
use crate::{_prelude::*, error::ConfigError};

const MIN_WAIT: StdDuration = StdDuration::from_millis(1);

/// Per-category bucket plus throttle bookkeeping.
#[derive(Debug)]
struct CategoryState {
	bucket: TokenBucket,
	consecutive_throttles: u32,
	blocked_until: Option<Instant>,
}
impl CategoryState {
	fn new(config: BucketConfig, now: Instant) -> Self {
		Self { bucket: TokenBucket::new(config, now), consecutive_throttles: 0, blocked_until: None }
	}

	fn backoff_remaining(&self, now: Instant) -> StdDuration {
		self.blocked_until.map(|until| until.saturating_duration_since(now)).unwrap_or_default()
	}
}

/// Live view of one category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryInfo {
	/// Bucket state.
	pub bucket: BucketSnapshot,
	/// Throttle responses seen in a row.
	pub consecutive_throttles: u32,
	/// Remaining backoff in milliseconds.
	pub backoff_remaining_ms: u64,
}

/// Snapshot returned by [`RateGovernor::info`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateLimitInfo {
	/// Whether admission control is active.
	pub enabled: bool,
	/// Global bucket state.
	pub global: BucketSnapshot,
	/// Configured and live categories.
	pub categories: BTreeMap<String, CategoryInfo>,
	/// Maximum admission wait in milliseconds.
	pub max_wait_ms: u64,
	/// First throttle backoff in milliseconds.
	pub backoff_base_ms: u64,
	/// Backoff ceiling in milliseconds.
	pub backoff_max_ms: u64,
}

/// Shared admission controller.
#[derive(Debug)]
pub struct RateGovernor {
	enabled: AtomicBool,
	settings: RwLock<RateLimitSettings>,
	global: Mutex<TokenBucket>,
	categories: RwLock<HashMap<String, Arc<Mutex<CategoryState>>>>,
}
impl RateGovernor {
	/// Creates a governor with full buckets.
	pub fn new(settings: RateLimitSettings) -> Self {
		let now = Instant::now();

		Self {
			enabled: AtomicBool::new(settings.enabled),
			global: Mutex::new(TokenBucket::new(settings.global, now)),
			settings: RwLock::new(settings),
			categories: RwLock::new(HashMap::new()),
		}
	}

	/// Whether admission control is active.
	pub fn is_enabled(&self) -> bool {
		self.enabled.load(Ordering::Acquire)
	}

	/// Current policy.
	pub fn settings(&self) -> RateLimitSettings {
		self.settings.read().clone()
	}

	/// Waits until both the global and the `category` bucket admit one request, then consumes a
	/// token from each. Returns how long the caller waited.
	///
	/// Fails with [`Error::RateLimitExceeded`] when admission would take longer than the
	/// configured maximum wait. Dropping the future abandons the wait without consuming tokens.
	pub async fn acquire(&self, category: &str) -> Result<StdDuration> {
		if !self.is_enabled() {
			return Ok(StdDuration::ZERO);
		}

		let state = self.category_state(category);
		let max_wait = self.settings.read().max_wait();
		let started = Instant::now();

		loop {
			let wait = {
				let now = Instant::now();
				let mut global = self.global.lock();
				let mut state = state.lock();

				global.refill(now);
				state.bucket.refill(now);

				let backoff = state.backoff_remaining(now);

				if backoff.is_zero() && global.has_token() && state.bucket.has_token() {
					global.take();
					state.bucket.take();
					state.blocked_until = None;

					return Ok(now.saturating_duration_since(started));
				}

				backoff.max(global.wait_for_token()).max(state.bucket.wait_for_token()).max(MIN_WAIT)
			};
			let waited = Instant::now().saturating_duration_since(started);

			if waited.saturating_add(wait) > max_wait {
				tracing::warn!(
					category,
					waited_ms = waited.as_millis() as u64,
					needed_ms = wait.as_millis() as u64,
					"Rate limit budget unavailable within the maximum wait."
				);

				return Err(Error::RateLimitExceeded { category: category.to_owned(), waited });
			}

			tracing::debug!(category, wait_ms = wait.as_millis() as u64, "Waiting for rate limit budget.");
			tokio::time::sleep(wait).await;
		}
	}

	/// Records a throttle response for `category`: drains its bucket and blocks it for the
	/// exponential backoff, or for `retry_after` when the remote asked for longer. Returns the
	/// imposed delay.
	pub fn report_throttled(&self, category: &str, retry_after: Option<StdDuration>) -> StdDuration {
		let settings = self.settings.read().clone();
		let state = self.category_state(category);
		let now = Instant::now();
		let mut state = state.lock();

		state.consecutive_throttles = state.consecutive_throttles.saturating_add(1);
		state.bucket.refill(now);
		state.bucket.drain();

		let delay = settings
			.backoff_for(state.consecutive_throttles)
			.max(retry_after.unwrap_or_default());

		state.blocked_until = Some(now + delay);

		tracing::warn!(
			category,
			consecutive = state.consecutive_throttles,
			delay_ms = delay.as_millis() as u64,
			"Remote resource throttled the request; backing off."
		);

		delay
	}

	/// Clears the consecutive throttle count for `category` after a successful response.
	pub fn report_success(&self, category: &str) {
		if let Some(state) = self.categories.read().get(category) {
			state.lock().consecutive_throttles = 0;
		}
	}

	/// Live bucket and backoff state.
	pub fn info(&self) -> RateLimitInfo {
		let settings = self.settings();
		let now = Instant::now();
		let global = {
			let mut global = self.global.lock();

			global.refill(now);
			global.snapshot()
		};
		let mut categories = settings
			.categories
			.iter()
			.map(|(name, config)| {
				(
					name.clone(),
					CategoryInfo {
						bucket: TokenBucket::new(*config, now).snapshot(),
						consecutive_throttles: 0,
						backoff_remaining_ms: 0,
					},
				)
			})
			.collect::<BTreeMap<_, _>>();

		for (name, state) in self.categories.read().iter() {
			let mut state = state.lock();

			state.bucket.refill(now);
			categories.insert(
				name.clone(),
				CategoryInfo {
					bucket: state.bucket.snapshot(),
					consecutive_throttles: state.consecutive_throttles,
					backoff_remaining_ms: state.backoff_remaining(now).as_millis() as u64,
				},
			);
		}

		RateLimitInfo {
			enabled: self.is_enabled(),
			global,
			categories,
			max_wait_ms: settings.max_wait_ms,
			backoff_base_ms: settings.backoff_base_ms,
			backoff_max_ms: settings.backoff_max_ms,
		}
	}

	/// Applies a partial policy update, resizing live buckets in place.
	pub fn configure(&self, update: RateLimitUpdate) -> Result<RateLimitInfo, ConfigError> {
		if update.global_rate_limit == Some(0) {
			return Err(ConfigError::InvalidSetting {
				name: "global_rate_limit",
				value: "0".into(),
				reason: "must be greater than zero".into(),
			});
		}
		if let Some((category, rate)) =
			update.category_rate_limits.iter().flatten().find(|(_, rate)| **rate == 0)
		{
			return Err(ConfigError::InvalidSetting {
				name: "category_rate_limits",
				value: format!("{category}={rate}"),
				reason: "must be greater than zero".into(),
			});
		}

		let now = Instant::now();
		let settings = {
			let mut settings = self.settings.write();

			if let Some(enabled) = update.enabled {
				settings.enabled = enabled;
				self.enabled.store(enabled, Ordering::Release);
			}
			if let Some(rate) = update.global_rate_limit {
				settings.global = BucketConfig::per_second(rate);
				self.global.lock().reconfigure(settings.global, now);
			}
			if let Some(rates) = update.category_rate_limits {
				for (category, rate) in rates {
					settings.categories.insert(category, BucketConfig::per_second(rate));
				}
			}

			settings.clone()
		};

		for (name, state) in self.categories.read().iter() {
			state.lock().bucket.reconfigure(settings.bucket_for(name), now);
		}

		tracing::info!(
			enabled = settings.enabled,
			global = settings.global.capacity,
			"Rate limits reconfigured."
		);

		Ok(self.info())
	}

	fn category_state(&self, category: &str) -> Arc<Mutex<CategoryState>> {
		if let Some(state) = self.categories.read().get(category) {
			return state.clone();
		}

		let config = self.settings.read().bucket_for(category);

		self.categories
			.write()
			.entry(category.to_owned())
			.or_insert_with(|| Arc::new(Mutex::new(CategoryState::new(config, Instant::now()))))
			.clone()
	}
}
impl Default for RateGovernor {
	fn default() -> Self {
		Self::new(RateLimitSettings::default())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn governor(category_rate: u32, max_wait_ms: u64) -> RateGovernor {
		RateGovernor::new(RateLimitSettings {
			global: BucketConfig::per_second(1_000),
			categories: BTreeMap::from_iter([("device".to_owned(), BucketConfig::per_second(category_rate))]),
			max_wait_ms,
			..Default::default()
		})
	}

	#[tokio::test(start_paused = true)]
	async fn request_beyond_capacity_blocks_until_refill() {
		let governor = governor(2, 30_000);
		let started = Instant::now();

		governor.acquire("device").await.expect("First token should be granted.");
		governor.acquire("device").await.expect("Second token should be granted.");

		assert_eq!(started.elapsed(), StdDuration::ZERO);

		let waited = governor.acquire("device").await.expect("Third token should arrive after refill.");

		assert!(waited >= StdDuration::from_millis(400), "waited only {waited:?}");
		assert!(started.elapsed() >= StdDuration::from_millis(400));
	}

	#[tokio::test(start_paused = true)]
	async fn concurrent_acquires_admit_exactly_the_burst_capacity() {
		let governor = Arc::new(governor(3, 30_000));
		let tasks = (0..8)
			.map(|_| {
				let governor = governor.clone();

				tokio::spawn(async move { governor.acquire("device").await })
			})
			.collect::<Vec<_>>();
		let mut immediate = 0;

		for task in tasks {
			let waited = task
				.await
				.expect("Acquire task should not panic.")
				.expect("Every acquire should fit in the maximum wait.");

			if waited.is_zero() {
				immediate += 1;
			}
		}

		assert_eq!(immediate, 3);
		assert!(governor.info().categories["device"].bucket.tokens < 1.);
	}

	#[tokio::test(start_paused = true)]
	async fn dropped_acquire_consumes_no_token() {
		let governor = governor(1, 30_000);

		governor.acquire("device").await.expect("First token should be granted.");

		let abandoned =
			tokio::time::timeout(StdDuration::from_millis(100), governor.acquire("device")).await;

		assert!(abandoned.is_err(), "Waiter should still be pending when dropped.");

		tokio::time::advance(StdDuration::from_secs(1)).await;

		let info = governor.info();

		assert_eq!(info.categories["device"].bucket.tokens, 1.);
		assert_eq!(
			governor.acquire("device").await.expect("Refilled token should be granted."),
			StdDuration::ZERO
		);
	}

	#[tokio::test(start_paused = true)]
	async fn global_bucket_gates_every_category() {
		let governor = RateGovernor::new(RateLimitSettings {
			global: BucketConfig::per_second(1),
			max_wait_ms: 5_000,
			..Default::default()
		});

		governor.acquire("auth").await.expect("Global token should be granted.");

		let waited = governor.acquire("policy").await.expect("Second category should wait on global.");

		assert!(waited >= StdDuration::from_millis(900), "waited only {waited:?}");
	}

	#[tokio::test(start_paused = true)]
	async fn exhausted_budget_fails_after_max_wait() {
		let governor = governor(1, 500);

		governor.acquire("device").await.expect("First token should be granted.");

		let err = governor.acquire("device").await.expect_err("Second token should exceed the wait.");

		assert!(matches!(err, Error::RateLimitExceeded { ref category, .. } if category == "device"));
		assert!(err.is_retryable());
	}

	#[tokio::test(start_paused = true)]
	async fn throttling_drains_and_backs_off_exponentially() {
		let governor = governor(100, 30_000);

		assert_eq!(governor.report_throttled("device", None), StdDuration::from_millis(500));
		assert_eq!(governor.report_throttled("device", None), StdDuration::from_secs(1));

		let info = governor.info();
		let device = &info.categories["device"];

		assert_eq!(device.consecutive_throttles, 2);
		assert_eq!(device.bucket.tokens, 0.);

		let waited = governor.acquire("device").await.expect("Backoff should eventually clear.");

		assert!(waited >= StdDuration::from_millis(900), "waited only {waited:?}");

		governor.report_success("device");

		assert_eq!(governor.report_throttled("device", None), StdDuration::from_millis(500));
		assert_eq!(
			governor.report_throttled("device", Some(StdDuration::from_secs(5))),
			StdDuration::from_secs(5)
		);
	}

	#[tokio::test(start_paused = true)]
	async fn disabled_governor_admits_immediately() {
		let governor = governor(1, 10);

		governor.configure(RateLimitUpdate { enabled: Some(false), ..Default::default() })
			.expect("Disabling should succeed.");

		for _ in 0..10 {
			assert_eq!(
				governor.acquire("device").await.expect("Disabled governor should admit."),
				StdDuration::ZERO
			);
		}
	}

	#[tokio::test(start_paused = true)]
	async fn configure_resizes_live_buckets_and_rejects_zero_rates() {
		let governor = governor(10, 30_000);

		governor.acquire("device").await.expect("Token should be granted.");
		governor.acquire("bulk").await.expect("Token should be granted.");

		let info = governor
			.configure(RateLimitUpdate {
				enabled: None,
				global_rate_limit: Some(50),
				category_rate_limits: Some(BTreeMap::from_iter([("device".to_owned(), 2)])),
			})
			.expect("Valid update should apply.");

		assert_eq!(info.global.capacity, 50);
		assert_eq!(info.categories["device"].bucket.capacity, 2);
		assert!(info.categories["device"].bucket.tokens <= 2.);
		assert_eq!(info.categories["bulk"].bucket.capacity, RateLimitSettings::FALLBACK_RATE);

		let err = governor
			.configure(RateLimitUpdate { global_rate_limit: Some(0), ..Default::default() })
			.expect_err("Zero global rate should be rejected.");

		assert!(matches!(err, ConfigError::InvalidSetting { name: "global_rate_limit", .. }));

		let err = governor
			.configure(RateLimitUpdate {
				category_rate_limits: Some(BTreeMap::from_iter([("auth".to_owned(), 0)])),
				..Default::default()
			})
			.expect_err("Zero category rate should be rejected.");

		assert!(matches!(err, ConfigError::InvalidSetting { name: "category_rate_limits", .. }));
		assert_eq!(governor.info().global.capacity, 50);
	}
}
