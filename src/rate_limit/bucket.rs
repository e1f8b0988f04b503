//! Continuous-refill token bucket.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::time::Instant;
// self
use crate::_prelude::*;

const TOKEN_EPSILON: f64 = 1e-9;

/// Bucket sizing: a burst `capacity` refilled at `refill_rate` tokens per second.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
	/// Maximum tokens held at once.
	pub capacity: u32,
	/// Tokens added per second.
	pub refill_rate: f64,
}
impl BucketConfig {
	/// Bucket admitting `rate` requests per second with a burst of the same size.
	pub fn per_second(rate: u32) -> Self {
		Self { capacity: rate, refill_rate: f64::from(rate) }
	}

	/// Whether the bucket can ever admit a request.
	pub fn is_valid(&self) -> bool {
		self.capacity > 0 && self.refill_rate.is_finite() && self.refill_rate > 0.
	}
}

/// Point-in-time view of a bucket.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BucketSnapshot {
	/// Maximum tokens held at once.
	pub capacity: u32,
	/// Tokens added per second.
	pub refill_rate: f64,
	/// Tokens currently available.
	pub tokens: f64,
}

/// Token bucket whose refill is computed lazily from elapsed time.
#[derive(Clone, Debug)]
pub struct TokenBucket {
	config: BucketConfig,
	tokens: f64,
	last_refill: Instant,
}
impl TokenBucket {
	/// Creates a full bucket.
	pub fn new(config: BucketConfig, now: Instant) -> Self {
		Self { config, tokens: f64::from(config.capacity), last_refill: now }
	}

	/// Adds the tokens accrued since the previous refill, capped at capacity.
	pub fn refill(&mut self, now: Instant) {
		let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();

		self.tokens =
			(self.tokens + elapsed * self.config.refill_rate).min(f64::from(self.config.capacity));
		self.last_refill = now;
	}

	/// Whether at least one whole token is available.
	pub fn has_token(&self) -> bool {
		self.tokens + TOKEN_EPSILON >= 1.
	}

	/// Consumes one token if available.
	pub fn take(&mut self) -> bool {
		if !self.has_token() {
			return false;
		}

		self.tokens = (self.tokens - 1.).max(0.);

		true
	}

	/// Empties the bucket.
	pub fn drain(&mut self) {
		self.tokens = 0.;
	}

	/// Time until one whole token is available; zero if one already is.
	pub fn wait_for_token(&self) -> StdDuration {
		if self.has_token() {
			return StdDuration::ZERO;
		}

		StdDuration::try_from_secs_f64((1. - self.tokens) / self.config.refill_rate)
			.unwrap_or(StdDuration::MAX)
	}

	/// Applies new sizing, keeping accrued tokens up to the new capacity.
	pub fn reconfigure(&mut self, config: BucketConfig, now: Instant) {
		self.refill(now);
		self.config = config;
		self.tokens = self.tokens.min(f64::from(config.capacity));
	}

	/// Current sizing.
	pub fn config(&self) -> BucketConfig {
		self.config
	}

	/// Point-in-time view.
	pub fn snapshot(&self) -> BucketSnapshot {
		BucketSnapshot {
			capacity: self.config.capacity,
			refill_rate: self.config.refill_rate,
			tokens: self.tokens,
		}
	}
}
