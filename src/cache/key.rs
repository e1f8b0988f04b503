//! Canonical request identity used as the cache key.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, filter::FilterExpression, request::QueryParams};

/// What part of a paginated request a key addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyScope {
	/// The aggregate of every page (cursor-less).
	Aggregate,
	/// One page of an auto-paginated request.
	Page(u32),
	/// A single raw page fetched with caller parameters passed verbatim.
	Single,
}
impl Display for KeyScope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Aggregate => f.write_str("all"),
			Self::Page(page) => write!(f, "page={page}"),
			Self::Single => f.write_str("raw"),
		}
	}
}

/// Deterministic, order-independent request identity.
///
/// Rendered as `operation|filter|params|scope`, where `filter` is the JSON-quoted expression (empty
/// when absent) and `params` is the canonical [`QueryParams`] rendering. Every key of an operation shares the
/// [`operation_prefix`](Self::operation_prefix), which is what targeted invalidation matches.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);
impl CacheKey {
	/// Separator between key segments.
	pub const SEPARATOR: char = '|';

	/// Builds the key for `operation` with an optional filter, the identifying parameters, and a
	/// scope. Cursor parameters must be removed from `params` before calling; the scope carries
	/// the cursor instead.
	pub fn new(
		operation: &str,
		filter: Option<&FilterExpression>,
		params: &QueryParams,
		scope: KeyScope,
	) -> Self {
		let filter =
			filter.map(|filter| Value::from(filter.to_string()).to_string()).unwrap_or_default();

		Self(format!(
			"{operation}{sep}{filter}{sep}{params}{sep}{scope}",
			sep = Self::SEPARATOR,
			params = params.canonical(),
		))
	}

	/// Prefix shared by every key of `operation`.
	pub fn operation_prefix(operation: &str) -> String {
		format!("{operation}{}", Self::SEPARATOR)
	}

	/// Borrowed rendering.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Whether the key starts with `prefix`.
	pub fn has_prefix(&self, prefix: &str) -> bool {
		self.0.starts_with(prefix)
	}

	/// Short, log-safe digest of the key: base64 (no padding) of its SHA-256.
	pub fn fingerprint(&self) -> String {
		let mut hasher = Sha256::new();

		hasher.update(self.0.as_bytes());

		STANDARD_NO_PAD.encode(hasher.finalize())
	}
}
impl Debug for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "CacheKey({})", self.0)
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl From<CacheKey> for String {
	fn from(value: CacheKey) -> Self {
		value.0
	}
}
impl AsRef<str> for CacheKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn filter() -> FilterExpression {
		"name.CONTAINS.foo".parse().expect("Filter fixture should parse.")
	}

	#[test]
	fn parameter_order_does_not_change_the_key() {
		let a = QueryParams::new().with("size", 20).with("sortasc", "name");
		let b = QueryParams::new().with("sortasc", "name").with("size", 20);
		let filter = filter();

		assert_eq!(
			CacheKey::new("endpoints", Some(&filter), &a, KeyScope::Aggregate),
			CacheKey::new("endpoints", Some(&filter), &b, KeyScope::Aggregate)
		);
	}

	#[test]
	fn scope_filter_and_operation_separate_keys() {
		let params = QueryParams::new();
		let filter = filter();
		let base = CacheKey::new("endpoints", Some(&filter), &params, KeyScope::Aggregate);

		assert_ne!(base, CacheKey::new("endpoints", Some(&filter), &params, KeyScope::Page(1)));
		assert_ne!(base, CacheKey::new("endpoints", Some(&filter), &params, KeyScope::Single));
		assert_ne!(base, CacheKey::new("endpoints", None, &params, KeyScope::Aggregate));
		assert_ne!(base, CacheKey::new("network_devices", Some(&filter), &params, KeyScope::Aggregate));
		assert_ne!(
			CacheKey::new("endpoints", None, &params, KeyScope::Page(1)),
			CacheKey::new("endpoints", None, &params, KeyScope::Page(2))
		);
	}

	#[test]
	fn separators_inside_params_or_filters_do_not_collide() {
		let split = QueryParams::new().with("a", 1).with("b", 2);
		let merged = QueryParams::new().with("a=1&b", 2);

		assert_ne!(
			CacheKey::new("endpoints", None, &split, KeyScope::Single),
			CacheKey::new("endpoints", None, &merged, KeyScope::Single)
		);

		let piped: FilterExpression = "name.EQ.x|\"size\"=1".parse().expect("Filter should parse.");
		let sized = QueryParams::new().with("size", 1);
		let plain: FilterExpression = "name.EQ.x".parse().expect("Filter should parse.");

		assert_ne!(
			CacheKey::new("endpoints", Some(&piped), &QueryParams::new(), KeyScope::Single),
			CacheKey::new("endpoints", Some(&plain), &sized, KeyScope::Single)
		);
	}

	#[test]
	fn operation_prefix_matches_only_that_operation() {
		let params = QueryParams::new();
		let key = CacheKey::new("endpoints", None, &params, KeyScope::Page(3));
		let other = CacheKey::new("endpoints_groups", None, &params, KeyScope::Page(3));
		let prefix = CacheKey::operation_prefix("endpoints");

		assert!(key.has_prefix(&prefix));
		assert!(!other.has_prefix(&prefix));
		assert_eq!(key.as_str(), "endpoints|||page=3");
	}

	#[test]
	fn fingerprint_is_stable_and_unpadded() {
		let key = CacheKey::new("endpoints", None, &QueryParams::new(), KeyScope::Aggregate);

		assert_eq!(key.fingerprint(), key.clone().fingerprint());
		assert_eq!(key.fingerprint().len(), 43);
		assert!(!key.fingerprint().ends_with('='));
	}
}
