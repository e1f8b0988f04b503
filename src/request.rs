//! Per-call request inputs: query parameters and invocation options.

// self
use crate::_prelude::*;

/// Caller-supplied query parameters.
///
/// Keys are kept sorted so iteration order, and therefore every derived cache key, is
/// independent of insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, Value>);
impl QueryParams {
	/// Empty parameter set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or replaces a parameter, returning the previous value.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
		self.0.insert(key.into(), value.into())
	}

	/// Builder-style [`insert`](Self::insert).
	pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.insert(key, value);

		self
	}

	/// Returns a parameter value.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.get(key)
	}

	/// Removes a parameter.
	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.0.remove(key)
	}

	/// Whether a parameter is present.
	pub fn contains_key(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	/// Reads a parameter as an unsigned integer, accepting numeric strings.
	pub fn get_u64(&self, key: &str) -> Option<u64> {
		match self.0.get(key)? {
			Value::Number(number) => number.as_u64(),
			Value::String(text) => text.trim().parse().ok(),
			_ => None,
		}
	}

	/// Parameters in key order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.0.iter().map(|(key, value)| (key.as_str(), value))
	}

	/// Number of parameters.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether no parameters are set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Flattens into wire pairs. Arrays repeat their key, nulls are dropped, and objects are
	/// sent as JSON text.
	pub fn to_pairs(&self) -> Vec<(String, String)> {
		let mut pairs = Vec::with_capacity(self.0.len());

		for (key, value) in &self.0 {
			match value {
				Value::Null => {},
				Value::Array(values) =>
					for value in values {
						if let Some(text) = scalar_text(value) {
							pairs.push((key.clone(), text));
						}
					},
				value =>
					if let Some(text) = scalar_text(value) {
						pairs.push((key.clone(), text));
					},
			}
		}

		pairs
	}

	/// Deterministic `"key"=json&"key"=json` rendering used for cache identity.
	///
	/// Keys are JSON-quoted like values, so separators inside a key cannot mimic another
	/// parameter set.
	pub fn canonical(&self) -> String {
		let mut buf = String::new();

		for (idx, (key, value)) in self.0.iter().enumerate() {
			if idx > 0 {
				buf.push('&');
			}

			buf.push_str(&Value::from(key.as_str()).to_string());
			buf.push('=');
			buf.push_str(&value.to_string());
		}

		buf
	}
}
impl<K, V> FromIterator<(K, V)> for QueryParams
where
	K: Into<String>,
	V: Into<Value>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
	}
}
impl From<BTreeMap<String, Value>> for QueryParams {
	fn from(value: BTreeMap<String, Value>) -> Self {
		Self(value)
	}
}

/// Options for one [`Gateway::invoke`](crate::gateway::Gateway::invoke) call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvokeOptions {
	/// Optional `field.OPERATOR.value` filter.
	pub filter: Option<String>,
	/// Additional query parameters.
	pub query: QueryParams,
	/// Read from and write to the response cache (default `true`).
	pub use_cache: bool,
	/// Aggregate every page into one result (default `true`). When `false`, exactly one page is
	/// fetched and `query` is sent verbatim.
	pub auto_paginate: bool,
}
impl InvokeOptions {
	/// Query key that toggles [`auto_paginate`](Self::auto_paginate) in [`from_query`](Self::from_query).
	pub const AUTO_PAGINATE_KEY: &'static str = "auto_paginate";
	/// Query key that toggles [`use_cache`](Self::use_cache) in [`from_query`](Self::from_query).
	pub const USE_CACHE_KEY: &'static str = "use_cache";

	/// Default options: cached, auto-paginated, unfiltered.
	pub fn new() -> Self {
		Self::default()
	}

	/// Splits the control keys `auto_paginate` and `use_cache` out of a raw query mapping.
	///
	/// Control values may be booleans or `"true"`/`"false"` strings; unrecognized values leave
	/// the default in place.
	pub fn from_query(mut query: QueryParams) -> Self {
		let mut options = Self::default();

		if let Some(flag) = query.remove(Self::AUTO_PAGINATE_KEY).as_ref().and_then(flag_value) {
			options.auto_paginate = flag;
		}
		if let Some(flag) = query.remove(Self::USE_CACHE_KEY).as_ref().and_then(flag_value) {
			options.use_cache = flag;
		}

		options.query = query;

		options
	}

	/// Sets the filter expression.
	pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
		self.filter = Some(filter.into());

		self
	}

	/// Replaces the query parameters.
	pub fn with_query(mut self, query: QueryParams) -> Self {
		self.query = query;

		self
	}

	/// Adds one query parameter.
	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.query.insert(key, value);

		self
	}

	/// Overrides cache usage for this call.
	pub fn with_use_cache(mut self, use_cache: bool) -> Self {
		self.use_cache = use_cache;

		self
	}

	/// Overrides auto-pagination for this call.
	pub fn with_auto_paginate(mut self, auto_paginate: bool) -> Self {
		self.auto_paginate = auto_paginate;

		self
	}
}
impl Default for InvokeOptions {
	fn default() -> Self {
		Self { filter: None, query: QueryParams::default(), use_cache: true, auto_paginate: true }
	}
}

fn scalar_text(value: &Value) -> Option<String> {
	match value {
		Value::Null => None,
		Value::String(text) => Some(text.clone()),
		Value::Bool(flag) => Some(flag.to_string()),
		Value::Number(number) => Some(number.to_string()),
		other => Some(other.to_string()),
	}
}

fn flag_value(value: &Value) -> Option<bool> {
	match value {
		Value::Bool(flag) => Some(*flag),
		Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
			"true" => Some(true),
			"false" => Some(false),
			_ => None,
		},
		_ => None,
	}
}
