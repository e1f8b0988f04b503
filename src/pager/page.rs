//! Page envelopes and per-page results.

// self
use crate::_prelude::*;

/// Where pagination metadata lives in a response payload.
///
/// The defaults match the `{ "SearchResult": { "total", "resources", "nextPage" } }` envelope.
/// Payloads without the envelope are treated as single, unpaged responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageShape {
	/// Top-level object holding the metadata and items.
	pub envelope: String,
	/// Array of items inside the envelope.
	pub items: String,
	/// Total item count inside the envelope.
	pub total: String,
	/// Link to the next page inside the envelope.
	pub next: String,
}
impl PageShape {
	fn envelope<'a>(&self, payload: &'a Value) -> Option<&'a serde_json::Map<String, Value>> {
		payload.get(&self.envelope)?.as_object()
	}

	/// Whether `payload` carries the paging envelope with an item array.
	pub fn is_paged(&self, payload: &Value) -> bool {
		self.items(payload).is_some()
	}

	/// Items on this page.
	pub fn items<'a>(&self, payload: &'a Value) -> Option<&'a Vec<Value>> {
		self.envelope(payload)?.get(&self.items)?.as_array()
	}

	/// Total item count across every page, if reported.
	pub fn total(&self, payload: &Value) -> Option<u64> {
		self.envelope(payload)?.get(&self.total)?.as_u64()
	}

	/// Whether the payload links to a further page.
	pub fn has_next_link(&self, payload: &Value) -> bool {
		self.envelope(payload).and_then(|envelope| envelope.get(&self.next)).is_some_and(|next| !next.is_null())
	}

	/// Number of pages implied by the reported total at `page_size` items per page.
	pub fn total_pages(&self, payload: &Value, page_size: u64) -> Option<u32> {
		if page_size == 0 {
			return None;
		}

		let total = self.total(payload)?;

		Some(u32::try_from(total.div_ceil(page_size)).unwrap_or(u32::MAX))
	}

	/// Whether another page follows page `number`.
	///
	/// A reported total is authoritative; without one the next-page link decides. An empty page
	/// always ends pagination.
	pub fn has_more(&self, payload: &Value, number: u32, total_pages: Option<u32>) -> bool {
		match self.items(payload) {
			None => false,
			Some(items) if items.is_empty() => false,
			Some(_) => match total_pages {
				Some(total_pages) => number < total_pages,
				None => self.has_next_link(payload),
			},
		}
	}

	/// Removes and returns the item array.
	pub fn take_items(&self, payload: &mut Value) -> Option<Vec<Value>> {
		match payload.get_mut(&self.envelope)?.get_mut(&self.items)? {
			Value::Array(items) => Some(std::mem::take(items)),
			_ => None,
		}
	}

	/// Replaces the item array and drops the next-page link, leaving the rest of the envelope.
	pub fn replace_items(&self, payload: &mut Value, items: Vec<Value>) {
		if let Some(envelope) = payload.get_mut(&self.envelope).and_then(Value::as_object_mut) {
			envelope.insert(self.items.clone(), Value::Array(items));
			envelope.remove(&self.next);
		}
	}
}
impl Default for PageShape {
	fn default() -> Self {
		Self {
			envelope: "SearchResult".into(),
			items: "resources".into(),
			total: "total".into(),
			next: "nextPage".into(),
		}
	}
}

/// One fetched page.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
	/// 1-based page number.
	pub number: u32,
	/// Page count implied by the reported total, if any.
	pub total_pages: Option<u32>,
	/// Whether another page follows.
	pub has_more: bool,
	/// Raw page payload.
	pub payload: Value,
	/// Whether the page was served from the cache.
	pub from_cache: bool,
	/// When the cached copy stops being served; `None` for pages fetched just now.
	pub cache_expires_at: Option<OffsetDateTime>,
}
impl Page {
	/// Items on this page under `shape`, or an empty slice for unpaged payloads.
	pub fn items<'a>(&'a self, shape: &PageShape) -> &'a [Value] {
		shape.items(&self.payload).map(Vec::as_slice).unwrap_or_default()
	}
}
