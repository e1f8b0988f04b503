//! Dispatch results and partial-result annotations.

// self
use crate::{_prelude::*, error::ErrorReport};

/// Why aggregation stopped before the last page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartialReason {
	/// A page after the first failed.
	PageFailed {
		/// Page that failed.
		page: u32,
		/// Failure summary.
		error: ErrorReport,
	},
	/// The page-count safety bound was reached.
	PageLimit {
		/// Configured bound.
		max_pages: u32,
	},
}

/// Annotation marking an aggregate that stopped early.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialResult {
	/// Pages whose items are included.
	pub pages_fetched: u32,
	/// Page count implied by the reported total, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub total_pages: Option<u32>,
	/// Why aggregation stopped.
	pub reason: PartialReason,
}

/// Result of one dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct GatewayResponse {
	/// Remote payload; for aggregates, the first page's envelope holding every page's items.
	pub payload: Value,
	/// Set when pagination stopped before completion.
	pub partial: Option<PartialResult>,
	/// Whether the payload was served from the cache without remote calls.
	pub from_cache: bool,
}
impl GatewayResponse {
	/// Key under which [`into_json`](Self::into_json) attaches the partial-result annotation.
	pub const PARTIAL_KEY: &'static str = "partial_result";

	/// Complete result.
	pub fn complete(payload: Value, from_cache: bool) -> Self {
		Self { payload, partial: None, from_cache }
	}

	/// Whether pagination stopped early.
	pub fn is_partial(&self) -> bool {
		self.partial.is_some()
	}

	/// Payload with the partial-result annotation attached under
	/// [`PARTIAL_KEY`](Self::PARTIAL_KEY). Non-object payloads are wrapped as `{ "data": .. }`
	/// first.
	pub fn into_json(self) -> Value {
		let Some(partial) = self.partial else {
			return self.payload;
		};
		let annotation = serde_json::to_value(&partial).unwrap_or(Value::Bool(true));

		match self.payload {
			Value::Object(mut object) => {
				object.insert(Self::PARTIAL_KEY.into(), annotation);

				Value::Object(object)
			},
			other => {
				let mut object = serde_json::Map::new();

				object.insert("data".into(), other);
				object.insert(Self::PARTIAL_KEY.into(), annotation);

				Value::Object(object)
			},
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::ErrorKind;

	#[test]
	fn complete_results_serialize_untouched() {
		let payload = serde_json::json!({ "SearchResult": { "resources": [] } });

		assert_eq!(GatewayResponse::complete(payload.clone(), false).into_json(), payload);
	}

	#[test]
	fn partial_results_are_annotated() {
		let response = GatewayResponse {
			payload: serde_json::json!({ "SearchResult": { "resources": [1, 2] } }),
			partial: Some(PartialResult {
				pages_fetched: 1,
				total_pages: Some(3),
				reason: PartialReason::PageFailed {
					page: 2,
					error: ErrorReport {
						kind: ErrorKind::Remote,
						message: "Remote resource returned HTTP 500: boom".into(),
						status: Some(500),
						retryable: true,
					},
				},
			}),
			from_cache: false,
		};

		assert!(response.is_partial());

		let json = response.into_json();

		assert_eq!(json["partial_result"]["pages_fetched"], 1);
		assert_eq!(json["partial_result"]["reason"]["kind"], "page_failed");
		assert_eq!(json["partial_result"]["reason"]["error"]["kind"], "remote");
		assert_eq!(json["SearchResult"]["resources"], serde_json::json!([1, 2]));
	}

	#[test]
	fn non_object_payloads_are_wrapped() {
		let json = GatewayResponse {
			payload: serde_json::json!([1]),
			partial: Some(PartialResult {
				pages_fetched: 1000,
				total_pages: None,
				reason: PartialReason::PageLimit { max_pages: 1000 },
			}),
			from_cache: false,
		}
		.into_json();

		assert_eq!(json["data"], serde_json::json!([1]));
		assert_eq!(json["partial_result"]["reason"]["max_pages"], 1000);
	}
}
