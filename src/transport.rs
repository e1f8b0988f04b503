//! Transport primitives for read-only REST calls.
//!
//! [`RestTransport`] is the gateway's only dependency on an HTTP stack: it performs one GET
//! against an operation path and reports the raw status, body, and retry hint. Classifying the
//! status, retrying, caching, and pacing all happen above it, so tests can substitute scripted
//! transports without touching the network.

// std
use std::time::Duration as StdDuration;
// crates.io
#[cfg(feature = "reqwest")]
use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};
#[cfg(feature = "reqwest")]
use crate::{
	config::{Credentials, GatewayConfig, TlsMode},
	error::ConfigError,
};

/// Boxed future returned by [`RestTransport::get`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RestResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of issuing authenticated GET requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// concurrent dispatch behind an `Arc`. Non-success statuses are not errors at this layer;
/// only failures to obtain a response are.
pub trait RestTransport
where
	Self: 'static + Send + Sync,
{
	/// Performs a GET for `request` against the configured base address.
	fn get<'a>(&'a self, request: &'a RestRequest) -> TransportFuture<'a>;
}

/// One outbound GET.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestRequest {
	/// Operation path appended to the base address.
	pub path: String,
	/// Query pairs in wire order.
	pub query: Vec<(String, String)>,
}
impl RestRequest {
	/// Creates a request without query parameters.
	pub fn new(path: impl Into<String>) -> Self {
		Self { path: path.into(), query: Vec::new() }
	}

	/// Replaces the query pairs.
	pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
		self.query = query;

		self
	}

	/// First value of the query key `key`.
	pub fn query_value(&self, key: &str) -> Option<&str> {
		self.query.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
	}
}

/// Raw response captured by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestResponse {
	/// HTTP status code.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<StdDuration>,
	/// Response body.
	pub body: Vec<u8>,
}
impl RestResponse {
	/// Status code signalling throttling.
	pub const THROTTLED: u16 = 429;

	/// Creates a response without a retry hint.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, retry_after: None, body: body.into() }
	}

	/// Creates a `200` response carrying `payload` as JSON.
	pub fn json_ok(payload: &Value) -> Self {
		Self::new(200, payload.to_string())
	}

	/// Attaches a retry hint.
	pub fn with_retry_after(mut self, retry_after: StdDuration) -> Self {
		self.retry_after = Some(retry_after);

		self
	}

	/// Whether the status is in the 2xx range.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Whether the remote asked the caller to slow down.
	pub fn is_throttled(&self) -> bool {
		self.status == Self::THROTTLED
	}

	/// Body decoded as lossy UTF-8.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Body parsed as JSON. An empty body decodes as `null`.
	pub fn json(&self) -> Result<Value> {
		if self.body.iter().all(u8::is_ascii_whitespace) {
			return Ok(Value::Null);
		}

		serde_json::from_slice(&self.body).map_err(|source| Error::Decode { source })
	}
}

/// [`RestTransport`] backed by a shared [`ReqwestClient`] using basic auth.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	base_url: Url,
	credentials: Credentials,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing client.
	pub fn with_client(client: ReqwestClient, base_url: Url, credentials: Credentials) -> Self {
		Self { client, base_url, credentials }
	}

	/// Builds a client honoring the configured TLS mode.
	pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
		let mut builder = ReqwestClient::builder();

		match &config.tls {
			TlsMode::Verify => {},
			TlsMode::Skip => {
				tracing::warn!(
					base_url = %config.base_url,
					"TLS certificate verification is disabled for the remote resource."
				);

				builder = builder.danger_accept_invalid_certs(true);
			},
			TlsMode::CaBundle(path) => {
				let pem = std::fs::read(path).map_err(|e| ConfigError::CaBundle {
					path: path.clone(),
					source: Box::new(e),
				})?;
				let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
					ConfigError::CaBundle { path: path.clone(), source: Box::new(e) }
				})?;

				builder = builder.add_root_certificate(certificate);
			},
		}

		let client = builder.build().map_err(ConfigError::http_client_build)?;

		Ok(Self::with_client(client, config.base_url.clone(), config.credentials.clone()))
	}

	/// Base address every path is appended to.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
		let base = self.base_url.as_str().trim_end_matches('/');
		let raw = if path.starts_with('/') {
			format!("{base}{path}")
		} else {
			format!("{base}/{path}")
		};

		Url::parse(&raw).map_err(|source| TransportError::InvalidUrl { url: raw, source })
	}
}
#[cfg(feature = "reqwest")]
impl RestTransport for ReqwestTransport {
	fn get<'a>(&'a self, request: &'a RestRequest) -> TransportFuture<'a> {
		Box::pin(async move {
			let url = self.endpoint(&request.path)?;
			let response = self
				.client
				.get(url)
				.basic_auth(&self.credentials.username, Some(self.credentials.password.expose()))
				.header(ACCEPT, "application/json")
				.query(&request.query)
				.send()
				.await?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.bytes().await?.to_vec();

			Ok(RestResponse { status, retry_after, body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<StdDuration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(StdDuration::from_secs(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return StdDuration::try_from(delta).ok();
		}
	}

	None
}
