//! Gateway-level error types shared across dispatch, paging, transport, and configuration.

// std
use std::{path::PathBuf, time::Duration as StdDuration};
// self
use crate::{_prelude::*, filter::FilterError};

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
///
/// Every failed dispatch resolves to exactly one of these variants; cache storage failures never
/// appear here because the cache absorbs them.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Requested operation name is not in the catalog.
	#[error("Operation `{name}` is not in the catalog.")]
	UnknownOperation {
		/// Name supplied by the caller.
		name: String,
	},
	/// Filter expression does not follow the `field.OPERATOR.value` layout.
	#[error(transparent)]
	InvalidFilter(#[from] FilterError),
	/// Rate budget did not become available within the configured maximum wait.
	#[error("Rate limit budget for `{category}` was not available after waiting {waited:?}.")]
	RateLimitExceeded {
		/// Rate category that ran dry.
		category: String,
		/// Time spent waiting before giving up.
		waited: StdDuration,
	},
	/// Remote resource could not be reached.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Remote resource answered with a non-success status.
	#[error(transparent)]
	Remote(#[from] RemoteError),
	/// Remote resource answered with a body that is not JSON.
	#[error("Remote resource returned a payload that is not valid JSON.")]
	Decode {
		/// Underlying parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns the stable kind tag for this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::UnknownOperation { .. } => ErrorKind::UnknownOperation,
			Self::InvalidFilter(_) => ErrorKind::InvalidFilter,
			Self::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
			Self::Transport(_) => ErrorKind::Transport,
			Self::Remote(_) => ErrorKind::Remote,
			Self::Decode { .. } => ErrorKind::Decode,
			Self::Config(_) => ErrorKind::Config,
		}
	}

	/// Whether the caller may retry the same request later.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::RateLimitExceeded { .. } | Self::Transport(_) => true,
			Self::Remote(remote) => remote.is_retryable(),
			_ => false,
		}
	}

	/// Builds the structured report handed to the invoking protocol layer.
	pub fn report(&self) -> ErrorReport {
		ErrorReport {
			kind: self.kind(),
			message: self.to_string(),
			status: match self {
				Self::Remote(remote) => Some(remote.status),
				_ => None,
			},
			retryable: self.is_retryable(),
		}
	}
}

/// Stable classification tags for [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// See [`Error::UnknownOperation`].
	UnknownOperation,
	/// See [`Error::InvalidFilter`].
	InvalidFilter,
	/// See [`Error::RateLimitExceeded`].
	RateLimitExceeded,
	/// See [`Error::Transport`].
	Transport,
	/// See [`Error::Remote`].
	Remote,
	/// See [`Error::Decode`].
	Decode,
	/// See [`Error::Config`].
	Config,
}
impl ErrorKind {
	/// Returns a stable label suitable for logs and structured output.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::UnknownOperation => "unknown_operation",
			Self::InvalidFilter => "invalid_filter",
			Self::RateLimitExceeded => "rate_limit_exceeded",
			Self::Transport => "transport",
			Self::Remote => "remote",
			Self::Decode => "decode",
			Self::Config => "config",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Serializable error summary (kind tag plus human-readable message).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
	/// Error classification.
	pub kind: ErrorKind,
	/// Human-readable description.
	pub message: String,
	/// HTTP status for remote failures.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<u16>,
	/// Whether retrying may succeed.
	pub retryable: bool,
}

/// Non-success status returned by the remote resource.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Remote resource returned HTTP {status}: {body}")]
pub struct RemoteError {
	/// HTTP status code.
	pub status: u16,
	/// Response body preview.
	pub body: String,
}
impl RemoteError {
	const BODY_PREVIEW_LIMIT: usize = 512;

	/// Creates a remote error, truncating long bodies.
	pub fn new(status: u16, body: impl Into<String>) -> Self {
		Self { status, body: truncate_preview(body.into()) }
	}

	/// Throttling (429) and server-side (5xx) failures are worth retrying; other 4xx are not.
	pub fn is_retryable(&self) -> bool {
		self.status == 429 || (500..=599).contains(&self.status)
	}
}

/// Transport-level failures (network, TLS, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the remote resource.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request did not complete in time, either within the per-page timeout or within a
	/// deadline set on the HTTP client.
	#[error("Remote resource did not respond in time.")]
	Timeout {
		/// Timeout that elapsed, when known.
		after: Option<StdDuration>,
	},
	/// Operation path could not be joined onto the base address.
	#[error("Request URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the remote resource.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout { after: None } } else { Self::network(e) }
	}
}

/// Configuration and catalog failures; the only class that is fatal at startup.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A mandatory setting is absent.
	#[error("Required setting `{name}` is not set.")]
	MissingSetting {
		/// Setting (environment variable) name.
		name: &'static str,
	},
	/// A setting is present but cannot be parsed.
	#[error("Setting `{name}` has an invalid value `{value}`: {reason}.")]
	InvalidSetting {
		/// Setting name.
		name: &'static str,
		/// Raw value supplied.
		value: String,
		/// Why it was rejected.
		reason: String,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Custom trust bundle could not be loaded.
	#[error("CA bundle `{}` could not be loaded.", .path.display())]
	CaBundle {
		/// Bundle location.
		path: PathBuf,
		/// Underlying read or parse failure.
		#[source]
		source: BoxError,
	},
	/// Catalog file could not be read.
	#[error("Catalog `{}` could not be read.", .path.display())]
	CatalogIo {
		/// Catalog location.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Catalog JSON is malformed.
	#[error("Catalog is malformed at `{}`.", .source.path())]
	InvalidCatalog {
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Two catalog entries derive the same operation name.
	#[error("Catalog defines operation `{name}` more than once.")]
	DuplicateOperation {
		/// Conflicting operation name.
		name: String,
	},
	/// Catalog entry carries an unusable operation name.
	#[error("Catalog entry has an invalid operation name.")]
	InvalidOperationName(#[from] crate::catalog::OperationNameError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= RemoteError::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= RemoteError::BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}
		buf.push(ch);
	}

	buf
}
