//! Credential wrapper that redacts sensitive material.

// self
use crate::_prelude::*;

/// Redacted secret keeping passwords out of logs and `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);
impl Secret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for Secret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Secret").field(&"<redacted>").finish()
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Basic-auth credentials for the remote resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	/// Account name.
	pub username: String,
	/// Account password.
	pub password: Secret,
}
impl Credentials {
	/// Creates a credential pair.
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self { username: username.into(), password: Secret::new(password) }
	}
}
