//! Validated operation names exposed to callers.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const OPERATION_NAME_MAX_LEN: usize = 128;

/// Error returned when operation name validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum OperationNameError {
	/// The name was empty.
	#[error("Operation name cannot be empty.")]
	Empty,
	/// The name contains whitespace characters.
	#[error("Operation name `{name}` contains whitespace.")]
	ContainsWhitespace {
		/// Offending name.
		name: String,
	},
	/// The name exceeded the allowed character count.
	#[error("Operation name exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Unique, lowercase operation identifier derived from a catalog display name.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OperationName(String);
impl OperationName {
	/// Creates a name after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, OperationNameError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}

	/// Derives the caller-facing name from a display name: spaces become underscores and the
	/// result is lowercased (`"Identity Groups"` → `identity_groups`).
	pub fn from_display_name(display: &str) -> Result<Self, OperationNameError> {
		Self::new(display.replace(' ', "_").to_lowercase())
	}

	/// Borrowed view of the name.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Deref for OperationName {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for OperationName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for OperationName {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<OperationName> for String {
	fn from(value: OperationName) -> Self {
		value.0
	}
}
impl TryFrom<String> for OperationName {
	type Error = OperationNameError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl Debug for OperationName {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Operation({})", self.0)
	}
}
impl Display for OperationName {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for OperationName {
	type Err = OperationNameError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

fn validate_view(view: &str) -> Result<(), OperationNameError> {
	if view.is_empty() {
		return Err(OperationNameError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(OperationNameError::ContainsWhitespace { name: view.to_owned() });
	}
	if view.len() > OPERATION_NAME_MAX_LEN {
		return Err(OperationNameError::TooLong { max: OPERATION_NAME_MAX_LEN });
	}

	Ok(())
}
