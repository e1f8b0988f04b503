//! Filter expressions in the `field.OPERATOR.value` form understood by the remote API.
//!
//! Only the two-dot layout is validated. Whether `field` is one of an operation's
//! filterable fields is left to the remote side, and vendor operators that are not
//! listed in [`FilterOperator`] pass through untouched.

// self
use crate::_prelude::*;

/// Errors emitted when parsing a filter expression.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum FilterError {
	/// The expression lacks one of the two `.` separators.
	#[error("Filter `{expression}` must look like `field.OPERATOR.value`.")]
	MissingSeparator {
		/// Raw expression supplied by the caller.
		expression: String,
	},
	/// The field segment is empty.
	#[error("Filter `{expression}` has an empty field name.")]
	EmptyField {
		/// Raw expression supplied by the caller.
		expression: String,
	},
	/// The operator segment is empty.
	#[error("Filter `{expression}` has an empty operator.")]
	EmptyOperator {
		/// Raw expression supplied by the caller.
		expression: String,
	},
}

/// Well-known comparison operators.
///
/// Each operator accepts its long spelling (`EQUALS`) and the vendor's short spelling (`EQ`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterOperator {
	/// Exact match.
	Equals,
	/// Negated exact match.
	NotEquals,
	/// Strictly greater than.
	GreaterThan,
	/// Strictly less than.
	LessThan,
	/// Substring match.
	Contains,
	/// Negated substring match.
	NotContains,
	/// Prefix match.
	StartsWith,
	/// Negated prefix match.
	NotStartsWith,
	/// Suffix match.
	EndsWith,
	/// Negated suffix match.
	NotEndsWith,
}
impl FilterOperator {
	/// Resolves an operator token, accepting long and vendor spellings.
	pub fn from_token(token: &str) -> Option<Self> {
		let op = match token {
			"EQUALS" | "EQ" => Self::Equals,
			"NOTEQUALS" | "NEQ" => Self::NotEquals,
			"GREATERTHAN" | "GT" => Self::GreaterThan,
			"LESSTHAN" | "LT" => Self::LessThan,
			"CONTAINS" => Self::Contains,
			"NOTCONTAINS" | "NCONTAINS" => Self::NotContains,
			"STARTSWITH" | "STARTSW" => Self::StartsWith,
			"NOTSTARTSWITH" | "NSTARTSW" => Self::NotStartsWith,
			"ENDSWITH" | "ENDSW" => Self::EndsWith,
			"NOTENDSWITH" | "NENDSW" => Self::NotEndsWith,
			_ => return None,
		};

		Some(op)
	}

	/// Vendor spelling used on the wire.
	pub const fn vendor_token(self) -> &'static str {
		match self {
			Self::Equals => "EQ",
			Self::NotEquals => "NEQ",
			Self::GreaterThan => "GT",
			Self::LessThan => "LT",
			Self::Contains => "CONTAINS",
			Self::NotContains => "NCONTAINS",
			Self::StartsWith => "STARTSW",
			Self::NotStartsWith => "NSTARTSW",
			Self::EndsWith => "ENDSW",
			Self::NotEndsWith => "NENDSW",
		}
	}
}

/// Parsed `field.OPERATOR.value` triple.
///
/// The operator token is kept verbatim so serialization reproduces the caller's input exactly;
/// [`operator`](Self::operator) classifies it when the token is well known.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FilterExpression {
	field: String,
	operator: String,
	value: String,
}
impl FilterExpression {
	/// Query parameter name carrying the serialized expression.
	pub const QUERY_KEY: &'static str = "filter";

	/// Builds an expression from a known operator using its vendor spelling.
	pub fn new(
		field: impl Into<String>,
		operator: FilterOperator,
		value: impl Into<String>,
	) -> Result<Self, FilterError> {
		Self::from_parts(field.into(), operator.vendor_token().to_owned(), value.into())
	}

	/// Parses a raw `field.OPERATOR.value` string. The value may itself contain dots.
	pub fn parse(expression: &str) -> Result<Self, FilterError> {
		let missing = || FilterError::MissingSeparator { expression: expression.to_owned() };
		let (field, rest) = expression.split_once('.').ok_or_else(missing)?;
		let (operator, value) = rest.split_once('.').ok_or_else(missing)?;

		if field.is_empty() {
			return Err(FilterError::EmptyField { expression: expression.to_owned() });
		}
		if operator.is_empty() {
			return Err(FilterError::EmptyOperator { expression: expression.to_owned() });
		}

		Ok(Self { field: field.to_owned(), operator: operator.to_owned(), value: value.to_owned() })
	}

	fn from_parts(field: String, operator: String, value: String) -> Result<Self, FilterError> {
		let expression = format!("{field}.{operator}.{value}");

		if field.is_empty() || field.contains('.') {
			return Err(FilterError::EmptyField { expression });
		}

		Ok(Self { field, operator, value })
	}

	/// Attribute being filtered on.
	pub fn field(&self) -> &str {
		&self.field
	}

	/// Operator token exactly as supplied.
	pub fn operator_token(&self) -> &str {
		&self.operator
	}

	/// Classified operator, or `None` for vendor tokens outside [`FilterOperator`].
	pub fn operator(&self) -> Option<FilterOperator> {
		FilterOperator::from_token(&self.operator)
	}

	/// Comparison value.
	pub fn value(&self) -> &str {
		&self.value
	}
}
impl Display for FilterExpression {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}.{}.{}", self.field, self.operator, self.value)
	}
}
impl FromStr for FilterExpression {
	type Err = FilterError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn valid_expressions_round_trip_unchanged() {
		for raw in [
			"name.CONTAINS.foo",
			"name.EQ.bar",
			"mac.STARTSW.00:11",
			"hostname.ENDSW.corp.example.com",
			"description.CUSTOMOP.anything",
			"name.EQ.",
		] {
			let parsed = FilterExpression::parse(raw).expect("Fixture filter should parse.");

			assert_eq!(parsed.to_string(), raw);
		}
	}

	#[test]
	fn value_keeps_embedded_dots() {
		let parsed = FilterExpression::parse("ipaddress.EQ.10.0.0.1")
			.expect("Dotted value should parse successfully.");

		assert_eq!(parsed.field(), "ipaddress");
		assert_eq!(parsed.operator(), Some(FilterOperator::Equals));
		assert_eq!(parsed.value(), "10.0.0.1");
	}

	#[test]
	fn malformed_expressions_are_rejected() {
		assert!(matches!(
			FilterExpression::parse("name"),
			Err(FilterError::MissingSeparator { .. })
		));
		assert!(matches!(
			FilterExpression::parse("name.CONTAINS"),
			Err(FilterError::MissingSeparator { .. })
		));
		assert!(matches!(
			FilterExpression::parse(".EQ.value"),
			Err(FilterError::EmptyField { .. })
		));
		assert!(matches!(
			FilterExpression::parse("name..value"),
			Err(FilterError::EmptyOperator { .. })
		));
	}

	#[test]
	fn operators_accept_long_and_vendor_spellings() {
		assert_eq!(FilterOperator::from_token("STARTSWITH"), Some(FilterOperator::StartsWith));
		assert_eq!(FilterOperator::from_token("STARTSW"), Some(FilterOperator::StartsWith));
		assert_eq!(FilterOperator::from_token("contains"), None);

		let unknown =
			FilterExpression::parse("name.FUZZY.x").expect("Vendor operators should parse.");

		assert_eq!(unknown.operator(), None);
		assert_eq!(unknown.operator_token(), "FUZZY");
	}

	#[test]
	fn typed_constructor_uses_vendor_tokens() {
		let expr = FilterExpression::new("name", FilterOperator::EndsWith, "lab")
			.expect("Typed filter should build.");

		assert_eq!(expr.to_string(), "name.ENDSW.lab");
		assert!(FilterExpression::new("", FilterOperator::Equals, "x").is_err());
	}
}
