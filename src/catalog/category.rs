//! Path-based rate category assignment.

// self
use crate::_prelude::*;

/// Category used when no rule matches.
pub const DEFAULT_CATEGORY: &str = "default";

/// Maps any path containing `pattern` onto `category`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
	/// Substring matched against the operation path.
	pub pattern: String,
	/// Category assigned on match.
	pub category: String,
}
impl CategoryRule {
	/// Creates a rule.
	pub fn new(pattern: impl Into<String>, category: impl Into<String>) -> Self {
		Self { pattern: pattern.into(), category: category.into() }
	}
}

/// Ordered rule list; the first matching rule wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryRules(Vec<CategoryRule>);
impl CategoryRules {
	/// Wraps an explicit rule list.
	pub fn new(rules: Vec<CategoryRule>) -> Self {
		Self(rules)
	}

	/// Rule list with no entries; everything maps to [`DEFAULT_CATEGORY`].
	pub fn empty() -> Self {
		Self(Vec::new())
	}

	/// Returns the category for `path`.
	pub fn categorize(&self, path: &str) -> &str {
		self.0
			.iter()
			.find(|rule| path.contains(rule.pattern.as_str()))
			.map_or(DEFAULT_CATEGORY, |rule| rule.category.as_str())
	}

	/// Iterator over the rules in match order.
	pub fn iter(&self) -> impl Iterator<Item = &CategoryRule> {
		self.0.iter()
	}
}
impl Default for CategoryRules {
	fn default() -> Self {
		const RULES: [(&str, &str); 14] = [
			("/ers/config/identitygroup", "auth"),
			("/ers/config/idstoresequence", "auth"),
			("/ers/config/internaluser", "auth"),
			("/ers/config/adminuser", "auth"),
			("/ers/config/activedirectory", "auth"),
			("/ers/config/networkdevice", "device"),
			("/ers/config/endpoint", "device"),
			("/ers/config/node", "device"),
			("/ers/config/endpointgroup", "device"),
			("/api/v1/policy", "policy"),
			("/ers/config/authorizationprofile", "policy"),
			("/ers/config/allowedprotocols", "policy"),
			("/ers/config/sgacl", "policy"),
			("/ers/config/sgt", "policy"),
		];

		Self(RULES.iter().map(|(pattern, category)| CategoryRule::new(*pattern, *category)).collect())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_rules_cover_known_path_families() {
		let rules = CategoryRules::default();

		assert_eq!(rules.categorize("/ers/config/internaluser"), "auth");
		assert_eq!(rules.categorize("/ers/config/endpoint"), "device");
		assert_eq!(rules.categorize("/ers/config/networkdevicegroup"), "device");
		assert_eq!(rules.categorize("/api/v1/policy/network-access/policy-set"), "policy");
		assert_eq!(rules.categorize("/ers/config/sgt"), "policy");
		assert_eq!(rules.categorize("/api/v1/deployment/node"), DEFAULT_CATEGORY);
	}

	#[test]
	fn first_matching_rule_wins() {
		let rules = CategoryRules::new(vec![
			CategoryRule::new("/a", "first"),
			CategoryRule::new("/a/b", "second"),
		]);

		assert_eq!(rules.categorize("/a/b/c"), "first");
		assert_eq!(CategoryRules::empty().categorize("/a/b/c"), DEFAULT_CATEGORY);
	}
}
