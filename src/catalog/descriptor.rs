//! Operation descriptors and the raw catalog entry format they are built from.

// self
use crate::{
	_prelude::*,
	catalog::{CategoryRules, OperationName},
};

/// One entry of the declarative catalog file.
///
/// Field names follow the catalog format (`Name`, `URL`, `FilterableFields`, optional
/// `Category`). Missing strings deserialize as empty so incomplete entries can be skipped
/// instead of failing the whole catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
	/// Human-readable display name.
	#[serde(rename = "Name", default)]
	pub name: String,
	/// Remote resource path.
	#[serde(rename = "URL", default)]
	pub url: String,
	/// Attributes the remote resource accepts in filter expressions.
	#[serde(rename = "FilterableFields", default)]
	pub filterable_fields: Vec<String>,
	/// Explicit rate category; derived from the path when absent.
	#[serde(rename = "Category", default, skip_serializing_if = "Option::is_none")]
	pub category: Option<String>,
}
impl CatalogEntry {
	/// Whether the entry carries both a name and a path.
	pub fn is_complete(&self) -> bool {
		!self.name.trim().is_empty() && !self.url.trim().is_empty()
	}
}

/// Immutable description of one read-only remote operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationDescriptor {
	/// Caller-facing unique name.
	pub name: OperationName,
	/// Display name the operation was derived from.
	pub display_name: String,
	/// Remote resource path appended to the base address.
	pub path: String,
	/// Ordered, de-duplicated filterable attributes (advisory only).
	pub filterable_fields: Vec<String>,
	/// Rate category.
	pub category: String,
}
impl OperationDescriptor {
	/// Creates a descriptor whose display name equals its operation name.
	pub fn new(name: OperationName, path: impl Into<String>, category: impl Into<String>) -> Self {
		Self {
			display_name: name.to_string(),
			name,
			path: path.into(),
			filterable_fields: Vec::new(),
			category: category.into(),
		}
	}

	/// Builds a descriptor from a catalog entry, deriving the name and category.
	pub fn from_entry(
		entry: &CatalogEntry,
		rules: &CategoryRules,
	) -> Result<Self, crate::catalog::OperationNameError> {
		let name = OperationName::from_display_name(&entry.name)?;
		let category = entry
			.category
			.clone()
			.filter(|category| !category.trim().is_empty())
			.unwrap_or_else(|| rules.categorize(&entry.url).to_owned());

		Ok(Self {
			name,
			display_name: entry.name.clone(),
			path: entry.url.clone(),
			filterable_fields: Vec::new(),
			category,
		}
		.with_filterable_fields(entry.filterable_fields.iter().cloned()))
	}

	/// Replaces the filterable fields, keeping first-seen order and dropping duplicates.
	pub fn with_filterable_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut ordered: Vec<String> = Vec::new();

		for field in fields {
			let field = field.into();

			if !field.is_empty() && !ordered.contains(&field) {
				ordered.push(field);
			}
		}

		self.filterable_fields = ordered;

		self
	}

	/// Whether the operation advertises any filterable field.
	pub fn supports_filtering(&self) -> bool {
		!self.filterable_fields.is_empty()
	}

	/// Help text describing what the operation fetches and how to drive it.
	pub fn description(&self) -> String {
		let mut text = format!("Fetch data for {} (Endpoint: {}).", self.display_name, self.path);

		if self.supports_filtering() {
			text.push_str(&format!(
				" Supports filtering on fields: {}.",
				self.filterable_fields.join(", ")
			));
		} else {
			text.push_str(" Does not support filtering.");
		}

		text.push_str(
			"\n\nPagination: all result pages are combined into a single response. Control it \
			 with the query parameters:\n- `size`: results per page (default 100, max 100)\n- \
			 `auto_paginate`: set to false to fetch only one page\n- `page`: the page to fetch \
			 when `auto_paginate` is false\n- `use_cache`: set to false to bypass the response \
			 cache",
		);

		text
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn entry(name: &str, url: &str, fields: &[&str]) -> CatalogEntry {
		CatalogEntry {
			name: name.into(),
			url: url.into(),
			filterable_fields: fields.iter().map(|field| field.to_string()).collect(),
			category: None,
		}
	}

	#[test]
	fn entries_derive_name_category_and_fields() {
		let descriptor = OperationDescriptor::from_entry(
			&entry("Network Devices", "/ers/config/networkdevice", &["name", "ipaddress", "name"]),
			&CategoryRules::default(),
		)
		.expect("Catalog entry should convert.");

		assert_eq!(descriptor.name.as_str(), "network_devices");
		assert_eq!(descriptor.category, "device");
		assert_eq!(descriptor.filterable_fields, vec!["name", "ipaddress"]);
	}

	#[test]
	fn explicit_category_overrides_rules() {
		let mut raw = entry("Endpoints", "/ers/config/endpoint", &[]);

		raw.category = Some("bulk".into());

		let descriptor = OperationDescriptor::from_entry(&raw, &CategoryRules::default())
			.expect("Catalog entry should convert.");

		assert_eq!(descriptor.category, "bulk");
	}

	#[test]
	fn description_mentions_filtering_support() {
		let rules = CategoryRules::default();
		let filterable = OperationDescriptor::from_entry(
			&entry("Endpoints", "/ers/config/endpoint", &["mac", "name"]),
			&rules,
		)
		.expect("Filterable entry should convert.");
		let plain =
			OperationDescriptor::from_entry(&entry("Nodes", "/ers/config/node", &[]), &rules)
				.expect("Plain entry should convert.");

		assert!(filterable.description().starts_with(
			"Fetch data for Endpoints (Endpoint: /ers/config/endpoint). Supports filtering on \
			 fields: mac, name."
		));
		assert!(plain.description().contains("Does not support filtering."));
		assert!(plain.description().contains("auto_paginate"));
	}
}
