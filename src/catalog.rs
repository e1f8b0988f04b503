//! Declarative operation catalog.
//!
//! The catalog is plain data: an ordered list of [`OperationDescriptor`] values indexed by
//! name. It is loaded once (typically from the `[{ "Name", "URL", "FilterableFields" }]` JSON
//! format) and shared read-only by every dispatch.

pub mod category;
pub mod descriptor;
pub mod name;

pub use category::*;
pub use descriptor::*;
pub use name::*;

// std
use std::path::Path;
// self
use crate::{_prelude::*, error::ConfigError};

/// Ordered, name-indexed set of operations.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
	operations: Vec<OperationDescriptor>,
	index: HashMap<OperationName, usize>,
}
impl Catalog {
	/// Builds a catalog from descriptors, rejecting duplicate names.
	pub fn new(operations: Vec<OperationDescriptor>) -> Result<Self, ConfigError> {
		let mut index = HashMap::with_capacity(operations.len());

		for (position, operation) in operations.iter().enumerate() {
			if index.insert(operation.name.clone(), position).is_some() {
				return Err(ConfigError::DuplicateOperation { name: operation.name.to_string() });
			}
		}

		Ok(Self { operations, index })
	}

	/// Converts raw catalog entries; incomplete entries are skipped with a warning.
	pub fn from_entries(
		entries: &[CatalogEntry],
		rules: &CategoryRules,
	) -> Result<Self, ConfigError> {
		let mut operations = Vec::with_capacity(entries.len());

		for entry in entries {
			if !entry.is_complete() {
				tracing::warn!(name = %entry.name, url = %entry.url, "Skipping catalog entry without a name or URL.");

				continue;
			}

			operations.push(OperationDescriptor::from_entry(entry, rules)?);
		}

		Self::new(operations)
	}

	/// Parses the JSON catalog format, reporting the path of any malformed value.
	pub fn from_json_slice(bytes: &[u8], rules: &CategoryRules) -> Result<Self, ConfigError> {
		let deserializer = &mut serde_json::Deserializer::from_slice(bytes);
		let entries: Vec<CatalogEntry> = serde_path_to_error::deserialize(deserializer)
			.map_err(|source| ConfigError::InvalidCatalog { source })?;

		Self::from_entries(&entries, rules)
	}

	/// Reads and parses a JSON catalog file.
	pub fn load(path: impl AsRef<Path>, rules: &CategoryRules) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let bytes = std::fs::read(path)
			.map_err(|source| ConfigError::CatalogIo { path: path.to_path_buf(), source })?;
		let catalog = Self::from_json_slice(&bytes, rules)?;

		tracing::info!(path = %path.display(), operations = catalog.len(), "Loaded operation catalog.");

		Ok(catalog)
	}

	/// Looks an operation up by name.
	pub fn get(&self, name: &str) -> Option<&OperationDescriptor> {
		self.index.get(name).map(|position| &self.operations[*position])
	}

	/// Whether an operation with this name exists.
	pub fn contains(&self, name: &str) -> bool {
		self.index.contains_key(name)
	}

	/// Operations in catalog order.
	pub fn iter(&self) -> impl Iterator<Item = &OperationDescriptor> {
		self.operations.iter()
	}

	/// Number of operations.
	pub fn len(&self) -> usize {
		self.operations.len()
	}

	/// Whether the catalog has no operations.
	pub fn is_empty(&self) -> bool {
		self.operations.is_empty()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const CATALOG: &str = r#"[
		{ "Name": "Endpoints", "URL": "/ers/config/endpoint", "FilterableFields": ["mac", "name"] },
		{ "Name": "Internal Users", "URL": "/ers/config/internaluser", "FilterableFields": ["name"] },
		{ "Name": "Deployment Nodes", "URL": "/api/v1/deployment/node" },
		{ "Name": "", "URL": "/ers/config/broken" }
	]"#;

	#[test]
	fn json_catalog_loads_in_order_and_skips_incomplete_entries() {
		let catalog = Catalog::from_json_slice(CATALOG.as_bytes(), &CategoryRules::default())
			.expect("Catalog fixture should parse.");
		let names = catalog.iter().map(|op| op.name.as_str()).collect::<Vec<_>>();

		assert_eq!(names, ["endpoints", "internal_users", "deployment_nodes"]);
		assert_eq!(catalog.len(), 3);

		let users = catalog.get("internal_users").expect("Users operation should exist.");

		assert_eq!(users.category, "auth");
		assert!(users.supports_filtering());

		let nodes = catalog.get("deployment_nodes").expect("Nodes operation should exist.");

		assert_eq!(nodes.category, DEFAULT_CATEGORY);
		assert!(!nodes.supports_filtering());
		assert!(catalog.get("nonexistent").is_none());
	}

	#[test]
	fn duplicate_names_are_rejected() {
		let raw = r#"[
			{ "Name": "Endpoints", "URL": "/a" },
			{ "Name": "endpoints", "URL": "/b" }
		]"#;
		let err = Catalog::from_json_slice(raw.as_bytes(), &CategoryRules::default())
			.expect_err("Duplicate derived names should be rejected.");

		assert!(matches!(err, ConfigError::DuplicateOperation { name } if name == "endpoints"));
	}

	#[test]
	fn malformed_catalog_reports_json_path() {
		let raw = r#"[{ "Name": "Endpoints", "URL": "/a", "FilterableFields": "name" }]"#;
		let err = Catalog::from_json_slice(raw.as_bytes(), &CategoryRules::default())
			.expect_err("A string where a list belongs should be rejected.");

		assert!(matches!(err, ConfigError::InvalidCatalog { .. }));
		assert!(err.to_string().contains("FilterableFields"), "unexpected message: {err}");
	}

	#[test]
	fn missing_catalog_file_is_a_config_error() {
		let err = Catalog::load("/definitely/not/here.json", &CategoryRules::default())
			.expect_err("Missing file should fail.");

		assert!(matches!(err, ConfigError::CatalogIo { .. }));
	}
}
