//! Read-only REST gateway: turn a declarative endpoint catalog into named, filterable
//! operations with response caching, token-bucket rate governance, and transparent pagination.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod obs;
pub mod pager;
pub mod rate_limit;
pub mod request;
pub mod transport;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		catalog::{Catalog, CategoryRules},
		config::Credentials,
		gateway::ReqwestGateway,
		transport::ReqwestTransport,
	};

	/// Catalog fixture shared by integration tests.
	pub const TEST_CATALOG: &str = r#"[
		{ "Name": "Endpoints", "URL": "/ers/config/endpoint", "FilterableFields": ["mac", "name", "profile"] },
		{ "Name": "Internal Users", "URL": "/ers/config/internaluser", "FilterableFields": ["name"] },
		{ "Name": "Deployment Nodes", "URL": "/api/v1/deployment/node" }
	]"#;

	/// Parses [`TEST_CATALOG`] with the default category rules.
	pub fn test_catalog() -> Arc<Catalog> {
		Arc::new(
			Catalog::from_json_slice(TEST_CATALOG.as_bytes(), &CategoryRules::default())
				.expect("Test catalog fixture should parse."),
		)
	}

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport(base_url: &str) -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(
			client,
			Url::parse(base_url).expect("Mock server base URL should parse."),
			Credentials::new("admin", "secret"),
		)
	}

	/// Constructs a [`ReqwestGateway`] over [`test_catalog`] pointed at `base_url`, with the
	/// credentials `admin`/`secret` and default policies.
	pub fn build_reqwest_test_gateway(base_url: &str) -> ReqwestGateway {
		ReqwestGateway::with_transport(test_catalog(), Arc::new(test_reqwest_transport(base_url)))
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, hash_map::DefaultHasher},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
