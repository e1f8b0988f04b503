//! Gateway facade: catalog resolution plus the shared cache, rate governor, and pager.
//!
//! [`Gateway`] is the single entry point callers use. It is generic over the
//! [`RestTransport`] so tests can script remote behavior; production code uses
//! [`ReqwestGateway`]. Each gateway owns its component instances, so independent gateways can
//! coexist in one process.

mod invoke;
mod manage;

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	cache::ResponseCache,
	catalog::{Catalog, OperationDescriptor},
	pager::{Pager, PagerSettings},
	rate_limit::RateGovernor,
	transport::RestTransport,
};
#[cfg(feature = "reqwest")]
use crate::{config::GatewayConfig, error::ConfigError, transport::ReqwestTransport};

/// Gateway type alias backed by the reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestGateway = Gateway<ReqwestTransport>;

/// Read-only REST gateway over a declarative operation catalog.
pub struct Gateway<T>
where
	T: ?Sized + RestTransport,
{
	catalog: Arc<Catalog>,
	pager: Pager<T>,
}
impl<T> Gateway<T>
where
	T: ?Sized + RestTransport,
{
	/// Creates a gateway with default cache, rate, and pagination policies.
	pub fn with_transport(catalog: Arc<Catalog>, transport: Arc<T>) -> Self {
		let pager = Pager::new(
			transport,
			Arc::new(ResponseCache::default()),
			Arc::new(RateGovernor::default()),
		);

		Self { catalog, pager }
	}

	/// Replaces the response cache (for example to share one between gateways).
	pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
		self.pager = self.pager.with_cache(cache);

		self
	}

	/// Replaces the rate governor.
	pub fn with_governor(mut self, governor: Arc<RateGovernor>) -> Self {
		self.pager = self.pager.with_governor(governor);

		self
	}

	/// Replaces the pagination policy.
	pub fn with_pager_settings(mut self, settings: PagerSettings) -> Self {
		self.pager = self.pager.with_settings(settings);

		self
	}

	/// Replaces the per-page transport timeout.
	pub fn with_page_timeout(mut self, timeout: StdDuration) -> Self {
		self.pager = self.pager.with_page_timeout(timeout);

		self
	}

	/// Operation catalog.
	pub fn catalog(&self) -> &Catalog {
		&self.catalog
	}

	/// Operations in catalog order.
	pub fn operations(&self) -> impl Iterator<Item = &OperationDescriptor> {
		self.catalog.iter()
	}

	/// Generated help text for `operation`.
	pub fn describe(&self, operation: &str) -> Option<String> {
		self.catalog.get(operation).map(OperationDescriptor::description)
	}

	/// Shared response cache.
	pub fn cache(&self) -> &Arc<ResponseCache> {
		self.pager.cache()
	}

	/// Shared rate governor.
	pub fn governor(&self) -> &Arc<RateGovernor> {
		self.pager.governor()
	}

	/// Underlying pager.
	pub fn pager(&self) -> &Pager<T> {
		&self.pager
	}
}
#[cfg(feature = "reqwest")]
impl ReqwestGateway {
	/// Builds a gateway whose transport, cache, rate, and pagination policies come from
	/// `config`.
	///
	/// Rate buckets that could never admit a request are rejected here rather than at the
	/// first dispatch.
	pub fn from_config(config: &GatewayConfig, catalog: Arc<Catalog>) -> Result<Self, ConfigError> {
		config.rate_limit.validate()?;

		let transport = ReqwestTransport::from_config(config)?;

		tracing::info!(
			base_url = %config.base_url,
			operations = catalog.len(),
			"Gateway configured."
		);

		Ok(Self::with_transport(catalog, Arc::new(transport))
			.with_cache(Arc::new(ResponseCache::new(config.cache.clone())))
			.with_governor(Arc::new(RateGovernor::new(config.rate_limit.clone())))
			.with_pager_settings(config.pagination.clone())
			.with_page_timeout(config.request_timeout()))
	}
}
impl<T> Debug for Gateway<T>
where
	T: ?Sized + RestTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("operations", &self.catalog.len())
			.field("pager", &self.pager)
			.finish()
	}
}
