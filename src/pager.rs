//! Pager: page-aware fetching with per-page caching and rate admission.
//!
//! Every remote call made by the gateway goes through [`Pager`]. A page fetch consults the
//! cache, acquires rate budget for the operation's category, calls the transport under the
//! per-page timeout, retries throttled responses, and caches the decoded payload. On top of
//! that the pager aggregates every page ([`Pager::fetch_all`]), yields pages lazily
//! ([`Pager::fetch_stream`]), or passes a single request through verbatim
//! ([`Pager::fetch_single`]).

pub mod page;
pub mod response;

pub use page::*;
pub use response::*;

// std
use std::time::Duration as StdDuration;
// crates.io
use futures::stream::{self, BoxStream, StreamExt};
use tracing::Instrument;
// self
use crate::{
	_prelude::*,
	cache::{CacheKey, KeyScope, ResponseCache},
	catalog::OperationDescriptor,
	error::{RemoteError, TransportError},
	filter::FilterExpression,
	rate_limit::RateGovernor,
	request::QueryParams,
	transport::{RestRequest, RestTransport},
};

/// Pagination policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagerSettings {
	/// Page size requested when the caller does not set one.
	pub default_page_size: u32,
	/// Safety bound on pages fetched by one aggregate or stream.
	pub max_pages: u32,
	/// Query key carrying the 1-based page number.
	pub page_param: String,
	/// Query key carrying the page size.
	pub size_param: String,
	/// Where paging metadata lives in payloads.
	pub shape: PageShape,
}
impl Default for PagerSettings {
	fn default() -> Self {
		Self {
			default_page_size: 100,
			max_pages: 1_000,
			page_param: "page".into(),
			size_param: "size".into(),
			shape: PageShape::default(),
		}
	}
}

/// Everything the pager needs to fetch one operation.
#[derive(Clone, Debug)]
pub struct FetchPlan {
	/// Resolved operation.
	pub operation: OperationDescriptor,
	/// Validated filter, sent under [`FilterExpression::QUERY_KEY`].
	pub filter: Option<FilterExpression>,
	/// Caller query parameters.
	pub params: QueryParams,
	/// Whether to read from and write to the cache.
	pub use_cache: bool,
}
impl FetchPlan {
	/// Plan without filter or parameters, using the cache.
	pub fn new(operation: OperationDescriptor) -> Self {
		Self { operation, filter: None, params: QueryParams::default(), use_cache: true }
	}

	/// Sets the filter.
	pub fn with_filter(mut self, filter: FilterExpression) -> Self {
		self.filter = Some(filter);

		self
	}

	/// Replaces the parameters.
	pub fn with_params(mut self, params: QueryParams) -> Self {
		self.params = params;

		self
	}

	/// Overrides cache usage.
	pub fn with_use_cache(mut self, use_cache: bool) -> Self {
		self.use_cache = use_cache;

		self
	}

	fn key(&self, params: &QueryParams, scope: KeyScope) -> CacheKey {
		CacheKey::new(self.operation.name.as_str(), self.filter.as_ref(), params, scope)
	}
}

/// Parameters normalized for auto-pagination: cursor removed, size defaulted.
struct Paging {
	params: QueryParams,
	page_size: u64,
}

struct StreamCursor {
	plan: FetchPlan,
	paging: Paging,
	next: Option<u32>,
}

/// Page-aware fetcher shared by every dispatch of a gateway.
pub struct Pager<T>
where
	T: ?Sized + RestTransport,
{
	transport: Arc<T>,
	cache: Arc<ResponseCache>,
	governor: Arc<RateGovernor>,
	settings: PagerSettings,
	page_timeout: StdDuration,
}
impl<T> Pager<T>
where
	T: ?Sized + RestTransport,
{
	/// Default per-page timeout.
	pub const DEFAULT_PAGE_TIMEOUT: StdDuration = StdDuration::from_secs(15);

	/// Creates a pager with default settings.
	pub fn new(transport: Arc<T>, cache: Arc<ResponseCache>, governor: Arc<RateGovernor>) -> Self {
		Self {
			transport,
			cache,
			governor,
			settings: PagerSettings::default(),
			page_timeout: Self::DEFAULT_PAGE_TIMEOUT,
		}
	}

	/// Replaces the pagination policy.
	pub fn with_settings(mut self, settings: PagerSettings) -> Self {
		self.settings = settings;

		self
	}

	/// Replaces the per-page timeout.
	pub fn with_page_timeout(mut self, timeout: StdDuration) -> Self {
		self.page_timeout = timeout;

		self
	}

	/// Replaces the cache.
	pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
		self.cache = cache;

		self
	}

	/// Replaces the rate governor.
	pub fn with_governor(mut self, governor: Arc<RateGovernor>) -> Self {
		self.governor = governor;

		self
	}

	/// Pagination policy.
	pub fn settings(&self) -> &PagerSettings {
		&self.settings
	}

	/// Shared cache.
	pub fn cache(&self) -> &Arc<ResponseCache> {
		&self.cache
	}

	/// Shared rate governor.
	pub fn governor(&self) -> &Arc<RateGovernor> {
		&self.governor
	}

	/// Fetches every page and concatenates their items in page order.
	///
	/// The first page's envelope is kept with its item array replaced by the aggregate. A failed
	/// first page is an error; a failed later page, or reaching the page bound, returns what was
	/// collected annotated as partial. Only complete aggregates are cached, and never beyond the
	/// expiry of the oldest cached page they were built from.
	pub async fn fetch_all(&self, plan: &FetchPlan) -> Result<GatewayResponse> {
		let paging = self.paging(&plan.params);
		let aggregate_key = plan.key(&paging.params, KeyScope::Aggregate);

		if plan.use_cache {
			if let Some(payload) = self.cache.get(&aggregate_key).await {
				return Ok(GatewayResponse::complete(payload, true));
			}
		}

		let shape = &self.settings.shape;
		let first = self.fetch_numbered(plan, &paging, 1).await?;
		let total_pages = first.total_pages;
		let mut has_more = first.has_more;
		let mut expires_at = first.cache_expires_at;
		let mut payload = first.payload;
		let mut items = shape.take_items(&mut payload).unwrap_or_default();
		let mut fetched = 1;
		let mut partial = None;

		while has_more {
			if fetched >= self.settings.max_pages {
				tracing::warn!(
					operation = %plan.operation.name,
					max_pages = self.settings.max_pages,
					"Page bound reached; returning a partial result."
				);

				partial = Some(PartialResult {
					pages_fetched: fetched,
					total_pages,
					reason: PartialReason::PageLimit { max_pages: self.settings.max_pages },
				});

				break;
			}

			let number = fetched + 1;

			match self.fetch_numbered(plan, &paging, number).await {
				Ok(page) => {
					let mut next = page.payload;

					items.extend(shape.take_items(&mut next).unwrap_or_default());
					expires_at = earliest(expires_at, page.cache_expires_at);
					has_more = page.has_more;
					fetched = number;
				},
				Err(e) => {
					tracing::error!(
						operation = %plan.operation.name,
						page = number,
						error = %e,
						"Page fetch failed; returning a partial result."
					);

					partial = Some(PartialResult {
						pages_fetched: fetched,
						total_pages,
						reason: PartialReason::PageFailed { page: number, error: e.report() },
					});

					break;
				},
			}
		}

		if shape.is_paged(&payload) {
			shape.replace_items(&mut payload, items);
		}
		if partial.is_none() && plan.use_cache {
			self.store_aggregate(aggregate_key, &payload, expires_at).await;
		}

		tracing::info!(
			operation = %plan.operation.name,
			pages = fetched,
			partial = partial.is_some(),
			"Aggregated paged response."
		);

		Ok(GatewayResponse { payload, partial, from_cache: false })
	}

	/// Fetches page `number` (1-based) of an auto-paginated request.
	pub async fn fetch_page(&self, plan: &FetchPlan, number: u32) -> Result<Page> {
		let paging = self.paging(&plan.params);

		self.fetch_numbered(plan, &paging, number.max(1)).await
	}

	/// Fetches exactly one page with the caller's parameters passed through verbatim.
	pub async fn fetch_single(&self, plan: &FetchPlan) -> Result<Page> {
		let key = plan.key(&plan.params, KeyScope::Single);
		let (payload, cache_expires_at) =
			self.fetch_payload(plan, plan.params.clone(), key).await?;
		let number = plan
			.params
			.get_u64(&self.settings.page_param)
			.and_then(|number| u32::try_from(number).ok())
			.unwrap_or(1);
		let page_size = plan
			.params
			.get_u64(&self.settings.size_param)
			.unwrap_or(u64::from(self.settings.default_page_size));
		let total_pages = self.settings.shape.total_pages(&payload, page_size);
		let has_more = self.settings.shape.has_more(&payload, number, total_pages);

		Ok(Page {
			number,
			total_pages,
			has_more,
			payload,
			from_cache: cache_expires_at.is_some(),
			cache_expires_at,
		})
	}

	/// Yields pages one at a time, starting at page 1.
	///
	/// Nothing is fetched until the stream is polled and at most one page is in flight. The
	/// stream ends after the last page, after the page bound, or right after yielding an error.
	/// Every page fetch runs inside the span that was current when the stream was created.
	pub fn fetch_stream(&self, plan: FetchPlan) -> BoxStream<'_, Result<Page>> {
		let paging = self.paging(&plan.params);
		let max_pages = self.settings.max_pages;
		let cursor = StreamCursor { plan, paging, next: Some(1) };
		let span = tracing::Span::current();

		stream::unfold(cursor, move |mut cursor| {
			async move {
				let number = cursor.next?;

				match self.fetch_numbered(&cursor.plan, &cursor.paging, number).await {
					Ok(page) => {
						cursor.next = (page.has_more && number < max_pages).then_some(number + 1);

						Some((Ok(page), cursor))
					},
					Err(e) => {
						cursor.next = None;

						Some((Err(e), cursor))
					},
				}
			}
			.instrument(span.clone())
		})
		.boxed()
	}

	async fn store_aggregate(
		&self,
		key: CacheKey,
		payload: &Value,
		expires_at: Option<OffsetDateTime>,
	) {
		let Some(expires_at) = expires_at else {
			self.cache.put(key, payload.clone()).await;

			return;
		};
		let now = OffsetDateTime::now_utc();
		let remaining = (expires_at - now).min(self.cache.settings().ttl());

		if remaining.is_positive() {
			self.cache.put_with_ttl(key, payload.clone(), now, remaining).await;
		}
	}

	fn paging(&self, params: &QueryParams) -> Paging {
		let mut params = params.clone();

		params.remove(&self.settings.page_param);

		if !params.contains_key(&self.settings.size_param) {
			params.insert(self.settings.size_param.clone(), self.settings.default_page_size);
		}

		let page_size = params
			.get_u64(&self.settings.size_param)
			.filter(|size| *size > 0)
			.unwrap_or(u64::from(self.settings.default_page_size));

		Paging { params, page_size }
	}

	async fn fetch_numbered(&self, plan: &FetchPlan, paging: &Paging, number: u32) -> Result<Page> {
		let key = plan.key(&paging.params, KeyScope::Page(number));
		let wire = paging.params.clone().with(self.settings.page_param.clone(), number);
		let (payload, cache_expires_at) = self.fetch_payload(plan, wire, key).await?;
		let total_pages = self.settings.shape.total_pages(&payload, paging.page_size);
		let has_more = self.settings.shape.has_more(&payload, number, total_pages);

		Ok(Page {
			number,
			total_pages,
			has_more,
			payload,
			from_cache: cache_expires_at.is_some(),
			cache_expires_at,
		})
	}

	async fn fetch_payload(
		&self,
		plan: &FetchPlan,
		mut wire: QueryParams,
		key: CacheKey,
	) -> Result<(Value, Option<OffsetDateTime>)> {
		if plan.use_cache {
			if let Some(entry) = self.cache.entry(&key).await {
				let expires_at = entry.expires_at();

				return Ok((entry.value, Some(expires_at)));
			}
		}
		if let Some(filter) = &plan.filter {
			wire.insert(FilterExpression::QUERY_KEY, filter.to_string());
		}

		let operation = &plan.operation;
		let request = RestRequest::new(operation.path.clone()).with_query(wire.to_pairs());
		let max_throttle_retries = self.governor.settings().max_throttle_retries;
		let mut throttled = 0;

		loop {
			self.governor.acquire(&operation.category).await?;

			tracing::info!(operation = %operation.name, key = %key.fingerprint(), "Fetching page.");

			let response =
				match tokio::time::timeout(self.page_timeout, self.transport.get(&request)).await {
					Ok(response) => response?,
					Err(_) => {
						return Err(TransportError::Timeout { after: Some(self.page_timeout) }.into());
					},
				};

			if response.is_throttled() {
				let delay = self.governor.report_throttled(&operation.category, response.retry_after);

				if throttled < max_throttle_retries {
					throttled += 1;

					if !self.governor.is_enabled() {
						tokio::time::sleep(delay).await;
					}

					continue;
				}
			}
			if !response.is_success() {
				return Err(RemoteError::new(response.status, response.text()).into());
			}

			self.governor.report_success(&operation.category);

			let payload = response.json()?;

			if plan.use_cache {
				self.cache.put(key, payload.clone()).await;
			}

			return Ok((payload, None));
		}
	}
}

fn earliest(a: Option<OffsetDateTime>, b: Option<OffsetDateTime>) -> Option<OffsetDateTime> {
	match (a, b) {
		(Some(a), Some(b)) => Some(a.min(b)),
		(a, b) => a.or(b),
	}
}

impl<T> Debug for Pager<T>
where
	T: ?Sized + RestTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Pager")
			.field("settings", &self.settings)
			.field("page_timeout", &self.page_timeout)
			.finish_non_exhaustive()
	}
}
