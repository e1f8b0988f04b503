//! Dispatch entry points.

// crates.io
use futures::stream::BoxStream;
// self
use crate::{
	_prelude::*,
	filter::FilterExpression,
	gateway::Gateway,
	obs::{self, DispatchOutcome, DispatchSpan, DispatchStage},
	pager::{FetchPlan, GatewayResponse, Page},
	request::InvokeOptions,
	transport::RestTransport,
};

impl<T> Gateway<T>
where
	T: ?Sized + RestTransport,
{
	/// Invokes `operation` and returns its payload.
	///
	/// Unknown names and malformed filters fail before any cache, rate, or network activity.
	/// With `auto_paginate` every page is aggregated (possibly partially); without it exactly
	/// one page is fetched with the caller's parameters untouched. Cache hits involve neither
	/// the rate governor nor the transport.
	pub async fn invoke(&self, operation: &str, options: InvokeOptions) -> Result<GatewayResponse> {
		let stage =
			if options.auto_paginate { DispatchStage::Aggregate } else { DispatchStage::SinglePage };
		let span = DispatchSpan::new(stage, operation);

		obs::record_dispatch_outcome(stage, DispatchOutcome::Attempt);

		let result = span
			.instrument(async move {
				let auto_paginate = options.auto_paginate;
				let plan = self.plan(operation, options)?;

				if auto_paginate {
					self.pager.fetch_all(&plan).await
				} else {
					let page = self.pager.fetch_single(&plan).await?;

					Ok(GatewayResponse::complete(page.payload, page.from_cache))
				}
			})
			.await;

		match &result {
			Ok(response) if response.is_partial() =>
				obs::record_dispatch_outcome(stage, DispatchOutcome::Partial),
			Ok(_) => obs::record_dispatch_outcome(stage, DispatchOutcome::Success),
			Err(e) => {
				tracing::warn!(operation, kind = %e.kind(), error = %e, "Dispatch failed.");
				obs::record_dispatch_outcome(stage, DispatchOutcome::Failure);
			},
		}

		result
	}

	/// Resolves and validates like [`invoke`](Self::invoke), then yields the operation's pages
	/// lazily. `auto_paginate` is ignored; dropping the stream stops further fetches. Page
	/// fetches run inside this dispatch's span.
	pub fn invoke_stream(
		&self,
		operation: &str,
		options: InvokeOptions,
	) -> Result<BoxStream<'_, Result<Page>>> {
		let _guard = DispatchSpan::new(DispatchStage::Stream, operation).entered();

		obs::record_dispatch_outcome(DispatchStage::Stream, DispatchOutcome::Attempt);

		match self.plan(operation, options) {
			Ok(plan) => {
				obs::record_dispatch_outcome(DispatchStage::Stream, DispatchOutcome::Success);

				Ok(self.pager.fetch_stream(plan))
			},
			Err(e) => {
				tracing::warn!(operation, kind = %e.kind(), error = %e, "Dispatch failed.");
				obs::record_dispatch_outcome(DispatchStage::Stream, DispatchOutcome::Failure);

				Err(e)
			},
		}
	}

	fn plan(&self, operation: &str, options: InvokeOptions) -> Result<FetchPlan> {
		let descriptor = self
			.catalog
			.get(operation)
			.ok_or_else(|| Error::UnknownOperation { name: operation.to_owned() })?;
		let filter = options
			.filter
			.as_deref()
			.map(str::trim)
			.filter(|raw| !raw.is_empty())
			.map(FilterExpression::parse)
			.transpose()?;

		if let Some(filter) = &filter {
			if !descriptor.filterable_fields.iter().any(|field| field == filter.field()) {
				tracing::debug!(
					operation,
					field = filter.field(),
					"Filter field is not advertised as filterable; sending it anyway."
				);
			}
		}

		Ok(FetchPlan {
			operation: descriptor.clone(),
			filter,
			params: options.query,
			use_cache: options.use_cache,
		})
	}
}
