//! Observability helpers for gateway dispatches.
//!
//! # Feature Flags
//!
//! - Spans named `rest_gateway.dispatch` carry the `stage` (call shape) and `operation`
//!   fields and are always emitted through `tracing`.
//! - Enable `metrics` to increment the `rest_gateway_dispatch_total` counter for every
//!   attempt/success/partial/failure, labeled by `stage` + `outcome`, and the
//!   `rest_gateway_cache_total` counter labeled by `outcome` (`hit`/`miss`).

mod metrics;
mod span;

pub use metrics::*;
pub use span::*;

// self
use crate::_prelude::*;

/// Shapes of dispatch observed by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DispatchStage {
	/// Every page aggregated into one response.
	Aggregate,
	/// Exactly one page with parameters passed through verbatim.
	SinglePage,
	/// Pages yielded incrementally to the caller.
	Stream,
}
impl DispatchStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			DispatchStage::Aggregate => "aggregate",
			DispatchStage::SinglePage => "single_page",
			DispatchStage::Stream => "stream",
		}
	}
}
impl Display for DispatchStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DispatchOutcome {
	/// Entry to the dispatcher.
	Attempt,
	/// Complete result returned.
	Success,
	/// Pagination stopped early; a partial result was returned.
	Partial,
	/// Error propagated back to the caller.
	Failure,
}
impl DispatchOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			DispatchOutcome::Attempt => "attempt",
			DispatchOutcome::Success => "success",
			DispatchOutcome::Partial => "partial",
			DispatchOutcome::Failure => "failure",
		}
	}
}
impl Display for DispatchOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
