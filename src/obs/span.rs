// crates.io
use tracing::instrument::Instrumented;
// self
use crate::{_prelude::*, obs::DispatchStage};

/// A span builder used by gateway dispatches.
#[derive(Clone, Debug)]
pub struct DispatchSpan {
	span: tracing::Span,
}
impl DispatchSpan {
	/// Creates a new span tagged with the provided stage + operation.
	pub fn new(stage: DispatchStage, operation: &str) -> Self {
		let span = tracing::info_span!("rest_gateway.dispatch", stage = stage.as_str(), operation);

		Self { span }
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> DispatchSpanGuard {
		DispatchSpanGuard { _guard: self.span.entered() }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}
}

/// RAII guard returned by [`DispatchSpan::entered`].
pub struct DispatchSpanGuard {
	_guard: tracing::span::EnteredSpan,
}
impl Debug for DispatchSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("DispatchSpanGuard(..)")
	}
}
