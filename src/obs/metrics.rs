// self
use crate::obs::{DispatchOutcome, DispatchStage};

/// Records a dispatch outcome via the global metrics recorder (when enabled).
pub fn record_dispatch_outcome(stage: DispatchStage, outcome: DispatchOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"rest_gateway_dispatch_total",
			"stage" => stage.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, outcome);
	}
}

/// Records a cache lookup result via the global metrics recorder (when enabled).
pub fn record_cache_lookup(hit: bool) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("rest_gateway_cache_total", "outcome" => if hit { "hit" } else { "miss" })
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = hit;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_metrics() {
		record_dispatch_outcome(DispatchStage::Aggregate, DispatchOutcome::Partial);
		record_cache_lookup(true);
	}
}
