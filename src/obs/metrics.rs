// self
use crate::obs::{FlowKind, FlowOutcome, RefreshFailure};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"portal_session_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records why a refresh ended the session, via metrics and tracing (when enabled).
pub fn record_refresh_failure(reason: RefreshFailure) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("portal_session_refresh_failure_total", "reason" => reason.as_str())
			.increment(1);
	}
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(reason = reason.as_str(), "refresh failed; session cleared");
	}

	#[cfg(not(any(feature = "metrics", feature = "tracing")))]
	{
		let _ = reason;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_features() {
		record_flow_outcome(FlowKind::Login, FlowOutcome::Failure);
		record_refresh_failure(RefreshFailure::Rejected);
	}
}
