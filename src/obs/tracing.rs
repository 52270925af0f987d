// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind, FlowOutcome},
};

/// Future returned by [`FlowSpan::instrument`]; instrumented only when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; instrumented only when tracing is enabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// One coordinator flow: a `portal_session.flow` span plus its outcome counter.
///
/// The span starts with an empty `outcome` field; [`FlowSpan::record`] fills it in and bumps
/// the matching metrics counter, so every flow reports through a single call.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	kind: FlowKind,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `kind` at `stage` and records the attempt.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		let flow = {
			let span = tracing::info_span!(
				"portal_session.flow",
				flow = kind.as_str(),
				stage,
				outcome = tracing::field::Empty,
			);

			Self { kind, span }
		};
		#[cfg(not(feature = "tracing"))]
		let flow = {
			let _ = stage;

			Self { kind }
		};

		obs::record_flow_outcome(kind, FlowOutcome::Attempt);

		flow
	}

	/// Flow kind this span reports for.
	pub fn kind(&self) -> FlowKind {
		self.kind
	}

	/// Records a terminal outcome on the span and the flow counter.
	pub fn record(&self, outcome: FlowOutcome) {
		#[cfg(feature = "tracing")]
		self.span.record("outcome", outcome.as_str());

		obs::record_flow_outcome(self.kind, outcome);
	}

	/// Records [`FlowOutcome::Success`] or [`FlowOutcome::Failure`] for `result`.
	pub fn record_result<T, E>(&self, result: &Result<T, E>) {
		self.record(if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure });
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
