//! Optional observability helpers for coordinator flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `portal_session.flow` with the `flow`,
//!   `stage` (call site), and `outcome` fields, plus a `warn` event whenever a refresh fails.
//! - Enable `metrics` to increment the `portal_session_flow_total` counter for every
//!   attempt/success/failure/coalesced outcome, labeled by `flow` + `outcome`, and the
//!   `portal_session_refresh_failure_total` counter labeled by `reason`.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authenticated request wrapper.
	Request,
	/// Token refresh.
	Refresh,
	/// Credential login.
	Login,
	/// Explicit logout.
	Logout,
	/// Session restore on startup.
	Restore,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Request => "request",
			FlowKind::Refresh => "refresh",
			FlowKind::Login => "login",
			FlowKind::Logout => "logout",
			FlowKind::Restore => "restore",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a coordinator helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Resolved from another caller's in-flight refresh.
	Coalesced,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Coalesced => "coalesced",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Reasons a refresh ends the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshFailure {
	/// No refresh token was stored; the endpoint was not called.
	MissingRefreshToken,
	/// The endpoint answered with a non-2xx status.
	Rejected,
	/// The transport failed before a response arrived.
	Transport,
	/// The endpoint answered 2xx without a usable access token.
	Malformed,
	/// The session store failed while reading or writing credentials.
	Storage,
}
impl RefreshFailure {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshFailure::MissingRefreshToken => "missing_refresh_token",
			RefreshFailure::Rejected => "rejected",
			RefreshFailure::Transport => "transport",
			RefreshFailure::Malformed => "malformed",
			RefreshFailure::Storage => "storage",
		}
	}
}
impl Display for RefreshFailure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
