use std::time::Duration;

use thiserror::Error;

use crate::session::ContextHandle;

pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the harness core.
///
/// Everything except [`Error::SessionLost`] is recoverable at the step level:
/// callers get the typed variant and decide whether to retry, skip, or fail
/// the step. `SessionLost` aborts the remaining suite (teardown still runs).
#[derive(Debug, Error)]
pub enum Error {
	/// A condition was never satisfied within its budget.
	///
	/// Carries the last observed condition state so failures read as
	/// "waited 10s for url to contain twitter.com; last: url is about:blank"
	/// rather than a generic not-found.
	#[error("timed out after {elapsed:?} waiting for {condition}; last observed: {last}")]
	Timeout {
		condition: String,
		elapsed: Duration,
		last: String,
	},

	/// A wait was cancelled externally before it could resolve.
	#[error("wait cancelled after {elapsed:?}")]
	Cancelled { elapsed: Duration },

	/// The browsing context handle no longer exists (closed out of band).
	#[error("browsing context not found: {handle}")]
	ContextNotFound { handle: ContextHandle },

	/// A triggered action opened more than one new context.
	///
	/// Contract violation: picking one arbitrarily would corrupt the
	/// caller's bookkeeping, so the whole set is reported instead.
	#[error("expected exactly one new browsing context, found {}", .handles.len())]
	MultipleContextsOpened { handles: Vec<ContextHandle> },

	/// Login was performed but its confirmation marker never appeared.
	#[error("login as '{identity}' was not confirmed; last observed: {last}")]
	LoginFailed { identity: String, last: String },

	/// The opened context (or navigated URL) did not match the expected domain.
	#[error("expected domain '{expected}', landed on '{actual}'")]
	DomainMismatch { expected: String, actual: String },

	/// A trigger produced neither a new context nor a same-context navigation.
	#[error("trigger opened no new context and did not navigate (url still '{url}')")]
	NoNewContextAndNoNavigation { url: String },

	#[error("element not found: {locator}")]
	ElementNotFound { locator: String },

	/// Programmer error: wait parameters violate `timeout > 0` and
	/// `0 < poll_interval <= timeout`.
	#[error("invalid wait parameters: {0}")]
	InvalidWait(String),

	/// Programmer error: suite definition is malformed (duplicate step order).
	#[error("invalid suite definition: {0}")]
	InvalidSuite(String),

	/// The driver process or its connection is gone. Fatal for the suite.
	#[error("browser session lost: {0}")]
	SessionLost(String),

	/// Any other driver-reported failure.
	#[error("driver failure: {0}")]
	Driver(String),
}

impl Error {
	/// Stable machine-readable tag for reports.
	pub fn kind(&self) -> &'static str {
		match self {
			Error::Timeout { .. } => "timeout",
			Error::Cancelled { .. } => "cancelled",
			Error::ContextNotFound { .. } => "contextNotFound",
			Error::MultipleContextsOpened { .. } => "multipleContextsOpened",
			Error::LoginFailed { .. } => "loginFailed",
			Error::DomainMismatch { .. } => "domainMismatch",
			Error::NoNewContextAndNoNavigation { .. } => "noNewContextAndNoNavigation",
			Error::ElementNotFound { .. } => "elementNotFound",
			Error::InvalidWait(_) => "invalidWait",
			Error::InvalidSuite(_) => "invalidSuite",
			Error::SessionLost(_) => "sessionLost",
			Error::Driver(_) => "driver",
		}
	}

	/// Whether this error must abort the remaining suite.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Error::SessionLost(_))
	}
}
