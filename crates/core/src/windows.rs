//! Window/tab orchestration: snapshot-diff discovery of new contexts and
//! focus-safe switch/close operations.
//!
//! Discovery is race-tolerant because the baseline snapshot is captured
//! strictly before the triggering action; "first handle that isn't the
//! original" scans are exactly what this replaces.

use std::collections::BTreeSet;
use std::time::Duration;

use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::session::{BrowsingSession, ContextHandle};
use crate::wait::{Probe, WaitEngine, condition_fn};

/// Immutable set of context handles captured at one instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowSnapshot {
	handles: BTreeSet<ContextHandle>,
}

impl WindowSnapshot {
	pub fn new(handles: BTreeSet<ContextHandle>) -> Self {
		Self { handles }
	}

	pub fn len(&self) -> usize {
		self.handles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handles.is_empty()
	}

	pub fn contains(&self, handle: &ContextHandle) -> bool {
		self.handles.contains(handle)
	}

	/// Handles present in `current` but not in this snapshot.
	pub fn opened_in(&self, current: &BTreeSet<ContextHandle>) -> Vec<ContextHandle> {
		current.difference(&self.handles).cloned().collect()
	}

	/// Handles present in this snapshot but gone from `current`.
	pub fn closed_in(&self, current: &BTreeSet<ContextHandle>) -> Vec<ContextHandle> {
		self.handles.difference(current).cloned().collect()
	}
}

/// Tracks open browsing contexts and mediates all multi-context operations.
///
/// Together with [`crate::auth::SessionController`] this is the only
/// component allowed to move session focus, and every move it makes is
/// paired with a restore.
pub struct WindowRegistry<'a> {
	session: &'a dyn BrowsingSession,
	wait: &'a WaitEngine,
}

impl<'a> WindowRegistry<'a> {
	pub fn new(session: &'a dyn BrowsingSession, wait: &'a WaitEngine) -> Self {
		Self { session, wait }
	}

	pub fn session(&self) -> &'a dyn BrowsingSession {
		self.session
	}

	pub fn wait(&self) -> &'a WaitEngine {
		self.wait
	}

	/// Captures the current handle set. Read-only.
	pub async fn snapshot(&self) -> Result<WindowSnapshot> {
		Ok(WindowSnapshot::new(self.session.list_contexts().await?))
	}

	pub async fn active_context(&self) -> Result<ContextHandle> {
		self.session.active_context().await
	}

	/// Waits for exactly one context to appear relative to `baseline`.
	///
	/// Zero new contexts within `timeout` is a [`Error::Timeout`]; more than
	/// one is a [`Error::MultipleContextsOpened`] contract violation: one
	/// triggered action is expected to open at most one context, and guessing
	/// among several would corrupt the caller's bookkeeping.
	pub async fn await_new_context(
		&self,
		baseline: &WindowSnapshot,
		timeout: Duration,
	) -> Result<ContextHandle> {
		let baseline_len = baseline.len();
		let grown = condition_fn(
			format!("context count to exceed {baseline_len}"),
			move |s: &dyn BrowsingSession| {
				async move {
					match s.list_contexts().await {
						Ok(handles) if handles.len() > baseline_len => Probe::Satisfied(handles),
						Ok(handles) => Probe::Pending(format!("{} contexts open", handles.len())),
						Err(err) => Probe::Halted(err),
					}
				}
				.boxed()
			},
		);

		let current = self
			.wait
			.run_for(self.session, &grown, timeout)
			.await?
			.into_result()?;

		let mut opened = baseline.opened_in(&current);
		match opened.len() {
			1 => {
				let handle = opened.remove(0);
				debug!(target: "webstride.windows", context = %handle, "new context detected");
				Ok(handle)
			}
			0 => {
				// The count grew but every handle was already in the baseline:
				// the set churned underneath us. Report it as non-detection.
				Err(Error::Timeout {
					condition: format!("context count to exceed {baseline_len}"),
					elapsed: timeout,
					last: "handle set changed without any new handle".into(),
				})
			}
			_ => Err(Error::MultipleContextsOpened { handles: opened }),
		}
	}

	/// Moves focus to `handle`.
	pub async fn switch_to(&self, handle: &ContextHandle) -> Result<()> {
		debug!(target: "webstride.windows", context = %handle, "switching focus");
		self.session.switch_context(handle).await
	}

	/// Closes `context`, then restores focus to `return_to`.
	///
	/// The return-switch is attempted on every exit path. When both close and
	/// switch fail, the close failure wins and the switch failure is logged;
	/// an inner failure is never masked by cleanup.
	pub async fn close_and_return(
		&self,
		context: &ContextHandle,
		return_to: &ContextHandle,
	) -> Result<()> {
		let closed = self.session.close_context(context).await;
		if let Err(err) = &closed {
			warn!(
				target: "webstride.windows",
				context = %context,
				error = %err,
				"closing context failed; restoring focus anyway"
			);
		}

		let switched = self.session.switch_context(return_to).await;
		match (closed, switched) {
			(Ok(()), Ok(())) => Ok(()),
			(Err(close_err), Ok(())) => Err(close_err),
			(Ok(()), Err(switch_err)) => Err(switch_err),
			(Err(close_err), Err(switch_err)) => {
				warn!(
					target: "webstride.windows",
					context = %return_to,
					error = %switch_err,
					"focus restore also failed"
				);
				Err(close_err)
			}
		}
	}
}
