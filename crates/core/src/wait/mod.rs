//! Explicit-wait engine: polls a condition until it holds, a deadline
//! passes, or the run is cancelled.
//!
//! This is the single wait path of the harness. There is no implicit-wait
//! configuration anywhere: every blocking call goes through [`WaitEngine`]
//! with one inspectable timeout, so effective timeouts never stack.

mod condition;
pub mod conditions;

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

pub use condition::{Condition, Discard, FnCondition, Marker, Probe, condition_fn};

use crate::error::{Error, Result};
use crate::session::BrowsingSession;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Timeout and poll interval for one wait run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitConfig {
	pub timeout: Duration,
	pub poll_interval: Duration,
}

impl Default for WaitConfig {
	fn default() -> Self {
		Self {
			timeout: DEFAULT_TIMEOUT,
			poll_interval: DEFAULT_POLL_INTERVAL,
		}
	}
}

impl WaitConfig {
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
		self.poll_interval = poll_interval;
		self
	}

	fn validate(&self) -> Result<()> {
		if self.timeout.is_zero() {
			return Err(Error::InvalidWait("timeout must be positive".into()));
		}
		if self.poll_interval.is_zero() {
			return Err(Error::InvalidWait("poll interval must be positive".into()));
		}
		if self.poll_interval > self.timeout {
			return Err(Error::InvalidWait(format!(
				"poll interval {:?} exceeds timeout {:?}",
				self.poll_interval, self.timeout
			)));
		}
		Ok(())
	}
}

/// Terminal result of one wait run.
///
/// Non-satisfaction is a value, not an exception: callers choose whether a
/// timeout retries, skips, or fails the step. Only invalid arguments,
/// permanent condition failures, and session loss surface as [`Err`].
#[derive(Debug)]
pub enum WaitOutcome<T> {
	Satisfied { value: T, elapsed: Duration },
	TimedOut {
		condition: String,
		elapsed: Duration,
		last: Option<String>,
	},
	Cancelled { elapsed: Duration },
}

impl<T> WaitOutcome<T> {
	pub fn is_satisfied(&self) -> bool {
		matches!(self, WaitOutcome::Satisfied { .. })
	}

	pub fn value(&self) -> Option<&T> {
		match self {
			WaitOutcome::Satisfied { value, .. } => Some(value),
			_ => None,
		}
	}

	/// Last observed condition state, for diagnostics.
	pub fn last_observed(&self) -> Option<&str> {
		match self {
			WaitOutcome::TimedOut { last, .. } => last.as_deref(),
			_ => None,
		}
	}

	/// Converts non-satisfaction into the corresponding typed error, for
	/// callers that treat it as failure.
	pub fn into_result(self) -> Result<T> {
		match self {
			WaitOutcome::Satisfied { value, .. } => Ok(value),
			WaitOutcome::TimedOut { condition, elapsed, last } => Err(Error::Timeout {
				condition,
				elapsed,
				last: last.unwrap_or_else(|| "never probed".into()),
			}),
			WaitOutcome::Cancelled { elapsed } => Err(Error::Cancelled { elapsed }),
		}
	}

	/// Serializable summary for step reports.
	pub fn summary(&self) -> WaitSummary {
		match self {
			WaitOutcome::Satisfied { elapsed, .. } => WaitSummary {
				resolution: "satisfied",
				elapsed_ms: elapsed.as_millis() as u64,
				last: None,
			},
			WaitOutcome::TimedOut { elapsed, last, .. } => WaitSummary {
				resolution: "timedOut",
				elapsed_ms: elapsed.as_millis() as u64,
				last: last.clone(),
			},
			WaitOutcome::Cancelled { elapsed } => WaitSummary {
				resolution: "cancelled",
				elapsed_ms: elapsed.as_millis() as u64,
				last: None,
			},
		}
	}
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitSummary {
	pub resolution: &'static str,
	pub elapsed_ms: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last: Option<String>,
}

/// Cancels in-flight waits. Cheap to clone signals from; idempotent.
pub struct CancelHandle {
	tx: watch::Sender<bool>,
}

impl CancelHandle {
	pub fn new() -> Self {
		let (tx, _rx) = watch::channel(false);
		Self { tx }
	}

	pub fn signal(&self) -> CancelSignal {
		CancelSignal {
			rx: self.tx.subscribe(),
		}
	}

	pub fn cancel(&self) {
		self.tx.send_replace(true);
	}

	pub fn is_cancelled(&self) -> bool {
		*self.tx.borrow()
	}
}

impl Default for CancelHandle {
	fn default() -> Self {
		Self::new()
	}
}

/// Level-triggered cancellation signal observed by wait runs.
///
/// A signal cancelled before a run starts still cancels it on the first tick.
#[derive(Clone)]
pub struct CancelSignal {
	rx: watch::Receiver<bool>,
}

impl CancelSignal {
	pub fn is_cancelled(&self) -> bool {
		*self.rx.borrow()
	}

	async fn cancelled(&mut self) {
		while !*self.rx.borrow_and_update() {
			if self.rx.changed().await.is_err() {
				// Handle dropped without cancelling; nothing will ever fire.
				std::future::pending::<()>().await;
			}
		}
	}
}

/// Polls conditions against a live session.
///
/// A run never blocks past `timeout + one poll interval`, satisfaction
/// returns immediately with no trailing sleep, and cancellation is observed
/// within one poll tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct WaitEngine {
	config: WaitConfig,
}

impl WaitEngine {
	pub fn new(config: WaitConfig) -> Self {
		Self { config }
	}

	pub fn config(&self) -> WaitConfig {
		self.config
	}

	/// Runs `condition` with this engine's default budget.
	pub async fn run<C>(
		&self,
		session: &dyn BrowsingSession,
		condition: &C,
	) -> Result<WaitOutcome<C::Output>>
	where
		C: Condition + ?Sized,
	{
		self.run_inner(session, condition, self.config, None).await
	}

	/// Runs `condition` with an overridden timeout.
	pub async fn run_for<C>(
		&self,
		session: &dyn BrowsingSession,
		condition: &C,
		timeout: Duration,
	) -> Result<WaitOutcome<C::Output>>
	where
		C: Condition + ?Sized,
	{
		let config = self.config.with_timeout(timeout);
		self.run_inner(session, condition, config, None).await
	}

	/// Runs `condition` under external cancellation.
	pub async fn run_cancellable<C>(
		&self,
		session: &dyn BrowsingSession,
		condition: &C,
		timeout: Duration,
		cancel: &CancelSignal,
	) -> Result<WaitOutcome<C::Output>>
	where
		C: Condition + ?Sized,
	{
		let config = self.config.with_timeout(timeout);
		self.run_inner(session, condition, config, Some(cancel.clone())).await
	}

	async fn run_inner<C>(
		&self,
		session: &dyn BrowsingSession,
		condition: &C,
		config: WaitConfig,
		mut cancel: Option<CancelSignal>,
	) -> Result<WaitOutcome<C::Output>>
	where
		C: Condition + ?Sized,
	{
		config.validate()?;

		let started = Instant::now();
		let deadline = started + config.timeout;
		let mut last: Option<String> = None;

		loop {
			if let Some(signal) = &cancel {
				if signal.is_cancelled() {
					debug!(target: "webstride.wait", condition = %condition.describe(), "cancelled");
					return Ok(WaitOutcome::Cancelled { elapsed: started.elapsed() });
				}
			}

			match condition.probe(session).await {
				Probe::Satisfied(value) => {
					trace!(
						target: "webstride.wait",
						condition = %condition.describe(),
						elapsed_ms = started.elapsed().as_millis() as u64,
						"satisfied"
					);
					return Ok(WaitOutcome::Satisfied {
						value,
						elapsed: started.elapsed(),
					});
				}
				Probe::Pending(reason) => {
					trace!(target: "webstride.wait", condition = %condition.describe(), %reason, "pending");
					last = Some(reason);
				}
				Probe::Halted(err) => {
					debug!(target: "webstride.wait", condition = %condition.describe(), error = %err, "halted");
					return Err(err);
				}
			}

			if Instant::now() >= deadline {
				let elapsed: Duration = started.elapsed();
				debug!(
					target: "webstride.wait",
					condition = %condition.describe(),
					elapsed_ms = elapsed.as_millis() as u64,
					last = last.as_deref().unwrap_or("-"),
					"timed out"
				);
				return Ok(WaitOutcome::TimedOut {
					condition: condition.describe(),
					elapsed,
					last,
				});
			}

			match &mut cancel {
				Some(signal) => {
					tokio::select! {
						_ = sleep(config.poll_interval) => {}
						_ = signal.cancelled() => {
							debug!(target: "webstride.wait", condition = %condition.describe(), "cancelled");
							return Ok(WaitOutcome::Cancelled { elapsed: started.elapsed() });
						}
					}
				}
				None => sleep(config.poll_interval).await,
			}
		}
	}
}
