//! Ordered step execution against one shared session.
//!
//! Steps run strictly in ascending order because later steps depend on the
//! state earlier ones leave behind; ordering is a correctness requirement,
//! not a reporting convenience. A failing step is isolated: it is recorded
//! and the suite moves on, and teardown runs exactly once no matter what.

use std::fmt;
use std::time::Instant;

use futures_util::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::auth::{Credentials, SessionController};
use crate::error::{Error, Result};

/// Session state a step requires before its body may run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Precondition {
	#[default]
	None,
	Authenticated,
}

type StepBody =
	Box<dyn for<'a> FnOnce(&'a mut SessionController) -> BoxFuture<'a, Result<()>> + Send>;

/// One scheduled step: a unique order, a precondition, and a body that
/// receives the shared controller.
pub struct Step {
	order: u32,
	name: String,
	precondition: Precondition,
	body: StepBody,
}

impl Step {
	pub fn new<F>(order: u32, name: impl Into<String>, precondition: Precondition, body: F) -> Self
	where
		F: for<'a> FnOnce(&'a mut SessionController) -> BoxFuture<'a, Result<()>> + Send + 'static,
	{
		Self {
			order,
			name: name.into(),
			precondition,
			body: Box::new(body),
		}
	}

	pub fn order(&self) -> u32 {
		self.order
	}

	pub fn name(&self) -> &str {
		&self.name
	}
}

impl fmt::Debug for Step {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Step")
			.field("order", &self.order)
			.field("name", &self.name)
			.field("precondition", &self.precondition)
			.finish_non_exhaustive()
	}
}

/// An ordered, validated sequence of steps.
#[derive(Debug)]
pub struct Suite {
	steps: Vec<Step>,
}

impl Suite {
	pub fn builder() -> SuiteBuilder {
		SuiteBuilder { steps: Vec::new() }
	}

	pub fn len(&self) -> usize {
		self.steps.len()
	}

	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}
}

pub struct SuiteBuilder {
	steps: Vec<Step>,
}

impl SuiteBuilder {
	pub fn step(mut self, step: Step) -> Self {
		self.steps.push(step);
		self
	}

	/// Sorts by order and rejects duplicates; two steps with the same order
	/// would make the execution sequence ambiguous.
	pub fn build(mut self) -> Result<Suite> {
		self.steps.sort_by_key(|step| step.order);
		for pair in self.steps.windows(2) {
			if pair[0].order == pair[1].order {
				return Err(Error::InvalidSuite(format!(
					"steps '{}' and '{}' share order {}",
					pair[0].name, pair[1].name, pair[0].order
				)));
			}
		}
		Ok(Suite { steps: self.steps })
	}
}

/// Why a step was skipped instead of run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
	/// Required session state could not be established; an environment
	/// problem, not a defect in the step's own logic.
	PreconditionFailed,
	/// The suite aborted after the driver session died.
	SessionLost,
}

/// Terminal state of one step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum StepOutcome {
	Passed,
	Failed { kind: &'static str, error: String },
	Skipped { reason: SkipReason, detail: String },
}

impl StepOutcome {
	fn failed(err: &Error) -> Self {
		StepOutcome::Failed {
			kind: err.kind(),
			error: err.to_string(),
		}
	}

	fn skipped(reason: SkipReason, err: &Error) -> Self {
		StepOutcome::Skipped {
			reason,
			detail: err.to_string(),
		}
	}
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
	pub order: u32,
	pub name: String,
	pub outcome: StepOutcome,
	pub elapsed_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SuiteStatus {
	NotStarted,
	InProgress,
	Completed,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteReport {
	pub status: SuiteStatus,
	pub steps: Vec<StepReport>,
}

impl SuiteReport {
	pub fn passed(&self) -> usize {
		self.count(|o| matches!(o, StepOutcome::Passed))
	}

	pub fn failed(&self) -> usize {
		self.count(|o| matches!(o, StepOutcome::Failed { .. }))
	}

	pub fn skipped(&self) -> usize {
		self.count(|o| matches!(o, StepOutcome::Skipped { .. }))
	}

	pub fn all_passed(&self) -> bool {
		self.failed() == 0 && self.skipped() == 0
	}

	fn count(&self, pred: impl Fn(&StepOutcome) -> bool) -> usize {
		self.steps.iter().filter(|s| pred(&s.outcome)).count()
	}
}

/// Suite-level execution defaults.
#[derive(Clone, Debug)]
pub struct SuiteConfig {
	/// Credentials used to satisfy `Precondition::Authenticated`.
	pub credentials: Credentials,
}

impl SuiteConfig {
	pub fn new(credentials: Credentials) -> Self {
		Self { credentials }
	}
}

/// Drives a [`Suite`] against one [`SessionController`].
pub struct OrderedStepScheduler {
	config: SuiteConfig,
}

impl OrderedStepScheduler {
	pub fn new(config: SuiteConfig) -> Self {
		Self { config }
	}

	/// Runs every step in ascending order and returns the full report.
	///
	/// Failures never escape as errors: each step's outcome is recorded and
	/// execution continues, except after [`Error::SessionLost`], which marks
	/// the remaining steps skipped. Teardown runs exactly once on every path.
	pub async fn run(&self, suite: Suite, controller: &mut SessionController) -> SuiteReport {
		info!(target: "webstride.suite", steps = suite.steps.len(), "suite started");
		let mut reports = Vec::with_capacity(suite.steps.len());
		let mut lost: Option<String> = None;

		for step in suite.steps {
			if let Some(detail) = &lost {
				reports.push(StepReport {
					order: step.order,
					name: step.name,
					outcome: StepOutcome::skipped(
						SkipReason::SessionLost,
						&Error::SessionLost(detail.clone()),
					),
					elapsed_ms: 0,
				});
				continue;
			}

			let started = Instant::now();
			let (outcome, fatal) = Self::run_step(
				step.order,
				&step.name,
				step.precondition,
				step.body,
				controller,
				&self.config.credentials,
			)
			.await;
			if fatal.is_some() {
				lost = fatal;
			}

			reports.push(StepReport {
				order: step.order,
				name: step.name,
				outcome,
				elapsed_ms: started.elapsed().as_millis() as u64,
			});
		}

		// Scoped acquisition of the whole session: teardown exactly once,
		// also on the fatal-abort path.
		controller.teardown().await;

		let report = SuiteReport {
			status: SuiteStatus::Completed,
			steps: reports,
		};
		info!(
			target: "webstride.suite",
			passed = report.passed(),
			failed = report.failed(),
			skipped = report.skipped(),
			"suite completed"
		);
		report
	}

	/// Returns the step outcome plus the session-loss detail when the error
	/// was fatal, so the caller can abort the remainder.
	async fn run_step(
		order: u32,
		name: &str,
		precondition: Precondition,
		body: StepBody,
		controller: &mut SessionController,
		credentials: &Credentials,
	) -> (StepOutcome, Option<String>) {
		if precondition == Precondition::Authenticated && !controller.state().is_authenticated() {
			debug!(target: "webstride.suite", step = name, "establishing authenticated precondition");
			if let Err(err) = controller.ensure_authenticated(credentials).await {
				warn!(target: "webstride.suite", step = name, error = %err, "precondition failed; skipping");
				let fatal = err.is_fatal().then(|| err.to_string());
				let reason = if err.is_fatal() {
					SkipReason::SessionLost
				} else {
					SkipReason::PreconditionFailed
				};
				return (StepOutcome::skipped(reason, &err), fatal);
			}
		}

		info!(target: "webstride.suite", order, step = name, "step running");
		match body(controller).await {
			Ok(()) => {
				info!(target: "webstride.suite", order, step = name, "step passed");
				(StepOutcome::Passed, None)
			}
			Err(err) => {
				error!(target: "webstride.suite", order, step = name, error = %err, "step failed");
				let fatal = err.is_fatal().then(|| err.to_string());
				(StepOutcome::failed(&err), fatal)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use futures_util::FutureExt;

	use super::*;

	fn noop_step(order: u32, name: &str) -> Step {
		Step::new(order, name, Precondition::None, |_controller| {
			async { Ok(()) }.boxed()
		})
	}

	#[test]
	fn builder_sorts_steps_by_order() {
		let suite = Suite::builder()
			.step(noop_step(30, "third"))
			.step(noop_step(10, "first"))
			.step(noop_step(20, "second"))
			.build()
			.unwrap();

		let names: Vec<_> = suite.steps.iter().map(|s| s.name.clone()).collect();
		assert_eq!(names, ["first", "second", "third"]);
	}

	#[test]
	fn builder_rejects_duplicate_orders() {
		let err = Suite::builder()
			.step(noop_step(10, "a"))
			.step(noop_step(10, "b"))
			.build()
			.unwrap_err();
		assert!(matches!(err, Error::InvalidSuite(_)));
		assert!(err.to_string().contains("share order 10"));
	}

	#[test]
	fn report_counts_by_outcome() {
		let report = SuiteReport {
			status: SuiteStatus::Completed,
			steps: vec![
				StepReport {
					order: 1,
					name: "a".into(),
					outcome: StepOutcome::Passed,
					elapsed_ms: 5,
				},
				StepReport {
					order: 2,
					name: "b".into(),
					outcome: StepOutcome::Failed {
						kind: "timeout",
						error: "timed out".into(),
					},
					elapsed_ms: 100,
				},
				StepReport {
					order: 3,
					name: "c".into(),
					outcome: StepOutcome::Skipped {
						reason: SkipReason::PreconditionFailed,
						detail: "login failed".into(),
					},
					elapsed_ms: 0,
				},
			],
		};

		assert_eq!(report.passed(), 1);
		assert_eq!(report.failed(), 1);
		assert_eq!(report.skipped(), 1);
		assert!(!report.all_passed());
	}

	#[test]
	fn report_serializes_camel_case() {
		let report = StepReport {
			order: 2,
			name: "open external link".into(),
			outcome: StepOutcome::Skipped {
				reason: SkipReason::PreconditionFailed,
				detail: "login failed".into(),
			},
			elapsed_ms: 12,
		};
		let json = serde_json::to_value(&report).unwrap();
		assert_eq!(json["elapsedMs"], 12);
		assert_eq!(json["outcome"]["status"], "skipped");
		assert_eq!(json["outcome"]["reason"], "preconditionFailed");
	}
}
