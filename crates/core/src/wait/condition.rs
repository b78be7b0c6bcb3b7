//! Conditions: pure predicates evaluated repeatedly by the wait engine.

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::error::Error;
use crate::session::BrowsingSession;

/// Result of one condition evaluation.
#[derive(Debug)]
pub enum Probe<T> {
	/// The condition holds; polling stops and `T` is handed to the caller.
	Satisfied(T),
	/// Not yet; the reason is kept as the last-observed state for diagnostics.
	Pending(String),
	/// The condition can never hold anymore (context closed, session dead).
	/// Polling stops immediately and the error is raised.
	Halted(Error),
}

/// A pure predicate over live session state.
///
/// Conditions must only read; they never mutate page or focus state. Expected
/// "not yet present" states are reported as [`Probe::Pending`], never raised
/// as errors; exception-driven presence checks are exactly the pattern this
/// replaces.
#[async_trait]
pub trait Condition: Send + Sync {
	type Output: Send;

	/// Evaluates the predicate against the session once.
	async fn probe(&self, session: &dyn BrowsingSession) -> Probe<Self::Output>;

	/// Human-readable description used in timeout diagnostics and logs.
	fn describe(&self) -> String;

	/// Erases the output for callers that only care whether the condition held.
	fn into_marker(self) -> Marker
	where
		Self: Sized + 'static,
	{
		Box::new(Discard(self))
	}
}

/// A boxed condition whose satisfying value has been discarded.
pub type Marker = Box<dyn Condition<Output = ()>>;

/// Adapter that keeps a condition's pass/pending behavior but drops its value.
pub struct Discard<C>(pub C);

#[async_trait]
impl<C: Condition> Condition for Discard<C> {
	type Output = ();

	async fn probe(&self, session: &dyn BrowsingSession) -> Probe<()> {
		match self.0.probe(session).await {
			Probe::Satisfied(_) => Probe::Satisfied(()),
			Probe::Pending(reason) => Probe::Pending(reason),
			Probe::Halted(err) => Probe::Halted(err),
		}
	}

	fn describe(&self) -> String {
		self.0.describe()
	}
}

/// Condition built from a closure.
///
/// ```ignore
/// use futures_util::FutureExt;
///
/// let cond = condition_fn("two contexts open", move |s| {
/// 	async move {
/// 		match s.list_contexts().await {
/// 			Ok(handles) if handles.len() >= 2 => Probe::Satisfied(handles),
/// 			Ok(handles) => Probe::Pending(format!("{} contexts open", handles.len())),
/// 			Err(err) => Probe::Halted(err),
/// 		}
/// 	}
/// 	.boxed()
/// });
/// ```
pub struct FnCondition<T> {
	label: String,
	probe: Box<dyn for<'a> Fn(&'a dyn BrowsingSession) -> BoxFuture<'a, Probe<T>> + Send + Sync>,
}

pub fn condition_fn<T, F>(label: impl Into<String>, probe: F) -> FnCondition<T>
where
	T: Send + 'static,
	F: for<'a> Fn(&'a dyn BrowsingSession) -> BoxFuture<'a, Probe<T>> + Send + Sync + 'static,
{
	FnCondition {
		label: label.into(),
		probe: Box::new(probe),
	}
}

#[async_trait]
impl<T: Send + 'static> Condition for FnCondition<T> {
	type Output = T;

	async fn probe(&self, session: &dyn BrowsingSession) -> Probe<T> {
		(self.probe)(session).await
	}

	fn describe(&self) -> String {
		self.label.clone()
	}
}
