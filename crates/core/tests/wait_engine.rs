//! Wait-engine polling, timeout, and cancellation behavior. These cases use a
//! [`ScriptedSession`] from `webstride-testkit`; because that crate depends on
//! `webstride`, they live here as integration tests rather than in-crate unit
//! tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::sleep;
use webstride::wait::FnCondition;
use webstride::{
	BrowsingSession, CancelHandle, Condition, Error, Probe, WaitConfig, WaitEngine, WaitOutcome,
	condition_fn, conditions,
};
use webstride_testkit::ScriptedSession;

fn ticking(succeed_at: usize) -> (FnCondition<usize>, Arc<AtomicUsize>) {
	let probes = Arc::new(AtomicUsize::new(0));
	let counter = probes.clone();
	let cond = condition_fn("tick counter", move |_s: &dyn BrowsingSession| {
		let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
		async move {
			if n >= succeed_at {
				Probe::Satisfied(n)
			} else {
				Probe::Pending(format!("tick {n}"))
			}
		}
		.boxed()
	});
	(cond, probes)
}

fn never() -> FnCondition<()> {
	condition_fn("the impossible", |_s: &dyn BrowsingSession| {
		async { Probe::Pending("still impossible".to_string()) }.boxed()
	})
}

#[tokio::test(start_paused = true)]
async fn satisfied_on_first_probe_returns_without_sleeping() {
	let session = ScriptedSession::new("about:blank");
	let (cond, probes) = ticking(1);

	let outcome = WaitEngine::default().run(&session, &cond).await.unwrap();
	assert_eq!(outcome.value(), Some(&1));
	assert_eq!(probes.load(Ordering::SeqCst), 1);
	match outcome {
		WaitOutcome::Satisfied { elapsed, .. } => assert_eq!(elapsed, Duration::ZERO),
		other => panic!("expected satisfied, got {other:?}"),
	}
}

#[tokio::test(start_paused = true)]
async fn does_not_report_success_before_the_condition_holds() {
	let session = ScriptedSession::new("about:blank");
	let (cond, probes) = ticking(4);

	let outcome = WaitEngine::default().run(&session, &cond).await.unwrap();
	assert_eq!(outcome.value(), Some(&4));
	// Exactly four probes: three pending ticks, then the satisfying one.
	assert_eq!(probes.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn timeout_elapsed_is_within_one_poll_interval_of_budget() {
	let session = ScriptedSession::new("about:blank");
	let timeout = Duration::from_secs(1);
	let poll = Duration::from_millis(300);
	let engine = WaitEngine::new(WaitConfig {
		timeout,
		poll_interval: poll,
	});

	let outcome = engine.run(&session, &never()).await.unwrap();
	match outcome {
		WaitOutcome::TimedOut { elapsed, last, .. } => {
			assert!(elapsed >= timeout, "returned before the deadline: {elapsed:?}");
			assert!(elapsed <= timeout + poll, "overran the budget: {elapsed:?}");
			assert_eq!(last.as_deref(), Some("still impossible"));
		}
		other => panic!("expected timeout, got {other:?}"),
	}
}

#[tokio::test(start_paused = true)]
async fn timed_out_converts_to_typed_error_with_last_observation() {
	let session = ScriptedSession::new("about:blank");
	let engine = WaitEngine::new(WaitConfig::default().with_timeout(Duration::from_secs(1)));

	let err = engine
		.run(&session, &never())
		.await
		.unwrap()
		.into_result()
		.unwrap_err();
	match err {
		Error::Timeout { condition, last, .. } => {
			assert_eq!(condition, "the impossible");
			assert_eq!(last, "still impossible");
		}
		other => panic!("expected timeout error, got {other}"),
	}
}

#[tokio::test(start_paused = true)]
async fn cancellation_is_distinct_and_observed_within_one_tick() {
	let session = ScriptedSession::new("about:blank");
	let engine = WaitEngine::new(WaitConfig {
		timeout: Duration::from_secs(60),
		poll_interval: Duration::from_millis(250),
	});
	let handle = CancelHandle::new();
	let signal = handle.signal();

	let cond = never();
	let waiter = engine.run_cancellable(&session, &cond, Duration::from_secs(60), &signal);
	let canceller = async {
		sleep(Duration::from_millis(600)).await;
		handle.cancel();
	};

	let (outcome, ()) = tokio::join!(waiter, canceller);
	match outcome.unwrap() {
		WaitOutcome::Cancelled { elapsed } => {
			// Observed at the select point of the in-flight tick.
			assert!(elapsed <= Duration::from_millis(850), "cancel was slow: {elapsed:?}");
		}
		other => panic!("expected cancelled, got {other:?}"),
	}
}

#[tokio::test(start_paused = true)]
async fn pre_cancelled_signal_cancels_on_first_tick() {
	let session = ScriptedSession::new("about:blank");
	let handle = CancelHandle::new();
	let signal = handle.signal();
	handle.cancel();

	let outcome = WaitEngine::default()
		.run_cancellable(&session, &never(), Duration::from_secs(60), &signal)
		.await
		.unwrap();
	assert!(matches!(outcome, WaitOutcome::Cancelled { .. }));
}

#[tokio::test(start_paused = true)]
async fn halted_probe_stops_polling_immediately() {
	let session = ScriptedSession::new("about:blank");
	let probes = Arc::new(AtomicUsize::new(0));
	let counter = probes.clone();
	let cond = condition_fn("doomed", move |_s: &dyn BrowsingSession| {
		counter.fetch_add(1, Ordering::SeqCst);
		async { Probe::<()>::Halted(Error::SessionLost("driver exited".into())) }.boxed()
	});

	let err = WaitEngine::default().run(&session, &cond).await.unwrap_err();
	assert!(matches!(err, Error::SessionLost(_)));
	assert_eq!(probes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_parameters_are_programmer_errors() {
	let session = ScriptedSession::new("about:blank");
	let engine = WaitEngine::new(WaitConfig {
		timeout: Duration::from_secs(1),
		poll_interval: Duration::from_secs(2),
	});

	let err = engine.run(&session, &never()).await.unwrap_err();
	assert!(matches!(err, Error::InvalidWait(_)));

	let engine = WaitEngine::new(WaitConfig {
		timeout: Duration::ZERO,
		poll_interval: Duration::from_millis(100),
	});
	let err = engine.run(&session, &never()).await.unwrap_err();
	assert!(matches!(err, Error::InvalidWait(_)));
}

#[tokio::test(start_paused = true)]
async fn outcome_summary_serializes_for_reports() {
	let session = ScriptedSession::new("about:blank");
	let engine = WaitEngine::new(WaitConfig::default().with_timeout(Duration::from_secs(1)));

	let outcome = engine.run(&session, &never()).await.unwrap();
	let json = serde_json::to_value(outcome.summary()).unwrap();
	assert_eq!(json["resolution"], "timedOut");
	assert_eq!(json["last"], "still impossible");
}

#[tokio::test(start_paused = true)]
async fn marker_discards_the_value_but_keeps_behavior() {
	let session = ScriptedSession::new("https://shop.example/inventory.html");
	let marker = conditions::url_contains("inventory").into_marker();

	let outcome = WaitEngine::default().run(&session, &*marker).await.unwrap();
	assert_eq!(outcome.value(), Some(&()));
}
