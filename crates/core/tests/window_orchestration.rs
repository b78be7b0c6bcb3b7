//! Multi-window orchestration scenarios: the restore invariant on every
//! path, the same-context degenerate case, and the one-new-context contract.

use std::time::Duration;

use webstride::{
	BrowsingSession, Error, ExternalLinkVerifier, LinkVerdict, VerifyConfig, WaitConfig,
	WaitEngine, WindowRegistry,
};
use webstride_testkit::{ClickBehavior, RecordedAction, ScriptedSession};

fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

fn fast_engine() -> WaitEngine {
	WaitEngine::new(WaitConfig {
		timeout: Duration::from_secs(2),
		poll_interval: Duration::from_millis(50),
	})
}

async fn click_via(session: &ScriptedSession, locator: &webstride::Locator) -> webstride::Result<()> {
	let element = session.find_element(locator).await?;
	session.click(&element).await
}

#[tokio::test(start_paused = true)]
async fn new_tab_link_is_verified_closed_and_focus_restored() {
	init_tracing();
	let session = ScriptedSession::new("https://shop.example/inventory.html");
	let link = session.place_element(
		"a.twitter",
		ClickBehavior::OpenWindow("https://twitter.com/shop".into()),
	);

	let engine = fast_engine();
	let registry = WindowRegistry::new(&session, &engine);
	let verifier = ExternalLinkVerifier::new(&registry);

	let before = session.active_context().await.unwrap();
	let verdict = verifier
		.verify(|| click_via(&session, &link), "twitter.com")
		.await
		.unwrap();

	match verdict {
		LinkVerdict::NewContext { url, .. } => assert!(url.contains("twitter.com")),
		other => panic!("expected new-context path, got {other:?}"),
	}
	assert_eq!(session.active_context().await.unwrap(), before);
	assert_eq!(session.context_count(), 1, "auxiliary context must be closed");
}

#[tokio::test(start_paused = true)]
async fn domain_mismatch_still_restores_the_original_context() {
	init_tracing();
	let session = ScriptedSession::new("https://shop.example/inventory.html");
	let link = session.place_element(
		"a.twitter",
		ClickBehavior::OpenWindow("https://tracking.example/interstitial".into()),
	);

	let engine = fast_engine();
	let registry = WindowRegistry::new(&session, &engine);
	let verifier = ExternalLinkVerifier::new(&registry);

	let before = session.active_context().await.unwrap();
	let err = verifier
		.verify(|| click_via(&session, &link), "twitter.com")
		.await
		.unwrap_err();

	match err {
		Error::DomainMismatch { expected, actual } => {
			assert_eq!(expected, "twitter.com");
			assert!(actual.contains("tracking.example"));
		}
		other => panic!("expected domain mismatch, got {other}"),
	}
	// The central invariant: failure paths restore focus too.
	assert_eq!(session.active_context().await.unwrap(), before);
	assert_eq!(session.context_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn same_context_navigation_is_detected_and_backed_out() {
	init_tracing();
	let session = ScriptedSession::new("https://shop.example/inventory.html");
	let link = session.place_element(
		"a.twitter",
		ClickBehavior::Navigate("https://twitter.com/shop".into()),
	);

	let engine = fast_engine();
	let registry = WindowRegistry::new(&session, &engine);
	let verifier = ExternalLinkVerifier::with_config(&registry, VerifyConfig::for_timeout(Duration::from_secs(2)));

	let before = session.active_context().await.unwrap();
	let verdict = verifier
		.verify(|| click_via(&session, &link), "twitter.com")
		.await
		.unwrap();

	assert_eq!(
		verdict,
		LinkVerdict::SameContext {
			url: "https://twitter.com/shop".into()
		}
	);
	assert_eq!(session.active_context().await.unwrap(), before);
	assert_eq!(
		session.current_url().await.unwrap(),
		"https://shop.example/inventory.html",
		"history.back() must recover the origin page"
	);
	assert!(session.actions().contains(&RecordedAction::WentBack));
}

#[tokio::test(start_paused = true)]
async fn inert_trigger_reports_no_new_context_and_no_navigation() {
	init_tracing();
	let session = ScriptedSession::new("https://shop.example/inventory.html");
	let link = session.place_element("a.dead", ClickBehavior::Inert);

	let engine = fast_engine();
	let registry = WindowRegistry::new(&session, &engine);
	let verifier = ExternalLinkVerifier::with_config(&registry, VerifyConfig::for_timeout(Duration::from_secs(2)));

	let err = verifier
		.verify(|| click_via(&session, &link), "twitter.com")
		.await
		.unwrap_err();

	match err {
		Error::NoNewContextAndNoNavigation { url } => {
			assert_eq!(url, "https://shop.example/inventory.html");
		}
		other => panic!("expected no-effect error, got {other}"),
	}
	assert_eq!(session.context_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn double_window_trigger_is_a_contract_violation_not_a_guess() {
	init_tracing();
	let session = ScriptedSession::new("https://shop.example/inventory.html");
	let link = session.place_element(
		"a.burst",
		ClickBehavior::OpenWindows(vec![
			"https://twitter.com/shop".into(),
			"https://facebook.com/shop".into(),
		]),
	);

	let engine = fast_engine();
	let registry = WindowRegistry::new(&session, &engine);
	let verifier = ExternalLinkVerifier::new(&registry);

	let before = session.active_context().await.unwrap();
	let err = verifier
		.verify(|| click_via(&session, &link), "twitter.com")
		.await
		.unwrap_err();

	assert!(matches!(err, Error::MultipleContextsOpened { handles } if handles.len() == 2));
	// Focus never moved, so the invariant holds trivially.
	assert_eq!(session.active_context().await.unwrap(), before);
}

#[tokio::test(start_paused = true)]
async fn consecutive_verifications_share_one_origin_cleanly() {
	init_tracing();
	let session = ScriptedSession::new("https://shop.example/inventory.html");
	let twitter = session.place_element(
		"a.twitter",
		ClickBehavior::OpenWindow("https://twitter.com/shop".into()),
	);
	let facebook = session.place_element(
		"a.facebook",
		ClickBehavior::OpenWindow("https://www.facebook.com/shop".into()),
	);
	let linkedin = session.place_element(
		"a.linkedin",
		ClickBehavior::OpenWindow("https://www.linkedin.com/company/shop".into()),
	);

	let engine = fast_engine();
	let registry = WindowRegistry::new(&session, &engine);
	let verifier = ExternalLinkVerifier::new(&registry);

	let before = session.active_context().await.unwrap();
	for (link, domain) in [
		(&twitter, "twitter.com"),
		(&facebook, "facebook.com"),
		(&linkedin, "linkedin.com"),
	] {
		let verdict = verifier
			.verify(|| click_via(&session, link), domain)
			.await
			.unwrap();
		assert!(verdict.url().contains(domain));
		assert_eq!(session.active_context().await.unwrap(), before);
		assert_eq!(session.context_count(), 1);
	}
}
