//! webstride: synchronization and multi-window orchestration core for
//! ordered browser test suites.
//!
//! Ordered UI suites share one browser session across steps, wait on page
//! conditions, and click links that open (or don't open) new tabs. The glue
//! around those suites is trivial; the synchronization underneath them is
//! not, and it is what this crate generalizes:
//!
//! - [`WaitEngine`]: the single explicit-wait path, polling a [`Condition`]
//!   with one inspectable timeout, typed timeout outcomes, and prompt
//!   cancellation.
//! - [`WindowRegistry`]: snapshot-diff tracking of browsing contexts with
//!   focus-safe switch and close-and-return operations.
//! - [`ExternalLinkVerifier`]: open → verify → clean up for external links,
//!   handling both new-tab and same-context navigations, always restoring
//!   the original context.
//! - [`SessionController`]: confirmed login/logout transitions over the one
//!   shared session.
//! - [`OrderedStepScheduler`]: runs a [`Suite`] strictly in order, isolating
//!   step failures and guaranteeing one teardown.
//!
//! The crate is a library consumed by a test runner. It drives whatever
//! driver the runner adapts to [`BrowsingSession`]; locators, assertions,
//! and credentials are opaque inputs.
//!
//! # Example
//!
//! ```ignore
//! use futures_util::FutureExt;
//! use webstride::{
//! 	Credentials, OrderedStepScheduler, Precondition, SessionController, Step, Suite,
//! 	SuiteConfig, WaitEngine,
//! };
//!
//! let mut controller = SessionController::new(session, auth_flow, WaitEngine::default());
//! let suite = Suite::builder()
//! 	.step(Step::new(1, "login lands on inventory", Precondition::Authenticated, |c| {
//! 		async move {
//! 			c.wait()
//! 				.run(c.session(), &webstride::conditions::url_contains("inventory"))
//! 				.await?
//! 				.into_result()?;
//! 			Ok(())
//! 		}
//! 		.boxed()
//! 	}))
//! 	.build()?;
//!
//! let config = SuiteConfig::new(Credentials::new("standard_user", "secret_sauce"));
//! let report = OrderedStepScheduler::new(config).run(suite, &mut controller).await;
//! assert!(report.all_passed());
//! ```

pub mod auth;
pub mod error;
pub mod session;
pub mod suite;
pub mod verifier;
pub mod wait;
pub mod windows;

pub use auth::{AuthFlow, Credentials, SessionController, SessionState};
pub use error::{Error, Result};
pub use session::{BrowsingSession, ContextHandle, ElementHandle, Locator};
pub use suite::{
	OrderedStepScheduler, Precondition, SkipReason, Step, StepOutcome, StepReport, Suite,
	SuiteConfig, SuiteReport, SuiteStatus,
};
pub use verifier::{ExternalLinkVerifier, LinkVerdict, VerifyConfig};
pub use wait::conditions;
pub use wait::{
	CancelHandle, CancelSignal, Condition, Marker, Probe, WaitConfig, WaitEngine, WaitOutcome,
	condition_fn,
};
pub use windows::{WindowRegistry, WindowSnapshot};
