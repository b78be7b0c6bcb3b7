//! External-link verification: trigger a click, find where it went, verify
//! the destination domain, and put the session back exactly as it was.
//!
//! Target sites are inconsistent about honoring `target=_blank`, so two
//! outcomes are legitimate: a new context opens (close it and switch back),
//! or the same context navigates (verify, then go back in history). Both
//! paths end with focus on the context that was active before the trigger.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::session::ContextHandle;
use crate::wait::conditions::url_on_domain;
use crate::wait::{DEFAULT_TIMEOUT, WaitOutcome};
use crate::windows::WindowRegistry;

/// Minimum budget granted to new-context detection.
const MIN_GRACE: Duration = Duration::from_millis(500);

/// Budgets for one verification run.
///
/// `grace` bounds new-context detection only; the full `timeout` governs the
/// URL check on whichever path is taken.
#[derive(Clone, Copy, Debug)]
pub struct VerifyConfig {
	pub timeout: Duration,
	pub grace: Duration,
}

impl VerifyConfig {
	/// Derives the grace sub-timeout as a quarter of the budget, floored so
	/// slow drivers still get a usable detection window.
	pub fn for_timeout(timeout: Duration) -> Self {
		Self {
			timeout,
			grace: (timeout / 4).max(MIN_GRACE).min(timeout),
		}
	}
}

impl Default for VerifyConfig {
	fn default() -> Self {
		Self::for_timeout(DEFAULT_TIMEOUT)
	}
}

/// Which navigation path the trigger actually took.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "path")]
pub enum LinkVerdict {
	/// A new context opened; it was verified, closed, and focus restored.
	NewContext { context: ContextHandle, url: String },
	/// The same context navigated; it was verified and history-backed out.
	SameContext { url: String },
}

impl LinkVerdict {
	pub fn url(&self) -> &str {
		match self {
			LinkVerdict::NewContext { url, .. } | LinkVerdict::SameContext { url } => url,
		}
	}
}

/// Orchestrates open → verify → clean up for links that leave the site.
pub struct ExternalLinkVerifier<'a> {
	registry: &'a WindowRegistry<'a>,
	config: VerifyConfig,
}

impl<'a> ExternalLinkVerifier<'a> {
	pub fn new(registry: &'a WindowRegistry<'a>) -> Self {
		Self {
			registry,
			config: VerifyConfig::default(),
		}
	}

	pub fn with_config(registry: &'a WindowRegistry<'a>, config: VerifyConfig) -> Self {
		Self { registry, config }
	}

	/// Fires `trigger` and verifies that it reaches `expected_domain`.
	///
	/// `trigger` is the caller's click action, the only side effect this
	/// component does not own. Whatever happens after it, the context that
	/// was active before the call is active again when this returns.
	pub async fn verify<Fut>(
		&self,
		trigger: impl FnOnce() -> Fut,
		expected_domain: &str,
	) -> Result<LinkVerdict>
	where
		Fut: Future<Output = Result<()>>,
	{
		// Baseline strictly before the trigger; a post-trigger snapshot would
		// race against the opening context.
		let baseline = self.registry.snapshot().await?;
		let origin = self.registry.active_context().await?;
		let origin_url = self.registry.session().current_url().await?;

		trigger().await?;

		match self.registry.await_new_context(&baseline, self.config.grace).await {
			Ok(opened) => self.verify_new_context(opened, &origin, expected_domain).await,
			Err(Error::Timeout { .. }) => {
				self.verify_same_context(&origin_url, expected_domain).await
			}
			Err(err) => Err(err),
		}
	}

	async fn verify_new_context(
		&self,
		opened: ContextHandle,
		origin: &ContextHandle,
		expected_domain: &str,
	) -> Result<LinkVerdict> {
		if let Err(err) = self.registry.switch_to(&opened).await {
			// Never verified anything, but the context may linger: close it
			// and make sure focus is back home before reporting.
			if let Err(cleanup) = self.registry.close_and_return(&opened, origin).await {
				warn!(target: "webstride.verify", error = %cleanup, "cleanup after failed switch");
			}
			return Err(err);
		}

		let checked = self.check_domain(expected_domain).await;
		let cleanup = self.registry.close_and_return(&opened, origin).await;

		match (checked, cleanup) {
			(Ok(url), Ok(())) => {
				debug!(target: "webstride.verify", %url, "external link verified in new context");
				Ok(LinkVerdict::NewContext { context: opened, url })
			}
			(Err(err), Ok(())) => Err(err),
			(Err(err), Err(cleanup_err)) => {
				warn!(target: "webstride.verify", error = %cleanup_err, "cleanup also failed");
				Err(err)
			}
			(Ok(_), Err(cleanup_err)) => Err(cleanup_err),
		}
	}

	async fn verify_same_context(
		&self,
		origin_url: &str,
		expected_domain: &str,
	) -> Result<LinkVerdict> {
		// No new handle appeared within the grace budget. Either the site
		// navigated this context in place, or the trigger did nothing.
		let remaining = self.config.timeout.saturating_sub(self.config.grace);
		let outcome = match self.check_domain_for(expected_domain, remaining).await {
			Ok(url) => Ok(url),
			Err(Error::DomainMismatch { actual, .. }) if actual == origin_url => {
				return Err(Error::NoNewContextAndNoNavigation {
					url: origin_url.to_string(),
				});
			}
			Err(err) => Err(err),
		};
		let url = outcome?;

		debug!(target: "webstride.verify", %url, "same-context navigation; backing out");
		self.registry.session().back().await?;
		Ok(LinkVerdict::SameContext { url })
	}

	async fn check_domain(&self, expected_domain: &str) -> Result<String> {
		self.check_domain_for(expected_domain, self.config.timeout).await
	}

	async fn check_domain_for(&self, expected_domain: &str, timeout: Duration) -> Result<String> {
		let condition = url_on_domain(expected_domain);
		let session = self.registry.session();
		let timeout = timeout.max(MIN_GRACE);
		match self.registry.wait().run_for(session, &condition, timeout).await? {
			WaitOutcome::Satisfied { value, .. } => Ok(value),
			WaitOutcome::TimedOut { .. } => {
				let actual = session.current_url().await.unwrap_or_else(|_| "<unknown>".into());
				Err(Error::DomainMismatch {
					expected: expected_domain.to_string(),
					actual,
				})
			}
			WaitOutcome::Cancelled { elapsed } => Err(Error::Cancelled { elapsed }),
		}
	}
}
