//! Built-in conditions covering the recurring waits of ordered suites:
//! URL checks, element presence, and window-count checks.

use std::collections::BTreeSet;

use async_trait::async_trait;
use url::Url;

use crate::error::Error;
use crate::session::{BrowsingSession, ContextHandle, ElementHandle, Locator};
use crate::wait::condition::{Condition, Probe};

/// Satisfied when the active context's URL contains `fragment`.
pub fn url_contains(fragment: impl Into<String>) -> UrlContains {
	UrlContains {
		fragment: fragment.into(),
	}
}

pub struct UrlContains {
	fragment: String,
}

#[async_trait]
impl Condition for UrlContains {
	type Output = String;

	async fn probe(&self, session: &dyn BrowsingSession) -> Probe<String> {
		match session.current_url().await {
			Ok(url) if url.contains(&self.fragment) => Probe::Satisfied(url),
			Ok(url) => Probe::Pending(format!("url is '{url}'")),
			Err(err) => Probe::Halted(err),
		}
	}

	fn describe(&self) -> String {
		format!("url to contain '{}'", self.fragment)
	}
}

/// Satisfied when the active context's URL is on the given domain.
///
/// Matches against the parsed host; URLs that fail to parse fall back to
/// whole-string containment, since drivers occasionally report interstitial
/// pseudo-URLs.
pub fn url_on_domain(domain: impl Into<String>) -> UrlOnDomain {
	UrlOnDomain {
		domain: domain.into(),
	}
}

pub struct UrlOnDomain {
	domain: String,
}

#[async_trait]
impl Condition for UrlOnDomain {
	type Output = String;

	async fn probe(&self, session: &dyn BrowsingSession) -> Probe<String> {
		match session.current_url().await {
			Ok(url) if domain_matches(&url, &self.domain) => Probe::Satisfied(url),
			Ok(url) => Probe::Pending(format!("url is '{url}'")),
			Err(err) => Probe::Halted(err),
		}
	}

	fn describe(&self) -> String {
		format!("url to be on domain '{}'", self.domain)
	}
}

/// Whether `url`'s host (or, unparseable, the raw string) contains `domain`.
pub fn domain_matches(url: &str, domain: &str) -> bool {
	match Url::parse(url) {
		Ok(parsed) => parsed.host_str().is_some_and(|host| host.contains(domain)),
		Err(_) => url.contains(domain),
	}
}

/// Satisfied when the locator resolves in the active context.
///
/// A driver `ElementNotFound` is an expected not-yet state and probes as
/// pending; every other driver failure halts the wait.
pub fn element_present(locator: Locator) -> ElementPresent {
	ElementPresent { locator }
}

pub struct ElementPresent {
	locator: Locator,
}

#[async_trait]
impl Condition for ElementPresent {
	type Output = ElementHandle;

	async fn probe(&self, session: &dyn BrowsingSession) -> Probe<ElementHandle> {
		match session.find_element(&self.locator).await {
			Ok(element) => Probe::Satisfied(element),
			Err(Error::ElementNotFound { .. }) => {
				Probe::Pending(format!("'{}' not present", self.locator))
			}
			Err(err) => Probe::Halted(err),
		}
	}

	fn describe(&self) -> String {
		format!("element '{}' to be present", self.locator)
	}
}

/// Satisfied when exactly `expected` contexts are open.
pub fn context_count_is(expected: usize) -> ContextCountIs {
	ContextCountIs { expected }
}

pub struct ContextCountIs {
	expected: usize,
}

#[async_trait]
impl Condition for ContextCountIs {
	type Output = BTreeSet<ContextHandle>;

	async fn probe(&self, session: &dyn BrowsingSession) -> Probe<BTreeSet<ContextHandle>> {
		match session.list_contexts().await {
			Ok(handles) if handles.len() == self.expected => Probe::Satisfied(handles),
			Ok(handles) => Probe::Pending(format!("{} contexts open", handles.len())),
			Err(err) => Probe::Halted(err),
		}
	}

	fn describe(&self) -> String {
		format!("context count to be {}", self.expected)
	}
}

/// Satisfied when more than `baseline` contexts are open.
pub fn context_count_exceeds(baseline: usize) -> ContextCountExceeds {
	ContextCountExceeds { baseline }
}

pub struct ContextCountExceeds {
	baseline: usize,
}

#[async_trait]
impl Condition for ContextCountExceeds {
	type Output = BTreeSet<ContextHandle>;

	async fn probe(&self, session: &dyn BrowsingSession) -> Probe<BTreeSet<ContextHandle>> {
		match session.list_contexts().await {
			Ok(handles) if handles.len() > self.baseline => Probe::Satisfied(handles),
			Ok(handles) => Probe::Pending(format!("{} contexts open", handles.len())),
			Err(err) => Probe::Halted(err),
		}
	}

	fn describe(&self) -> String {
		format!("context count to exceed {}", self.baseline)
	}
}
