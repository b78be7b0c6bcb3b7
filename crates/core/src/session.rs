//! The driver capability consumed by the harness.
//!
//! The core never talks to a browser directly. Whatever automation driver the
//! surrounding test code configures is adapted to [`BrowsingSession`], and the
//! harness observes and orchestrates through that seam only. Handles are
//! opaque: the core compares them and passes them back, it never constructs
//! or parses them.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Stable identity of one tab or window within a driver session.
///
/// Ordered and hashable so handle sets can be snapshotted and diffed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ContextHandle(String);

impl ContextHandle {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ContextHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Driver-assigned identity of a located element.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

/// Opaque element query supplied by the surrounding test definitions.
///
/// The core never interprets the string; it only forwards it to the driver.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
	pub fn new(query: impl Into<String>) -> Self {
		Self(query.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Locator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// One live browser session, as seen by the harness.
///
/// Implementations report expected absence as [`Error::ElementNotFound`]
/// (conditions translate that into a pending probe, not a raised failure),
/// stale handles as [`Error::ContextNotFound`], and a dead driver process or
/// connection as [`Error::SessionLost`].
///
/// [`Error::ElementNotFound`]: crate::Error::ElementNotFound
/// [`Error::ContextNotFound`]: crate::Error::ContextNotFound
/// [`Error::SessionLost`]: crate::Error::SessionLost
#[async_trait]
pub trait BrowsingSession: Send + Sync {
	/// Navigates the active context to `url`.
	async fn navigate(&self, url: &str) -> Result<()>;

	/// Navigates the active context one entry back in its history.
	async fn back(&self) -> Result<()>;

	/// Locates an element in the active context.
	async fn find_element(&self, locator: &Locator) -> Result<ElementHandle>;

	/// Clicks a previously located element.
	async fn click(&self, element: &ElementHandle) -> Result<()>;

	/// Returns the active context's current URL.
	async fn current_url(&self) -> Result<String>;

	/// Returns the full set of open context handles.
	async fn list_contexts(&self) -> Result<BTreeSet<ContextHandle>>;

	/// Returns the handle of the currently focused context.
	async fn active_context(&self) -> Result<ContextHandle>;

	/// Moves input/query focus to the given context.
	async fn switch_context(&self, handle: &ContextHandle) -> Result<()>;

	/// Closes the given context. Does not move focus.
	async fn close_context(&self, handle: &ContextHandle) -> Result<()>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn context_handles_are_ordered_and_comparable() {
		let a = ContextHandle::new("w1");
		let b = ContextHandle::new("w2");
		assert!(a < b);
		assert_eq!(a, ContextHandle::new("w1"));

		let set: BTreeSet<_> = [b.clone(), a.clone()].into();
		assert_eq!(set.iter().next(), Some(&a));
	}

	#[test]
	fn context_handle_serializes_transparently() {
		let handle = ContextHandle::new("w7");
		assert_eq!(serde_json::to_string(&handle).unwrap(), "\"w7\"");
	}
}
