//! Scripted in-memory browsing session for exercising webstride suites
//! without a browser.
//!
//! The testkit follows trait-based dependency injection: [`ScriptedSession`]
//! implements [`BrowsingSession`] over plain in-memory state, and
//! [`StubAuthFlow`] implements [`AuthFlow`] against it. Script the world with
//! the `place_*`/`open_*` helpers, run the harness, then assert on recorded
//! [`actions()`](ScriptedSession::actions).
//!
//! # Example
//!
//! ```ignore
//! let session = ScriptedSession::new("https://shop.example/inventory.html");
//! let link = session.place_element(
//! 	"a.twitter",
//! 	ClickBehavior::OpenWindow("https://twitter.com/shop".into()),
//! );
//!
//! let element = session.find_element(&link).await?;
//! session.click(&element).await?;
//! assert_eq!(session.context_count(), 2);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;
use webstride::{
	AuthFlow, BrowsingSession, Condition, ContextHandle, Credentials, ElementHandle, Error,
	Locator, Marker, Result, conditions,
};

/// What a scripted element does when clicked.
#[derive(Clone, Debug)]
pub enum ClickBehavior {
	/// Nothing happens.
	Inert,
	/// The active context navigates in place (no new window).
	Navigate(String),
	/// One new context opens at the given URL; focus does not move.
	OpenWindow(String),
	/// Several contexts open at once, to provoke the one-new-context
	/// contract violation.
	OpenWindows(Vec<String>),
}

/// Action recorded by [`ScriptedSession`] for test assertions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedAction {
	Navigated { url: String },
	Clicked { locator: String },
	WentBack,
	SwitchedContext { handle: ContextHandle },
	ClosedContext { handle: ContextHandle },
}

#[derive(Clone, Debug)]
struct ScriptedContext {
	url: String,
	history: Vec<String>,
	elements: HashMap<String, ElementHandle>,
}

impl ScriptedContext {
	fn at(url: &str) -> Self {
		Self {
			url: url.to_string(),
			history: Vec::new(),
			elements: HashMap::new(),
		}
	}
}

#[derive(Debug)]
struct State {
	contexts: BTreeMap<ContextHandle, ScriptedContext>,
	active: ContextHandle,
	behaviors: HashMap<ElementHandle, ClickBehavior>,
	actions: Vec<RecordedAction>,
	navigations: usize,
	next_context: u32,
	next_element: u32,
	lost: bool,
}

/// In-memory [`BrowsingSession`] with scriptable click behavior.
///
/// Cloning yields another handle to the same session, so tests keep one
/// clone for scripting and assertions while the harness owns the other.
#[derive(Clone)]
pub struct ScriptedSession {
	state: Arc<Mutex<State>>,
}

impl ScriptedSession {
	/// Creates a session with a single context focused at `url`.
	pub fn new(url: &str) -> Self {
		let main = ContextHandle::new("w1");
		let mut contexts = BTreeMap::new();
		contexts.insert(main.clone(), ScriptedContext::at(url));
		Self {
			state: Arc::new(Mutex::new(State {
				contexts,
				active: main,
				behaviors: HashMap::new(),
				actions: Vec::new(),
				navigations: 0,
				next_context: 2,
				next_element: 1,
				lost: false,
			})),
		}
	}

	/// Places a clickable element in the active context and returns the
	/// locator that finds it.
	pub fn place_element(&self, selector: &str, behavior: ClickBehavior) -> Locator {
		let mut state = self.state.lock();
		let id = state.next_element;
		state.next_element += 1;
		let element = ElementHandle::new(format!("e{id}"));
		state.behaviors.insert(element.clone(), behavior);
		let active = state.active.clone();
		state
			.contexts
			.get_mut(&active)
			.expect("active context exists")
			.elements
			.insert(selector.to_string(), element);
		Locator::new(selector)
	}

	/// Opens a context directly (as if by the page itself), without a click.
	pub fn open_context(&self, url: &str) -> ContextHandle {
		let mut state = self.state.lock();
		Self::insert_context(&mut state, url)
	}

	/// Simulates the driver process dying: every later call fails with
	/// `SessionLost`.
	pub fn kill(&self) {
		self.state.lock().lost = true;
	}

	pub fn context_count(&self) -> usize {
		self.state.lock().contexts.len()
	}

	/// Number of navigations performed so far (clicks that navigate count).
	pub fn navigation_count(&self) -> usize {
		self.state.lock().navigations
	}

	pub fn actions(&self) -> Vec<RecordedAction> {
		self.state.lock().actions.clone()
	}

	fn insert_context(state: &mut State, url: &str) -> ContextHandle {
		let handle = ContextHandle::new(format!("w{}", state.next_context));
		state.next_context += 1;
		state.contexts.insert(handle.clone(), ScriptedContext::at(url));
		trace!(target: "webstride.testkit", context = %handle, %url, "context opened");
		handle
	}

	fn check_alive(state: &State) -> Result<()> {
		if state.lost {
			Err(Error::SessionLost("scripted driver terminated".into()))
		} else {
			Ok(())
		}
	}

	fn active_mut(state: &mut State) -> Result<&mut ScriptedContext> {
		let active = state.active.clone();
		state
			.contexts
			.get_mut(&active)
			.ok_or(Error::ContextNotFound { handle: active })
	}
}

#[async_trait]
impl BrowsingSession for ScriptedSession {
	async fn navigate(&self, url: &str) -> Result<()> {
		let mut state = self.state.lock();
		Self::check_alive(&state)?;
		state.actions.push(RecordedAction::Navigated { url: url.to_string() });
		state.navigations += 1;
		let context = Self::active_mut(&mut state)?;
		let previous = std::mem::replace(&mut context.url, url.to_string());
		context.history.push(previous);
		Ok(())
	}

	async fn back(&self) -> Result<()> {
		let mut state = self.state.lock();
		Self::check_alive(&state)?;
		state.actions.push(RecordedAction::WentBack);
		let context = Self::active_mut(&mut state)?;
		if let Some(previous) = context.history.pop() {
			context.url = previous;
		}
		Ok(())
	}

	async fn find_element(&self, locator: &Locator) -> Result<ElementHandle> {
		let mut state = self.state.lock();
		Self::check_alive(&state)?;
		let context = Self::active_mut(&mut state)?;
		context
			.elements
			.get(locator.as_str())
			.cloned()
			.ok_or_else(|| Error::ElementNotFound {
				locator: locator.to_string(),
			})
	}

	async fn click(&self, element: &ElementHandle) -> Result<()> {
		let mut state = self.state.lock();
		Self::check_alive(&state)?;

		let locator = {
			let context = Self::active_mut(&mut state)?;
			context
				.elements
				.iter()
				.find(|(_, e)| *e == element)
				.map(|(selector, _)| selector.clone())
				.ok_or_else(|| Error::ElementNotFound {
					locator: format!("element '{}'", element.as_str()),
				})?
		};
		state.actions.push(RecordedAction::Clicked { locator });

		let behavior = state
			.behaviors
			.get(element)
			.cloned()
			.unwrap_or(ClickBehavior::Inert);
		match behavior {
			ClickBehavior::Inert => {}
			ClickBehavior::Navigate(url) => {
				state.navigations += 1;
				let context = Self::active_mut(&mut state)?;
				let previous = std::mem::replace(&mut context.url, url);
				context.history.push(previous);
			}
			ClickBehavior::OpenWindow(url) => {
				Self::insert_context(&mut state, &url);
			}
			ClickBehavior::OpenWindows(urls) => {
				for url in urls {
					Self::insert_context(&mut state, &url);
				}
			}
		}
		Ok(())
	}

	async fn current_url(&self) -> Result<String> {
		let mut state = self.state.lock();
		Self::check_alive(&state)?;
		Ok(Self::active_mut(&mut state)?.url.clone())
	}

	async fn list_contexts(&self) -> Result<BTreeSet<ContextHandle>> {
		let state = self.state.lock();
		Self::check_alive(&state)?;
		Ok(state.contexts.keys().cloned().collect())
	}

	async fn active_context(&self) -> Result<ContextHandle> {
		let state = self.state.lock();
		Self::check_alive(&state)?;
		if !state.contexts.contains_key(&state.active) {
			return Err(Error::ContextNotFound {
				handle: state.active.clone(),
			});
		}
		Ok(state.active.clone())
	}

	async fn switch_context(&self, handle: &ContextHandle) -> Result<()> {
		let mut state = self.state.lock();
		Self::check_alive(&state)?;
		if !state.contexts.contains_key(handle) {
			return Err(Error::ContextNotFound { handle: handle.clone() });
		}
		state.active = handle.clone();
		state.actions.push(RecordedAction::SwitchedContext { handle: handle.clone() });
		Ok(())
	}

	async fn close_context(&self, handle: &ContextHandle) -> Result<()> {
		let mut state = self.state.lock();
		Self::check_alive(&state)?;
		if state.contexts.remove(handle).is_none() {
			return Err(Error::ContextNotFound { handle: handle.clone() });
		}
		state.actions.push(RecordedAction::ClosedContext { handle: handle.clone() });
		Ok(())
	}
}

/// [`AuthFlow`] over a [`ScriptedSession`]: login navigates to the home page
/// when the identity is accepted, back to the login page with an error query
/// otherwise. Markers are URL-based, the way the sites this models confirm
/// auth transitions.
pub struct StubAuthFlow {
	login_url: String,
	home_url: String,
	accepted: Vec<String>,
}

impl StubAuthFlow {
	pub fn new(
		login_url: impl Into<String>,
		home_url: impl Into<String>,
		accepted: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		Self {
			login_url: login_url.into(),
			home_url: home_url.into(),
			accepted: accepted.into_iter().map(Into::into).collect(),
		}
	}

	/// A typical storefront shape: index page, inventory page, a couple of
	/// known-good users.
	pub fn shop_example() -> Self {
		Self::new(
			"https://shop.example/index.html",
			"https://shop.example/inventory.html",
			["standard_user", "other_user"],
		)
	}
}

#[async_trait]
impl AuthFlow for StubAuthFlow {
	async fn perform_login(
		&self,
		session: &dyn BrowsingSession,
		credentials: &Credentials,
	) -> Result<()> {
		if self.accepted.iter().any(|id| id == credentials.identity()) {
			session.navigate(&self.home_url).await
		} else {
			session
				.navigate(&format!("{}?error=credentials", self.login_url))
				.await
		}
	}

	async fn perform_logout(&self, session: &dyn BrowsingSession) -> Result<()> {
		session.navigate(&self.login_url).await
	}

	fn logged_in_marker(&self) -> Marker {
		conditions::url_contains(self.home_url.clone()).into_marker()
	}

	fn logged_out_marker(&self) -> Marker {
		conditions::url_contains(self.login_url.clone()).into_marker()
	}
}
