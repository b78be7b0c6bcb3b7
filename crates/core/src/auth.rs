//! Session-state ownership: idempotent login/logout with confirmed
//! transitions.
//!
//! State only moves after the corresponding marker condition is observed.
//! Claiming `Authenticated` right after clicking a login button, without
//! confirming the login actually landed, is the recurring bug this
//! component exists to rule out.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::session::BrowsingSession;
use crate::wait::{Marker, WaitEngine, WaitOutcome};

/// Authentication state of the shared browser session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum SessionState {
	Anonymous,
	Authenticated { identity: String },
}

impl SessionState {
	pub fn is_authenticated(&self) -> bool {
		matches!(self, SessionState::Authenticated { .. })
	}

	pub fn identity(&self) -> Option<&str> {
		match self {
			SessionState::Authenticated { identity } => Some(identity),
			SessionState::Anonymous => None,
		}
	}
}

/// Opaque login material supplied by suite setup.
#[derive(Clone)]
pub struct Credentials {
	identity: String,
	secret: String,
}

impl Credentials {
	pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
		Self {
			identity: identity.into(),
			secret: secret.into(),
		}
	}

	pub fn identity(&self) -> &str {
		&self.identity
	}

	pub fn secret(&self) -> &str {
		&self.secret
	}
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("identity", &self.identity)
			.field("secret", &"<redacted>")
			.finish()
	}
}

/// Site-specific login/logout actions and their confirmation markers.
///
/// The actions carry the locators and form interactions this crate does not
/// own; the markers are how the controller decides a transition actually
/// happened.
#[async_trait]
pub trait AuthFlow: Send + Sync {
	/// Performs the login interaction (navigate, fill, submit).
	async fn perform_login(
		&self,
		session: &dyn BrowsingSession,
		credentials: &Credentials,
	) -> Result<()>;

	/// Performs the logout interaction.
	async fn perform_logout(&self, session: &dyn BrowsingSession) -> Result<()>;

	/// Condition that holds once login has landed (URL pattern or landmark).
	fn logged_in_marker(&self) -> Marker;

	/// Condition that holds once logout has landed.
	fn logged_out_marker(&self) -> Marker;
}

/// Owns the single browser session for a suite's lifetime.
///
/// The scheduler threads one controller through every step; there is no
/// ambient driver reference anywhere.
pub struct SessionController {
	session: Box<dyn BrowsingSession>,
	flow: Box<dyn AuthFlow>,
	wait: WaitEngine,
	state: SessionState,
}

impl SessionController {
	pub fn new(
		session: Box<dyn BrowsingSession>,
		flow: Box<dyn AuthFlow>,
		wait: WaitEngine,
	) -> Self {
		Self {
			session,
			flow,
			wait,
			state: SessionState::Anonymous,
		}
	}

	pub fn session(&self) -> &dyn BrowsingSession {
		self.session.as_ref()
	}

	pub fn wait(&self) -> &WaitEngine {
		&self.wait
	}

	pub fn state(&self) -> &SessionState {
		&self.state
	}

	/// Brings the session to `Authenticated` as `credentials.identity()`.
	///
	/// Already authenticated as the same identity: no-op. As a different
	/// identity: logs out first. The transition is recorded only after the
	/// logged-in marker confirms; on marker timeout the state remains
	/// `Anonymous` and [`Error::LoginFailed`] carries the last observation,
	/// so downstream steps re-attempt instead of proceeding on a false
	/// premise.
	pub async fn ensure_authenticated(&mut self, credentials: &Credentials) -> Result<&SessionState> {
		if let SessionState::Authenticated { identity } = &self.state {
			if identity == credentials.identity() {
				debug!(target: "webstride.session", %identity, "already authenticated");
				return Ok(&self.state);
			}
			let previous = identity.clone();
			debug!(
				target: "webstride.session",
				from = %previous,
				to = %credentials.identity(),
				"switching identity"
			);
			self.logout().await?;
		}

		self.flow.perform_login(self.session.as_ref(), credentials).await?;

		let marker = self.flow.logged_in_marker();
		match self.wait.run(self.session.as_ref(), &*marker).await? {
			WaitOutcome::Satisfied { .. } => {
				self.state = SessionState::Authenticated {
					identity: credentials.identity().to_string(),
				};
				info!(target: "webstride.session", identity = %credentials.identity(), "authenticated");
				Ok(&self.state)
			}
			WaitOutcome::TimedOut { last, .. } => Err(Error::LoginFailed {
				identity: credentials.identity().to_string(),
				last: last.unwrap_or_else(|| "marker never probed".into()),
			}),
			WaitOutcome::Cancelled { elapsed } => Err(Error::Cancelled { elapsed }),
		}
	}

	/// Brings the session to `Anonymous`.
	///
	/// Idempotent: several steps call this defensively, so logging out while
	/// already anonymous is a no-op, not an error.
	pub async fn logout(&mut self) -> Result<()> {
		if !self.state.is_authenticated() {
			debug!(target: "webstride.session", "logout requested while anonymous; nothing to do");
			return Ok(());
		}

		self.flow.perform_logout(self.session.as_ref()).await?;

		let marker = self.flow.logged_out_marker();
		self.wait
			.run(self.session.as_ref(), &*marker)
			.await?
			.into_result()?;

		self.state = SessionState::Anonymous;
		info!(target: "webstride.session", "logged out");
		Ok(())
	}

	/// End-of-suite reset. Best-effort logout, then the state is `Anonymous`
	/// unconditionally; the session is being destroyed either way.
	pub async fn teardown(&mut self) {
		if self.state.is_authenticated() {
			if let Err(err) = self.logout().await {
				warn!(target: "webstride.session", error = %err, "logout during teardown failed");
			}
		}
		self.state = SessionState::Anonymous;
		debug!(target: "webstride.session", "session torn down");
	}
}
