//! Per-navigation access gate for guarded screens.

use tracing::{debug, error, warn};

use super::policy::{entry_screen_for, is_admin_scoped, REGULAR_DASHBOARD};
use super::{Session, SessionData, ViewerRole};

/// Viewer classification derived from stored session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Unauthenticated,
    AuthenticatedRegular,
    AuthenticatedAdmin,
}

impl GuardState {
    pub fn from_session(data: &SessionData) -> Self {
        if !data.has_valid_session() {
            GuardState::Unauthenticated
        } else if data.role == ViewerRole::SystemAdmin {
            GuardState::AuthenticatedAdmin
        } else {
            GuardState::AuthenticatedRegular
        }
    }
}

/// Outcome of a navigation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    Redirect(&'static str),
}

impl GuardDecision {
    pub fn is_render(&self) -> bool {
        matches!(self, GuardDecision::Render)
    }
}

/// Decide what happens when a viewer with `data` requests `path`.
///
/// Pure: no storage access, no network.
pub fn decide(data: &SessionData, path: &str) -> GuardDecision {
    match GuardState::from_session(data) {
        GuardState::Unauthenticated => GuardDecision::Redirect(entry_screen_for(data.role)),
        GuardState::AuthenticatedRegular if is_admin_scoped(path) => {
            GuardDecision::Redirect(REGULAR_DASHBOARD)
        }
        GuardState::AuthenticatedRegular | GuardState::AuthenticatedAdmin => GuardDecision::Render,
    }
}

/// Gate evaluated fresh on every navigation to a guarded screen.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    session: Session,
}

impl RouteGuard {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Evaluate a navigation. An unauthenticated viewer also has any stale
    /// session keys cleared before being redirected; the redirect stands even
    /// when clearing fails.
    pub fn check(&self, path: &str) -> GuardDecision {
        let data = self.session.snapshot();
        let decision = decide(&data, path);

        if GuardState::from_session(&data) == GuardState::Unauthenticated {
            match self.session.destroy() {
                Ok(_) => warn!(path = path, role = %data.role, "Unauthenticated navigation, session cleared"),
                Err(e) => error!(path = path, error = %e, "Unauthenticated navigation, failed to clear session"),
            }
        }

        debug!(path = path, ?decision, "Route guard evaluated");
        decision
    }
}
