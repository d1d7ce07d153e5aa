//! Well-known screens and the role → screen redirect policy.

use super::ViewerRole;

/// Regular viewer login screen
pub const REGULAR_ENTRY: &str = "/";
/// System admin login screen
pub const ADMIN_ENTRY: &str = "/master";
/// Regular dashboard root
pub const REGULAR_DASHBOARD: &str = "/dashboard";
/// Admin dashboard root; everything below it is admin-scoped
pub const ADMIN_DASHBOARD: &str = "/admin";
/// Public doctor self-registration screen
pub const REGISTER: &str = "/register";
/// Public admin registration screen
pub const ADMIN_REGISTER: &str = "/admin-register";

/// Screen a viewer is sent to when their session ends.
pub fn entry_screen_for(role: ViewerRole) -> &'static str {
    match role {
        ViewerRole::SystemAdmin => ADMIN_ENTRY,
        ViewerRole::Regular => REGULAR_ENTRY,
    }
}

/// Screen a viewer lands on after signing in.
pub fn dashboard_for(role: ViewerRole) -> &'static str {
    match role {
        ViewerRole::SystemAdmin => ADMIN_DASHBOARD,
        ViewerRole::Regular => REGULAR_DASHBOARD,
    }
}

/// `/admin` itself or anything nested below it. `/admin-register` is not.
pub fn is_admin_scoped(path: &str) -> bool {
    path == ADMIN_DASHBOARD
        || path
            .strip_prefix(ADMIN_DASHBOARD)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Screens reachable without a session.
pub fn is_public(path: &str) -> bool {
    matches!(path, REGULAR_ENTRY | ADMIN_ENTRY | REGISTER | ADMIN_REGISTER)
}
