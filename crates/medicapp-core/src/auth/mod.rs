//! Session and authorization layer.
//!
//! This module provides:
//! - `Session`: typed view over an injectable `SessionStore` holding the
//!   access/refresh credentials, the authenticated flag and the viewer role
//! - `RouteGuard`: per-navigation gate for guarded screens
//! - `policy`: well-known screens and the role → redirect policy
//! - `CredentialStore`: optional OS keychain storage for login passwords
//!
//! No expiry is tracked locally; an expired access credential is discovered
//! when the API answers 401 (see `api::ApiClient`).

pub mod credentials;
pub mod guard;
pub mod policy;
pub mod session;

pub use credentials::CredentialStore;
pub use guard::{decide, GuardDecision, GuardState, RouteGuard};
pub use policy::{dashboard_for, entry_screen_for, is_admin_scoped, is_public};
pub use session::{
    FileSessionStore, MemorySessionStore, Session, SessionData, SessionStore, StoreError,
    ViewerRole, ACCESS_TOKEN_KEY, IS_AUTHENTICATED_KEY, REFRESH_TOKEN_KEY, USER_STATUS_KEY,
};
