//! Screen navigation sink.
//!
//! The session layer never renders anything itself; when it has to move the
//! viewer (forced logout, post-login landing) it tells a `Navigator`.

use std::sync::Mutex;

use tracing::info;

pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Navigator that remembers every redirect it was asked to perform.
///
/// The CLI uses it to report where the viewer ended up; tests use it to assert
/// on forced redirects.
#[derive(Debug, Default)]
pub struct NavigationLog {
    visited: Mutex<Vec<String>>,
}

impl NavigationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<String> {
        self.visited
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<String> {
        self.history().pop()
    }
}

impl Navigator for NavigationLog {
    fn navigate(&self, path: &str) {
        info!(path = path, "Navigating");
        self.visited
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(path.to_string());
    }
}
