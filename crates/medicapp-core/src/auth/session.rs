use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::TokenPair;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Storage key for the bearer access credential
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Storage key for the refresh credential
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Storage key for the authenticated flag; only the literal `"true"` counts
pub const IS_AUTHENTICATED_KEY: &str = "isAuthenticated";
/// Storage key for the viewer role
pub const USER_STATUS_KEY: &str = "userStatus";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode session file: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key-value storage backing the session.
///
/// Every value is a string. Implementations must keep operations synchronous
/// and short, callers never hold anything across an `.await` while using them.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

fn lock(map: &Mutex<HashMap<String, String>>) -> MutexGuard<'_, HashMap<String, String>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-local store, used by tests and short-lived callers.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.values).remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        lock(&self.values).clear();
        Ok(())
    }
}

/// Store persisted as a flat JSON object in `<cache_dir>/session.json`.
///
/// The file is rewritten on every mutation so a crash never loses a refreshed
/// credential.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileSessionStore {
    /// Open the store, loading any session left by a previous run.
    pub fn open(cache_dir: &Path) -> Result<Self, StoreError> {
        let path = cache_dir.join(SESSION_FILE);
        let values = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            HashMap::new()
        };
        debug!(path = %path.display(), keys = values.len(), "Session store opened");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, values: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = lock(&self.values);
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }

    /// The in-memory map is only emptied once the file is gone, so a failed
    /// clear leaves memory and disk in agreement.
    fn clear(&self) -> Result<(), StoreError> {
        let mut values = lock(&self.values);
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        values.clear();
        Ok(())
    }
}

/// Classification of the signed-in viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerRole {
    #[default]
    Regular,
    SystemAdmin,
}

impl ViewerRole {
    /// Parse the stored `userStatus` value. Anything but `system_admin` is regular.
    pub fn from_status(status: Option<&str>) -> Self {
        match status {
            Some("system_admin") => ViewerRole::SystemAdmin,
            _ => ViewerRole::Regular,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewerRole::Regular => "regular",
            ViewerRole::SystemAdmin => "system_admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, ViewerRole::SystemAdmin)
    }
}

impl fmt::Display for ViewerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time read of every session key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub is_authenticated: bool,
    pub role: ViewerRole,
}

impl SessionData {
    /// The flag is set and an access credential is actually present.
    pub fn has_valid_session(&self) -> bool {
        self.is_authenticated && self.access_token.is_some()
    }
}

/// Typed view over a shared [`SessionStore`].
///
/// Clone is cheap, every clone reads and writes the same store.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    fn non_empty(&self, key: &str) -> Option<String> {
        self.store.get(key).filter(|v| !v.is_empty())
    }

    /// Get the bearer token if one is stored
    pub fn access_token(&self) -> Option<String> {
        self.non_empty(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.non_empty(REFRESH_TOKEN_KEY)
    }

    pub fn role(&self) -> ViewerRole {
        ViewerRole::from_status(self.store.get(USER_STATUS_KEY).as_deref())
    }

    pub fn snapshot(&self) -> SessionData {
        SessionData {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
            is_authenticated: self.store.get(IS_AUTHENTICATED_KEY).as_deref() == Some("true"),
            role: self.role(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot().has_valid_session()
    }

    /// Write a freshly issued credential pair. The flag is only ever written
    /// together with the access credential.
    pub fn establish(&self, tokens: &TokenPair, role: ViewerRole) -> Result<(), StoreError> {
        self.store.set(ACCESS_TOKEN_KEY, &tokens.access)?;
        self.store.set(REFRESH_TOKEN_KEY, &tokens.refresh)?;
        self.store.set(USER_STATUS_KEY, role.as_str())?;
        self.store.set(IS_AUTHENTICATED_KEY, "true")?;
        info!(role = %role, "Session established");
        Ok(())
    }

    pub fn replace_access_token(&self, token: &str) -> Result<(), StoreError> {
        self.store.set(ACCESS_TOKEN_KEY, token)?;
        debug!("Access token replaced after refresh");
        Ok(())
    }

    /// Clear every session key, returning the role that was stored beforehand.
    pub fn destroy(&self) -> Result<ViewerRole, StoreError> {
        let role = self.role();
        self.store.clear()?;
        info!(role = %role, "Session destroyed");
        Ok(role)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.snapshot();
        f.debug_struct("Session")
            .field("has_access_token", &data.access_token.is_some())
            .field("has_refresh_token", &data.refresh_token.is_some())
            .field("is_authenticated", &data.is_authenticated)
            .field("role", &data.role)
            .finish()
    }
}
