use anyhow::{Context, Result};
use keyring::Entry;

use super::ViewerRole;

const SERVICE_NAME: &str = "medicapp";

/// Remembered login passwords, kept in the OS keychain.
///
/// Admin and regular portals are separate accounts on the API, so the entry is
/// keyed by role as well as username.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(username: &str, role: ViewerRole) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &Self::account(username, role))
            .context("Failed to create keyring entry")
    }

    fn account(username: &str, role: ViewerRole) -> String {
        format!("{}:{}", role.as_str(), username)
    }

    /// Store a password in the OS keychain
    pub fn store(username: &str, role: ViewerRole, password: &str) -> Result<()> {
        Self::entry(username, role)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    /// Retrieve a remembered password, `None` when nothing is stored
    pub fn get_password(username: &str, role: ViewerRole) -> Result<Option<String>> {
        match Self::entry(username, role)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve password from keychain"),
        }
    }

    /// Delete a remembered password; missing entries are not an error
    pub fn delete(username: &str, role: ViewerRole) -> Result<()> {
        match Self::entry(username, role)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}
