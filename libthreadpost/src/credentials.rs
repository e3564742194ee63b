//! Saved login credentials
//!
//! After a successful login the handle and app password are remembered so
//! the next run can sign in without prompting. This is a convenience only:
//! every operation here is best effort for callers, which log failures and
//! carry on.
//!
//! # Backends
//!
//! - `LocalCredentialCache`: stores both values in the local state file
//! - `KeyringCredentialCache`: OS-native secure storage via `keyring`
//! - `NoCredentialCache`: never remembers anything
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use libthreadpost::credentials::{CredentialCache, LocalCredentialCache};
//! use libthreadpost::store::MemoryStore;
//!
//! # fn example() -> libthreadpost::Result<()> {
//! let cache = LocalCredentialCache::new(Arc::new(MemoryStore::new()));
//! cache.save("alice.bsky.social", "abcd-efgh-ijkl-mnop")?;
//!
//! if let Some(saved) = cache.load()? {
//!     println!("Saved handle: {}", saved.handle);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use secrecy::SecretString;

use crate::config::CredentialBackend;
use crate::error::{Result, StorageError};
use crate::store::{LocalStore, APP_PASSWORD_KEY, HANDLE_KEY};

/// Keyring service name
const KEYRING_SERVICE: &str = "threadpost.bluesky";

/// A remembered handle and app password
#[derive(Debug)]
pub struct SavedCredentials {
    pub handle: String,
    pub app_password: SecretString,
}

/// Storage for the re-login convenience pair
pub trait CredentialCache: Send + Sync {
    fn save(&self, handle: &str, app_password: &str) -> Result<()>;

    /// Returns `None` unless both values are present
    fn load(&self) -> Result<Option<SavedCredentials>>;

    fn clear(&self) -> Result<()>;

    fn backend_name(&self) -> &str;
}

/// Credentials kept in the local state file
pub struct LocalCredentialCache {
    store: Arc<dyn LocalStore>,
}

impl LocalCredentialCache {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }
}

impl CredentialCache for LocalCredentialCache {
    fn save(&self, handle: &str, app_password: &str) -> Result<()> {
        self.store.set(HANDLE_KEY, handle)?;
        self.store.set(APP_PASSWORD_KEY, app_password)?;
        tracing::debug!("Saved credentials for {} in local state", handle);
        Ok(())
    }

    fn load(&self) -> Result<Option<SavedCredentials>> {
        let handle = self.store.get(HANDLE_KEY)?;
        let password = self.store.get(APP_PASSWORD_KEY)?;

        Ok(match (handle, password) {
            (Some(handle), Some(password)) => Some(SavedCredentials {
                handle,
                app_password: SecretString::from(password),
            }),
            _ => None,
        })
    }

    fn clear(&self) -> Result<()> {
        self.store.remove(HANDLE_KEY)?;
        self.store.remove(APP_PASSWORD_KEY)?;
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "local"
    }
}

/// OS keyring storage
///
/// - **macOS**: Keychain
/// - **Windows**: Credential Manager
/// - **Linux**: Secret Service (GNOME Keyring/KWallet) via D-Bus
///
/// Headless systems often have no keyring; every call then fails with
/// `StorageError::Keyring` and the caller falls back to prompting.
pub struct KeyringCredentialCache {
    service: String,
}

impl KeyringCredentialCache {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| StorageError::Keyring(format!("OS keyring not accessible: {}", e)).into())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StorageError::Keyring(e.to_string()).into()),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError::Keyring(e.to_string()).into()),
        }
    }
}

impl Default for KeyringCredentialCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialCache for KeyringCredentialCache {
    fn save(&self, handle: &str, app_password: &str) -> Result<()> {
        self.entry("handle")?
            .set_password(handle)
            .map_err(|e| StorageError::Keyring(e.to_string()))?;
        self.entry("app_password")?
            .set_password(app_password)
            .map_err(|e| StorageError::Keyring(e.to_string()))?;
        tracing::debug!("Saved credentials for {} in OS keyring", handle);
        Ok(())
    }

    fn load(&self) -> Result<Option<SavedCredentials>> {
        let handle = self.get("handle")?;
        let password = self.get("app_password")?;

        Ok(match (handle, password) {
            (Some(handle), Some(password)) => Some(SavedCredentials {
                handle,
                app_password: SecretString::from(password),
            }),
            _ => None,
        })
    }

    fn clear(&self) -> Result<()> {
        self.delete("handle")?;
        self.delete("app_password")?;
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "keyring"
    }
}

/// Never remembers credentials
pub struct NoCredentialCache;

impl CredentialCache for NoCredentialCache {
    fn save(&self, _handle: &str, _app_password: &str) -> Result<()> {
        Ok(())
    }

    fn load(&self) -> Result<Option<SavedCredentials>> {
        Ok(None)
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "none"
    }
}

/// Build the cache selected in configuration
pub fn credential_cache(
    backend: CredentialBackend,
    store: Arc<dyn LocalStore>,
) -> Arc<dyn CredentialCache> {
    match backend {
        CredentialBackend::Local => Arc::new(LocalCredentialCache::new(store)),
        CredentialBackend::Keyring => Arc::new(KeyringCredentialCache::new()),
        CredentialBackend::None => Arc::new(NoCredentialCache),
    }
}
