//! Session management
//!
//! Owns the single in-memory session. Credentials are checked locally before
//! any network call, and a successful login is remembered in the credential
//! cache for the next run.

use std::sync::{Arc, RwLock};

use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::api::BlueskyApi;
use crate::credentials::{CredentialCache, SavedCredentials};
use crate::error::{Result, ValidationError};
use crate::types::Session;

/// Minimum plausible app password length
pub const MIN_SECRET_LEN: usize = 10;

/// Zero-width and bidi-override characters that sneak in via copy and paste
const INVISIBLE: [char; 7] = [
    '\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}', '\u{202C}', '\u{202D}', '\u{202E}',
];

/// Normalize a handle and check that it looks complete
///
/// Strips surrounding whitespace, one leading `@` and invisible characters.
/// The result must contain a `.` (e.g. `name.bsky.social`).
pub fn validate_identifier(raw: &str) -> std::result::Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingCredentials);
    }

    let without_at = trimmed.strip_prefix('@').unwrap_or(trimmed);
    let cleaned: String = without_at.chars().filter(|c| !INVISIBLE.contains(c)).collect();
    let cleaned = cleaned.trim().to_string();

    if !cleaned.contains('.') {
        return Err(ValidationError::InvalidHandle(cleaned));
    }
    Ok(cleaned)
}

/// Check the app password and return it trimmed
pub fn validate_secret(raw: &str) -> std::result::Result<&str, ValidationError> {
    let secret = raw.trim();
    if secret.is_empty() {
        return Err(ValidationError::MissingCredentials);
    }
    if secret.chars().count() < MIN_SECRET_LEN {
        return Err(ValidationError::SecretTooShort {
            min: MIN_SECRET_LEN,
        });
    }
    Ok(secret)
}

pub struct SessionManager {
    api: Arc<dyn BlueskyApi>,
    credentials: Arc<dyn CredentialCache>,
    current: RwLock<Option<Arc<Session>>>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn BlueskyApi>, credentials: Arc<dyn CredentialCache>) -> Self {
        Self {
            api,
            credentials,
            current: RwLock::new(None),
        }
    }

    /// Log in and make the new session current
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a malformed handle or short secret (no network call)
    /// - `AuthError::InvalidCredentials` / `AuthError::ServerRejected` from the server
    /// - `ApiError::Network` if the server is unreachable
    pub async fn authenticate(&self, identifier: &str, secret: &str) -> Result<Arc<Session>> {
        let handle = validate_identifier(identifier)?;
        let secret = validate_secret(secret)?;

        debug!("Authenticating {} via {}", handle, self.api.name());
        let created = self.api.create_session(&handle, secret).await?;
        let session = Arc::new(created.into_session());

        if let Err(e) = self.credentials.save(&handle, secret) {
            warn!(
                "Could not save credentials ({} backend): {}",
                self.credentials.backend_name(),
                e
            );
        }

        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&session));
        info!("Signed in as {}", session.handle);
        Ok(session)
    }

    /// Log in with the remembered credentials, if there are any
    pub async fn resume(&self) -> Result<Option<Arc<Session>>> {
        match self.saved_credentials() {
            Some(saved) => {
                let session = self
                    .authenticate(&saved.handle, saved.app_password.expose_secret())
                    .await?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Forget the in-memory session; nothing is revoked server-side
    pub fn end_session(&self) {
        let previous = self.current.write().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(session) = previous {
            info!("Signed out {}", session.handle);
        }
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The active session, or `ValidationError::NoSession`
    pub fn require(&self) -> Result<Arc<Session>> {
        self.current().ok_or_else(|| ValidationError::NoSession.into())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    /// Remembered credentials; read failures count as "none"
    pub fn saved_credentials(&self) -> Option<SavedCredentials> {
        match self.credentials.load() {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Could not read saved credentials: {}", e);
                None
            }
        }
    }

    pub fn forget_credentials(&self) {
        if let Err(e) = self.credentials.clear() {
            warn!("Could not clear saved credentials: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;
    use crate::credentials::LocalCredentialCache;
    use crate::error::{AuthError, ThreadpostError};
    use crate::store::MemoryStore;

    fn manager(api: MockApi) -> (Arc<MockApi>, Arc<LocalCredentialCache>, SessionManager) {
        let api = Arc::new(api);
        let cache = Arc::new(LocalCredentialCache::new(Arc::new(MemoryStore::new())));
        let manager = SessionManager::new(api.clone(), cache.clone());
        (api, cache, manager)
    }

    #[test]
    fn test_validate_identifier_cleans_input() {
        assert_eq!(
            validate_identifier("  @alice.bsky.social ").unwrap(),
            "alice.bsky.social"
        );
        assert_eq!(
            validate_identifier("@\u{200B}alice.bsky.social\u{202C}").unwrap(),
            "alice.bsky.social"
        );
        assert_eq!(
            validate_identifier("\u{FEFF}alice.bsky.social\u{200D}").unwrap(),
            "alice.bsky.social"
        );
    }

    #[test]
    fn test_validate_identifier_requires_dot() {
        assert_eq!(
            validate_identifier("@alice").unwrap_err(),
            ValidationError::InvalidHandle("alice".to_string())
        );
        assert_eq!(
            validate_identifier("   ").unwrap_err(),
            ValidationError::MissingCredentials
        );
    }

    #[test]
    fn test_validate_secret() {
        assert_eq!(validate_secret(" abcd-efgh-ijkl ").unwrap(), "abcd-efgh-ijkl");
        assert_eq!(
            validate_secret("short").unwrap_err(),
            ValidationError::SecretTooShort { min: 10 }
        );
        assert_eq!(
            validate_secret("").unwrap_err(),
            ValidationError::MissingCredentials
        );
    }

    #[tokio::test]
    async fn test_invalid_input_makes_no_network_call() {
        let (api, _cache, manager) = manager(MockApi::success());

        let err = manager.authenticate("alice", "abcd-efgh-ijkl").await.unwrap_err();
        assert_eq!(err.exit_code(), 3);

        let err = manager
            .authenticate("alice.bsky.social", "short")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ThreadpostError::Validation(ValidationError::SecretTooShort { .. })
        ));

        assert_eq!(api.session_call_count(), 0);
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_authenticate_saves_credentials() {
        let (api, cache, manager) = manager(MockApi::success());

        let session = manager
            .authenticate("@alice.bsky.social", "abcd-efgh-ijkl")
            .await
            .unwrap();
        assert_eq!(session.handle, "alice.bsky.social");
        assert_eq!(api.session_call_count(), 1);
        assert!(manager.is_authenticated());

        let saved = cache.load().unwrap().unwrap();
        assert_eq!(saved.handle, "alice.bsky.social");
        assert_eq!(saved.app_password.expose_secret(), "abcd-efgh-ijkl");
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let (_api, cache, manager) = manager(MockApi::bad_credentials());

        let err = manager
            .authenticate("alice.bsky.social", "abcd-efgh-ijkl")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ThreadpostError::Auth(AuthError::InvalidCredentials)
        ));
        assert_eq!(err.exit_code(), 2);
        assert!(!manager.is_authenticated());
        assert!(cache.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resume_and_end_session() {
        let (api, cache, manager) = manager(MockApi::success());

        assert!(manager.resume().await.unwrap().is_none());
        assert_eq!(api.session_call_count(), 0);

        cache.save("alice.bsky.social", "abcd-efgh-ijkl").unwrap();
        let session = manager.resume().await.unwrap().unwrap();
        assert_eq!(session.handle, "alice.bsky.social");

        manager.end_session();
        assert!(manager.current().is_none());
        assert!(matches!(
            manager.require().unwrap_err(),
            ThreadpostError::Validation(ValidationError::NoSession)
        ));

        // Ending the session keeps remembered credentials
        assert!(manager.saved_credentials().is_some());
        manager.forget_credentials();
        assert!(manager.saved_credentials().is_none());
    }
}
