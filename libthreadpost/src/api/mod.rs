//! AT Protocol access
//!
//! The publisher and session manager talk to the network only through the
//! `BlueskyApi` trait. `XrpcClient` is the HTTP implementation; `MockApi`
//! is a configurable stand-in for tests.
//!
//! # Examples
//!
//! ```no_run
//! use libthreadpost::api::{BlueskyApi, bluesky::XrpcClient};
//! use libthreadpost::types::PostRecord;
//!
//! # async fn example() -> libthreadpost::Result<()> {
//! let client = XrpcClient::new("https://bsky.social/xrpc", 30)?;
//! let created = client.create_session("alice.bsky.social", "abcd-efgh-ijkl-mnop").await?;
//! let session = created.into_session();
//!
//! let record = PostRecord::new("Hello from the terminal".to_string(), None);
//! let posted = client.create_record(&session, &record).await?;
//! println!("Posted {}", posted.uri);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::types::{PostRecord, Session, StrongRef};

pub mod bluesky;

// Mock API is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Successful `com.atproto.server.createSession` response
#[derive(Deserialize)]
pub struct CreatedSession {
    #[serde(rename = "accessJwt")]
    access_jwt: String,
    pub did: String,
    pub handle: String,
}

impl CreatedSession {
    pub fn new(did: String, handle: String, access_jwt: String) -> Self {
        Self {
            access_jwt,
            did,
            handle,
        }
    }

    pub fn into_session(self) -> Session {
        Session::new(self.did, self.handle, SecretString::from(self.access_jwt))
    }
}

impl std::fmt::Debug for CreatedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedSession")
            .field("did", &self.did)
            .field("handle", &self.handle)
            .field("access_jwt", &"[REDACTED]")
            .finish()
    }
}

/// XRPC operations used by the thread poster
#[async_trait]
pub trait BlueskyApi: Send + Sync {
    /// Exchange an identifier and app password for a session
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidCredentials` for HTTP 401
    /// - `AuthError::ServerRejected` for any other non-success status
    /// - `ApiError::Network` if the server could not be reached
    async fn create_session(&self, identifier: &str, password: &str) -> Result<CreatedSession>;

    /// Create one `app.bsky.feed.post` record in the session's repo
    ///
    /// Exactly one network call; no retries.
    async fn create_record(
        &self,
        session: &Session,
        record: &PostRecord,
    ) -> std::result::Result<StrongRef, ApiError>;

    /// Name used in logs
    fn name(&self) -> &str;
}
