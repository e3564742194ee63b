//! Mock XRPC implementation for testing
//!
//! Simulates session creation and record creation without network access.
//! Every created record is kept so tests can inspect the reply chain, and
//! call instants are recorded (against tokio's clock) to check pacing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use crate::api::{BlueskyApi, CreatedSession};
use crate::error::{ApiError, AuthError, Result};
use crate::types::{PostRecord, Session, StrongRef, POST_TYPE};

/// Configuration for mock API behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// DID returned from session creation
    pub did: String,

    /// Whether session creation should succeed
    pub auth_succeeds: bool,

    /// HTTP status simulated on auth failure (401 means bad credentials)
    pub auth_status: u16,

    /// Message returned on a non-401 auth failure
    pub auth_error: Option<String>,

    /// 1-based record call that fails, if any
    pub fail_on_call: Option<usize>,

    /// Error returned by the failing record call
    pub post_error: ApiError,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,

    /// Number of times create_session has been called
    pub session_call_count: Arc<Mutex<usize>>,

    /// Records that were created (for verification)
    pub records: Arc<Mutex<Vec<PostRecord>>>,

    /// When each create_record call started
    pub call_times: Arc<Mutex<Vec<Instant>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            did: "did:plc:mock".to_string(),
            auth_succeeds: true,
            auth_status: 401,
            auth_error: None,
            fail_on_call: None,
            post_error: ApiError::Rejected {
                status: 500,
                message: "Mock posting failed".to_string(),
            },
            delay: Duration::ZERO,
            session_call_count: Arc::new(Mutex::new(0)),
            records: Arc::new(Mutex::new(Vec::new())),
            call_times: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock API for testing
pub struct MockApi {
    config: MockConfig,
}

impl MockApi {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Create a mock that always succeeds
    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    /// Create a mock whose session endpoint answers 401
    pub fn bad_credentials() -> Self {
        Self::new(MockConfig {
            auth_succeeds: false,
            ..Default::default()
        })
    }

    /// Create a mock whose session endpoint answers a non-401 error
    pub fn auth_rejected(status: u16, message: &str) -> Self {
        Self::new(MockConfig {
            auth_succeeds: false,
            auth_status: status,
            auth_error: Some(message.to_string()),
            ..Default::default()
        })
    }

    /// Create a mock that fails the `call`-th record (1-based)
    pub fn fail_on_call(call: usize, error: ApiError) -> Self {
        Self::new(MockConfig {
            fail_on_call: Some(call),
            post_error: error,
            ..Default::default()
        })
    }

    /// Create a mock with a per-call delay
    pub fn with_delay(delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..Default::default()
        })
    }

    pub fn session_call_count(&self) -> usize {
        *lock(&self.config.session_call_count)
    }

    /// Number of create_record calls made, including a failing one
    pub fn record_call_count(&self) -> usize {
        lock(&self.config.call_times).len()
    }

    /// Records that were accepted, in call order
    pub fn records(&self) -> Vec<PostRecord> {
        lock(&self.config.records).clone()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        lock(&self.config.call_times).clone()
    }

    /// The reference the mock hands back for the n-th accepted record (0-based)
    pub fn reference_for(&self, n: usize) -> StrongRef {
        StrongRef {
            uri: format!("at://{}/{}/mock{}", self.config.did, POST_TYPE, n),
            cid: format!("bafymock{}", n),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl BlueskyApi for MockApi {
    async fn create_session(&self, identifier: &str, _password: &str) -> Result<CreatedSession> {
        *lock(&self.config.session_call_count) += 1;

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if self.config.auth_succeeds {
            return Ok(CreatedSession::new(
                self.config.did.clone(),
                identifier.to_string(),
                "mock-access-jwt".to_string(),
            ));
        }

        if self.config.auth_status == 401 {
            Err(AuthError::InvalidCredentials.into())
        } else {
            let message = self
                .config
                .auth_error
                .clone()
                .unwrap_or_else(|| format!("Login failed (HTTP {})", self.config.auth_status));
            Err(AuthError::ServerRejected(message).into())
        }
    }

    async fn create_record(
        &self,
        _session: &Session,
        record: &PostRecord,
    ) -> std::result::Result<StrongRef, ApiError> {
        let call = {
            let mut times = lock(&self.config.call_times);
            times.push(Instant::now());
            times.len()
        };

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if self.config.fail_on_call == Some(call) {
            return Err(self.config.post_error.clone());
        }

        let mut records = lock(&self.config.records);
        let reference = self.reference_for(records.len());
        records.push(record.clone());
        Ok(reference)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
