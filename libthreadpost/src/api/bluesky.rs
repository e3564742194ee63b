//! Bluesky XRPC client over HTTP

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::api::{BlueskyApi, CreatedSession};
use crate::error::{ApiError, AuthError, Result};
use crate::types::{PostRecord, Session, StrongRef, POST_TYPE};

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const CREATE_RECORD: &str = "com.atproto.repo.createRecord";

/// Error body returned by XRPC endpoints
#[derive(Deserialize)]
struct XrpcErrorBody {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct CreateRecordRequest<'a> {
    repo: &'a str,
    collection: &'a str,
    record: &'a PostRecord,
}

/// Map a transport failure (no HTTP status) to an `ApiError`
fn map_transport_error(error: reqwest::Error, context: &str) -> ApiError {
    if error.is_timeout() {
        ApiError::Network(format!(
            "Timed out talking to the Bluesky PDS during {}: {}",
            context, error
        ))
    } else if error.is_connect() {
        ApiError::Network(format!(
            "Could not connect to the Bluesky PDS during {}: {}. Check your internet connection.",
            context, error
        ))
    } else {
        ApiError::Network(format!("Request failed during {}: {}", context, error))
    }
}

/// Pull the human-readable message out of an XRPC error body
fn error_message(body: &str) -> Option<String> {
    let parsed: XrpcErrorBody = serde_json::from_str(body).ok()?;
    parsed.message.or(parsed.error).filter(|m| !m.trim().is_empty())
}

/// Map a non-success status on a record call to an `ApiError`
fn map_status_error(status: StatusCode, body: &str) -> ApiError {
    let message = error_message(body).unwrap_or_else(|| "Unknown error".to_string());
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimit(message),
        _ => ApiError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

pub struct XrpcClient {
    http: Client,
    base_url: String,
}

impl XrpcClient {
    /// Create a new client
    ///
    /// # Arguments
    ///
    /// * `base_url` - XRPC root, e.g. "https://bsky.social/xrpc"
    /// * `timeout_secs` - Per-request timeout
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("threadpost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }
}

#[async_trait]
impl BlueskyApi for XrpcClient {
    async fn create_session(&self, identifier: &str, password: &str) -> Result<CreatedSession> {
        tracing::debug!("Creating Bluesky session for handle: {}", identifier);

        let response = self
            .http
            .post(self.endpoint(CREATE_SESSION))
            .json(&CreateSessionRequest {
                identifier,
                password,
            })
            .send()
            .await
            .map_err(|e| map_transport_error(e, "authentication"))?;

        let status = response.status();
        tracing::debug!("createSession responded with {}", status);

        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                return Err(AuthError::InvalidCredentials.into());
            }
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body)
                .unwrap_or_else(|| format!("Login failed (HTTP {})", status.as_u16()));
            return Err(AuthError::ServerRejected(message).into());
        }

        let created: CreatedSession = response.json().await.map_err(|e| {
            ApiError::Decode(format!("Invalid createSession response: {}", e))
        })?;
        tracing::debug!("Bluesky session created for {}", created.handle);

        Ok(created)
    }

    async fn create_record(
        &self,
        session: &Session,
        record: &PostRecord,
    ) -> std::result::Result<StrongRef, ApiError> {
        tracing::debug!(
            "Creating record: {} characters, reply: {}",
            record.text.chars().count(),
            record.reply.is_some()
        );

        let response = self
            .http
            .post(self.endpoint(CREATE_RECORD))
            .bearer_auth(session.access_token())
            .json(&CreateRecordRequest {
                repo: &session.account_id,
                collection: POST_TYPE,
                record,
            })
            .send()
            .await
            .map_err(|e| map_transport_error(e, "posting"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &body));
        }

        let created: StrongRef = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("Invalid createRecord response: {}", e)))?;
        tracing::debug!("Created record {}", created.uri);

        Ok(created)
    }

    fn name(&self) -> &str {
        "bluesky"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ThreadpostError;
    use crate::types::ReplyRef;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_session() -> Session {
        Session::new(
            "did:plc:alice".to_string(),
            "alice.bsky.social".to_string(),
            SecretString::from("jwt-token".to_string()),
        )
    }

    async fn client_for(server: &MockServer) -> XrpcClient {
        XrpcClient::new(&format!("{}/xrpc/", server.uri()), 5).unwrap()
    }

    #[test]
    fn test_error_message_prefers_message() {
        let body = r#"{"error":"InvalidRequest","message":"Record is too long"}"#;
        assert_eq!(error_message(body).as_deref(), Some("Record is too long"));

        let body = r#"{"error":"InvalidRequest"}"#;
        assert_eq!(error_message(body).as_deref(), Some("InvalidRequest"));

        assert_eq!(error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_map_status_error() {
        assert!(matches!(
            map_status_error(StatusCode::UNAUTHORIZED, r#"{"message":"ExpiredToken"}"#),
            ApiError::Unauthorized(m) if m == "ExpiredToken"
        ));
        assert!(matches!(
            map_status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimit(_)
        ));
        assert_eq!(
            map_status_error(StatusCode::BAD_REQUEST, "not json"),
            ApiError::Rejected {
                status: 400,
                message: "Unknown error".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_create_session_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.server.createSession"))
            .and(body_partial_json(json!({
                "identifier": "alice.bsky.social",
                "password": "abcd-efgh-ijkl-mnop"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessJwt": "jwt-token",
                "refreshJwt": "refresh",
                "did": "did:plc:alice",
                "handle": "alice.bsky.social"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let created = client
            .create_session("alice.bsky.social", "abcd-efgh-ijkl-mnop")
            .await
            .unwrap();
        let session = created.into_session();

        assert_eq!(session.account_id, "did:plc:alice");
        assert_eq!(session.handle, "alice.bsky.social");
        assert_eq!(session.access_token(), "jwt-token");
    }

    #[tokio::test]
    async fn test_create_session_401_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.server.createSession"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "AuthenticationRequired",
                "message": "Invalid identifier or password"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .create_session("alice.bsky.social", "wrong-password")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ThreadpostError::Auth(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_create_session_other_status_passes_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.server.createSession"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "AccountTakedown",
                "message": "Account has been suspended"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .create_session("alice.bsky.social", "abcd-efgh-ijkl-mnop")
            .await
            .unwrap_err();
        match err {
            ThreadpostError::Auth(AuthError::ServerRejected(msg)) => {
                assert_eq!(msg, "Account has been suspended");
            }
            other => panic!("Expected ServerRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_session_unparsable_error_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.server.createSession"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .create_session("alice.bsky.social", "abcd-efgh-ijkl-mnop")
            .await
            .unwrap_err();
        match err {
            ThreadpostError::Auth(AuthError::ServerRejected(msg)) => {
                assert_eq!(msg, "Login failed (HTTP 502)");
            }
            other => panic!("Expected ServerRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_record_sends_bearer_and_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.repo.createRecord"))
            .and(header("authorization", "Bearer jwt-token"))
            .and(body_partial_json(json!({
                "repo": "did:plc:alice",
                "collection": "app.bsky.feed.post",
                "record": {
                    "$type": "app.bsky.feed.post",
                    "text": "second",
                    "reply": {
                        "root": {"uri": "at://root", "cid": "root-cid"},
                        "parent": {"uri": "at://parent", "cid": "parent-cid"}
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uri": "at://did:plc:alice/app.bsky.feed.post/3k2",
                "cid": "bafyreib2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let record = PostRecord::new(
            "second".to_string(),
            Some(ReplyRef {
                root: StrongRef {
                    uri: "at://root".to_string(),
                    cid: "root-cid".to_string(),
                },
                parent: StrongRef {
                    uri: "at://parent".to_string(),
                    cid: "parent-cid".to_string(),
                },
            }),
        );

        let created = client.create_record(&test_session(), &record).await.unwrap();
        assert_eq!(created.uri, "at://did:plc:alice/app.bsky.feed.post/3k2");
        assert_eq!(created.cid, "bafyreib2");
    }

    #[tokio::test]
    async fn test_create_record_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.repo.createRecord"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "InvalidRecord",
                "message": "Record/text must not be longer than 300 graphemes"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let record = PostRecord::new("x".to_string(), None);
        let err = client
            .create_record(&test_session(), &record)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 400,
                message: "Record/text must not be longer than 300 graphemes".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_create_record_bad_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.repo.createRecord"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let record = PostRecord::new("x".to_string(), None);
        let err = client
            .create_record(&test_session(), &record)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Nothing listens on port 9 on the loopback interface
        let client = XrpcClient::new("http://127.0.0.1:9/xrpc", 2).unwrap();
        let record = PostRecord::new("x".to_string(), None);
        let err = client
            .create_record(&test_session(), &record)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }
}
