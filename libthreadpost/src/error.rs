//! Error types for Threadpost

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ThreadpostError>;

#[derive(Error, Debug)]
pub enum ThreadpostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Thread posting failed: {0}")]
    ThreadPost(#[from] ThreadPostError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ThreadpostError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ThreadpostError::Validation(ValidationError::NoSession) => 2,
            ThreadpostError::Validation(_) => 3,
            ThreadpostError::Auth(_) => 2,
            ThreadpostError::Api(ApiError::Unauthorized(_)) => 2,
            ThreadpostError::ThreadPost(_) => 1,
            ThreadpostError::Api(_) => 1,
            ThreadpostError::Config(_) => 1,
            ThreadpostError::Storage(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// A post that exceeded the character limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverLengthPost {
    /// 1-based position within the thread
    pub index: usize,
    pub content: String,
    pub length: usize,
}

/// Local input rejection, raised before any network call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Handle must be complete (e.g. name.bsky.social), got '{0}'")]
    InvalidHandle(String),

    #[error(
        "App password looks too short (minimum {min} characters). \
         Use an app password from the Bluesky settings, not your account password"
    )]
    SecretTooShort { min: usize },

    #[error("Handle and app password are required")]
    MissingCredentials,

    #[error("Not signed in")]
    NoSession,

    #[error("At least one post must contain text")]
    EmptyThread,

    #[error("{}", describe_too_long(.max, .posts))]
    TooLong {
        max: usize,
        posts: Vec<OverLengthPost>,
    },

    #[error("Thread has {count} posts, the maximum is {max}")]
    TooManyPosts { count: usize, max: usize },

    #[error("Invalid drafts: {0}")]
    InvalidDrafts(String),
}

fn describe_too_long(max: &usize, posts: &[OverLengthPost]) -> String {
    let listed: Vec<String> = posts
        .iter()
        .map(|p| format!("post {} ({} characters)", p.index, p.length))
        .collect();
    format!(
        "{} post(s) exceed the {} character limit: {}",
        posts.len(),
        max,
        listed.join(", ")
    )
}

/// The authentication endpoint rejected the request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error(
        "Invalid handle or app password. Check that the handle is complete \
         (e.g. name.bsky.social) and that you are using an app password"
    )]
    InvalidCredentials,

    #[error("{0}")]
    ServerRejected(String),
}

/// Transport or server failure of a single XRPC call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Why a thread stopped before its last post
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostFailure {
    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("cancelled")]
    Cancelled,
}

/// A create-record call failed mid-sequence
///
/// Carries how many posts made it so callers can report "K of N posted"
/// and keep the drafts for a manual retry of the remainder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{posted} of {total} posted, error on post {}: {cause}", .posted + 1)]
pub struct ThreadPostError {
    pub posted: usize,
    pub total: usize,
    pub cause: PostFailure,
}

impl ThreadPostError {
    /// True when at least one post was published before the failure
    pub fn is_partial(&self) -> bool {
        self.posted > 0
    }

    pub fn was_cancelled(&self) -> bool {
        matches!(self.cause, PostFailure::Cancelled)
    }
}

/// Local persistence failure; always recovered by the caller
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Keyring error: {0}")]
    Keyring(String),
}
