//! Core types for Threadpost

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

/// Record type and collection for feed posts
pub const POST_TYPE: &str = "app.bsky.feed.post";

/// An authenticated account session
///
/// Held in memory only. The access token is zeroized on drop and redacted
/// from `Debug` output.
#[derive(Debug)]
pub struct Session {
    /// The account DID, used as the `repo` of created records
    pub account_id: String,
    pub handle: String,
    access_token: SecretString,
}

impl Session {
    pub fn new(account_id: String, handle: String, access_token: SecretString) -> Self {
        Self {
            account_id,
            handle,
            access_token,
        }
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

/// Identifiers of a created record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

/// A post returned by the API after a successful create
pub type PublishedPost = StrongRef;

/// Reply linkage embedded in every post after the first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub root: StrongRef,
    pub parent: StrongRef,
}

/// The `app.bsky.feed.post` record body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    #[serde(rename = "$type")]
    pub record_type: String,
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyRef>,
}

impl PostRecord {
    /// Build a record stamped with the current time (ISO-8601, UTC)
    pub fn new(text: String, reply: Option<ReplyRef>) -> Self {
        Self {
            record_type: POST_TYPE.to_string(),
            text,
            created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            reply,
        }
    }
}

/// Cosmetic text style applied at submit time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatStyle {
    #[default]
    Normal,
    Bold,
    Italic,
    Script,
}

impl FormatStyle {
    pub const ALL: [FormatStyle; 4] = [
        FormatStyle::Normal,
        FormatStyle::Bold,
        FormatStyle::Italic,
        FormatStyle::Script,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatStyle::Normal => "normal",
            FormatStyle::Bold => "bold",
            FormatStyle::Italic => "italic",
            FormatStyle::Script => "script",
        }
    }
}

impl std::str::FromStr for FormatStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(FormatStyle::Normal),
            "bold" => Ok(FormatStyle::Bold),
            "italic" => Ok(FormatStyle::Italic),
            "script" => Ok(FormatStyle::Script),
            _ => Err(format!(
                "Invalid format style: '{}'. Valid options: normal, bold, italic, script",
                s
            )),
        }
    }
}

impl std::fmt::Display for FormatStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A not-yet-posted entry of the thread, keyed by position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    pub index: usize,
    pub content: String,
    #[serde(
        rename = "formatStyle",
        default,
        deserialize_with = "deserialize_style_lenient"
    )]
    pub format_style: FormatStyle,
}

impl PostDraft {
    pub fn new(index: usize, content: impl Into<String>) -> Self {
        Self {
            index,
            content: content.into(),
            format_style: FormatStyle::Normal,
        }
    }

    pub fn with_style(mut self, style: FormatStyle) -> Self {
        self.format_style = style;
        self
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

// Unknown or null styles fall back to normal instead of failing the load
fn deserialize_style_lenient<'de, D>(deserializer: D) -> Result<FormatStyle, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()).unwrap_or_default())
}

/// Number of characters in a post body as counted against the limit
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_post_record_omits_reply() {
        let record = PostRecord::new("Hello".to_string(), None);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["$type"], "app.bsky.feed.post");
        assert_eq!(json["text"], "Hello");
        assert!(json.get("reply").is_none());
        assert!(json["createdAt"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_reply_record_shape() {
        let root = StrongRef {
            uri: "at://did:plc:abc/app.bsky.feed.post/1".to_string(),
            cid: "cid1".to_string(),
        };
        let parent = StrongRef {
            uri: "at://did:plc:abc/app.bsky.feed.post/2".to_string(),
            cid: "cid2".to_string(),
        };
        let record = PostRecord::new(
            "Third".to_string(),
            Some(ReplyRef {
                root: root.clone(),
                parent: parent.clone(),
            }),
        );
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["reply"]["root"]["uri"], root.uri);
        assert_eq!(json["reply"]["root"]["cid"], "cid1");
        assert_eq!(json["reply"]["parent"]["uri"], parent.uri);
        assert_eq!(json["reply"]["parent"]["cid"], "cid2");
    }

    #[test]
    fn test_session_debug_redacts_token() {
        let session = Session::new(
            "did:plc:abc".to_string(),
            "alice.bsky.social".to_string(),
            SecretString::from("super-secret-jwt".to_string()),
        );
        let debug = format!("{:?}", session);
        assert!(!debug.contains("super-secret-jwt"));
        assert_eq!(session.access_token(), "super-secret-jwt");
    }

    #[test]
    fn test_format_style_parse() {
        assert_eq!("bold".parse::<FormatStyle>().unwrap(), FormatStyle::Bold);
        assert_eq!("Script".parse::<FormatStyle>().unwrap(), FormatStyle::Script);
        assert!("underline".parse::<FormatStyle>().is_err());
    }

    #[test]
    fn test_draft_json_field_names() {
        let draft = PostDraft::new(2, "b").with_style(FormatStyle::Italic);
        let json = serde_json::to_string(&draft).unwrap();
        assert_eq!(json, r#"{"index":2,"content":"b","formatStyle":"italic"}"#);
    }

    #[test]
    fn test_draft_unknown_style_loads_as_normal() {
        let draft: PostDraft =
            serde_json::from_str(r#"{"index":0,"content":"a","formatStyle":"fraktur"}"#).unwrap();
        assert_eq!(draft.format_style, FormatStyle::Normal);

        let draft: PostDraft = serde_json::from_str(r#"{"index":1,"content":"a"}"#).unwrap();
        assert_eq!(draft.format_style, FormatStyle::Normal);
    }

    #[test]
    fn test_char_len_counts_scalars() {
        assert_eq!(char_len("abc"), 3);
        assert_eq!(char_len("𝐚𝐛𝐜"), 3);
    }
}
