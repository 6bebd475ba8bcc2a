//! Records flowing through the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A piece of user-generated content submitted for screening
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ugc {
    /// Content ID
    pub id: i64,
    /// Parent object ID (the video, post or thread the content belongs to)
    #[serde(default)]
    pub oid: i64,
    /// Author of the content
    pub sender_id: i64,
    /// Classification namespace selecting the rule set
    pub area: String,
    /// Text body
    pub content: String,
}

impl Ugc {
    pub fn new(
        id: i64,
        oid: i64,
        sender_id: i64,
        area: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            oid,
            sender_id,
            area: area.into(),
            content: content.into(),
        }
    }
}

/// Classification attached to a keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordTag {
    /// Blocked
    DefaultLimit,
    /// Hard-blocked
    RestrictLimit,
    /// Exempted by a whitelist rule
    White,
}

impl KeywordTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeywordTag::DefaultLimit => "default_limit",
            KeywordTag::RestrictLimit => "restrict_limit",
            KeywordTag::White => "white",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "default_limit" => Some(KeywordTag::DefaultLimit),
            "restrict_limit" => Some(KeywordTag::RestrictLimit),
            "white" => Some(KeywordTag::White),
            _ => None,
        }
    }
}

impl fmt::Display for KeywordTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule hit against one piece of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    /// Assigned by the keyword store
    pub id: Option<i64>,
    /// Matched substring, trimmed
    pub content: String,
    /// Full source text, kept for audit
    pub origin_content: String,
    pub sender_id: i64,
    pub area: String,
    /// Rule that produced or last re-tagged this keyword
    pub regexp_name: String,
    pub tag: KeywordTag,
    pub ctime: DateTime<Utc>,
}

impl Keyword {
    /// Build a keyword for a rule hit on `ugc`
    pub fn from_hit(ugc: &Ugc, hit: &str, regexp_name: &str, tag: KeywordTag) -> Self {
        Self {
            id: None,
            content: hit.to_string(),
            origin_content: ugc.content.clone(),
            sender_id: ugc.sender_id,
            area: ugc.area.clone(),
            regexp_name: regexp_name.to_string(),
            tag,
            ctime: Utc::now(),
        }
    }

    /// Re-tag as whitelisted. There is no way back from `White`.
    pub fn mark_white(&mut self, regexp_name: &str) {
        self.tag = KeywordTag::White;
        self.regexp_name = regexp_name.to_string();
    }

    pub fn is_white(&self) -> bool {
        self.tag == KeywordTag::White
    }
}
