use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audience scope of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Domain,
    Admin,
}

impl Visibility {
    /// Parse a wire string. Read handlers treat an unrecognized scope as
    /// "matches nothing" rather than an error, so this returns `Option`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "domain" => Some(Self::Domain),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Domain => "domain",
            Self::Admin => "admin",
        }
    }
}

/// A registered user. `password` holds the argon2 hash, never plaintext;
/// the struct deliberately does not implement `Serialize` so it can't leak
/// onto the wire.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub domain: String,
    pub is_admin: bool,
}

/// A message with `visibility == Domain` always carries a non-empty domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub author_id: i64,
    pub content: String,
    pub visibility: Visibility,
    pub domain: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a moderation pass. Computed per submission, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationResult {
    pub flagged: bool,
    pub categories: Vec<String>,
    pub reason: Option<String>,
}
