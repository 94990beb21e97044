//! Shared data models used across modules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Media classification, derived once from the uploaded content type and
/// immutable thereafter. Stored as text in Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    /// Classify from a declared MIME type; `None` for anything we don't sync.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        if content_type.starts_with("image/") {
            Some(MediaKind::Image)
        } else if content_type.starts_with("video/") {
            Some(MediaKind::Video)
        } else if content_type.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl TryFrom<String> for MediaKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            other => Err(format!("unknown media kind: {}", other)),
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User role. Controllers upload and activate; clients watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Controller,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Controller => "controller",
            Role::Client => "client",
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "controller" => Ok(Role::Controller),
            "client" => Ok(Role::Client),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// An uploaded media record. `slot_ends_at` is fixed at upload time
/// (`created_at + slot_duration_ms`) and is never recomputed on
/// activation: every client derives its countdown from this one value.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MediaItem {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub kind: MediaKind,
    pub url: String,
    pub interaction_count: i64,
    pub slot_duration_ms: i64,
    pub slot_ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One pointer row per controller identity. `media_id = None` means
/// "nothing active": the row itself persists through deactivation, so
/// deactivated and never-activated stay observably distinct.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActivePointer {
    pub controller_id: Uuid,
    pub media_id: Option<Uuid>,
    pub activated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_content_type() {
        assert_eq!(
            MediaKind::from_content_type("image/png"),
            Some(MediaKind::Image)
        );
        assert_eq!(
            MediaKind::from_content_type("video/mp4"),
            Some(MediaKind::Video)
        );
        assert_eq!(
            MediaKind::from_content_type("audio/mpeg"),
            Some(MediaKind::Audio)
        );
        assert_eq!(MediaKind::from_content_type("application/pdf"), None);
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [MediaKind::Image, MediaKind::Video, MediaKind::Audio] {
            assert_eq!(MediaKind::try_from(kind.as_str().to_string()), Ok(kind));
        }
        assert!(MediaKind::try_from("gif".to_string()).is_err());
    }
}
