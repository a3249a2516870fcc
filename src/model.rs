use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FeedError;

pub const ASPECT_RATIO: &str = "9:16";
pub const MAX_DURATION_SECS: f64 = 60.0;
pub const COMMENT_MAX_CHARS: usize = 500;
pub const VIDEO_WIDTH: u32 = 1080;
pub const VIDEO_HEIGHT: u32 = 1920;

const ASPECT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub video_url: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub liked_by: Vec<String>,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub author: Option<UserRef>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_aspect_ratio() -> String {
    ASPECT_RATIO.to_string()
}

impl VideoRecord {
    pub fn author_name(&self) -> &str {
        match &self.author {
            Some(UserRef::Populated(user)) => user.display_name(),
            _ => "Unknown",
        }
    }

    /// Identifier usable with the profile route, if the author is known.
    pub fn author_id(&self) -> Option<&str> {
        let id = match &self.author {
            Some(UserRef::Id(id)) => Some(id.as_str()),
            Some(UserRef::Populated(user)) => user.id.as_deref(),
            None => None,
        };
        id.filter(|id| !id.trim().is_empty())
    }

    pub fn duration_label(&self) -> String {
        match self.duration {
            Some(secs) if secs > 0.0 => {
                let total = secs.round() as u64;
                format!("{}:{:02}", total / 60, total % 60)
            }
            _ => "--:--".to_string(),
        }
    }
}

/// Owner reference: the API returns either a bare object id or a populated user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum UserRef {
    Id(String),
    Populated(UserSummary),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl UserSummary {
    pub fn display_name(&self) -> &str {
        [&self.display_name, &self.username, &self.email]
            .into_iter()
            .flatten()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeedPage {
    #[serde(default)]
    pub videos: Vec<VideoRecord>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl FeedPage {
    /// An empty page ends the feed regardless of what the pagination block claims.
    pub fn has_more(&self) -> bool {
        !self.videos.is_empty()
            && self
                .pagination
                .as_ref()
                .map(|pagination| pagination.has_more)
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeStatus {
    #[serde(default)]
    pub liked: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeToggle {
    pub liked: bool,
    pub likes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    #[serde(rename = "userId", default)]
    pub author: Option<UserSummary>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .map(UserSummary::display_name)
            .unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileStats {
    #[serde(default)]
    pub videos: u64,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: UserSummary,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub videos: Vec<VideoRecord>,
    #[serde(default)]
    pub stats: ProfileStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transformation {
    pub height: u32,
    pub width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
}

impl Default for Transformation {
    fn default() -> Self {
        Self {
            height: VIDEO_HEIGHT,
            width: VIDEO_WIDTH,
            quality: Some(100),
        }
    }
}

/// Creation payload for `POST /api/videos`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub thumbnail_url: String,
    pub controls: bool,
    pub duration: f64,
    pub aspect_ratio: String,
    pub transformation: Transformation,
}

impl NewVideo {
    pub fn validate(&self) -> Result<(), FeedError> {
        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("video url", &self.video_url),
            ("thumbnail url", &self.thumbnail_url),
        ] {
            if value.trim().is_empty() {
                return Err(FeedError::Validation(format!("{field} is required")));
            }
        }
        validate_duration(self.duration)?;
        if self.aspect_ratio != ASPECT_RATIO {
            return Err(FeedError::Validation(format!(
                "aspect ratio must be {ASPECT_RATIO}, got {}",
                self.aspect_ratio
            )));
        }
        if let Some(quality) = self.transformation.quality {
            if !(1..=100).contains(&quality) {
                return Err(FeedError::Validation(
                    "quality must be between 1 and 100".to_string(),
                ));
            }
        }
        Ok(())
    }
}

pub fn validate_duration(secs: f64) -> Result<(), FeedError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(FeedError::Validation("video duration is unknown".to_string()));
    }
    if secs > MAX_DURATION_SECS {
        return Err(FeedError::Validation(format!(
            "videos must be {MAX_DURATION_SECS:.0}s or shorter (got {secs:.1}s)"
        )));
    }
    Ok(())
}

pub fn is_vertical_reel(width: u32, height: u32) -> bool {
    if width == 0 || height == 0 {
        return false;
    }
    let ratio = f64::from(width) / f64::from(height);
    (ratio - 9.0 / 16.0).abs() <= ASPECT_TOLERANCE
}

/// Trims and checks comment text, returning what should be posted.
pub fn validate_comment(text: &str) -> Result<String, FeedError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FeedError::Validation("comment text is required".to_string()));
    }
    if trimmed.chars().count() > COMMENT_MAX_CHARS {
        return Err(FeedError::Validation(format!(
            "comments must be at most {COMMENT_MAX_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewVideo {
        NewVideo {
            title: "Sunset".into(),
            description: "Beach".into(),
            video_url: "https://ik.imagekit.io/demo/videos/a.mp4".into(),
            thumbnail_url: "https://ik.imagekit.io/demo/images/a.jpg".into(),
            controls: true,
            duration: 42.0,
            aspect_ratio: ASPECT_RATIO.into(),
            transformation: Transformation::default(),
        }
    }

    #[test]
    fn decodes_populated_and_bare_authors() {
        let populated: VideoRecord = serde_json::from_str(
            r#"{"_id":"v1","title":"t","videoUrl":"u","likes":3,
                "author":{"_id":"u1","username":"sam","email":"sam@example.com"}}"#,
        )
        .unwrap();
        assert_eq!(populated.author_name(), "sam");
        assert_eq!(populated.author_id(), Some("u1"));
        assert_eq!(populated.aspect_ratio, "9:16");

        let bare: VideoRecord =
            serde_json::from_str(r#"{"_id":"v2","title":"t","videoUrl":"u","author":"u9"}"#)
                .unwrap();
        assert_eq!(bare.author_name(), "Unknown");
        assert_eq!(bare.author_id(), Some("u9"));
    }

    #[test]
    fn display_name_falls_back_in_order() {
        let user = UserSummary {
            display_name: Some("  ".into()),
            email: Some("a@b.c".into()),
            ..UserSummary::default()
        };
        assert_eq!(user.display_name(), "a@b.c");
        assert_eq!(UserSummary::default().display_name(), "Unknown");
    }

    #[test]
    fn empty_page_never_has_more() {
        let page = FeedPage {
            videos: Vec::new(),
            pagination: Some(Pagination {
                has_more: true,
                ..Pagination::default()
            }),
        };
        assert!(!page.has_more());
    }

    #[test]
    fn new_video_rejects_long_or_wide_clips() {
        assert!(draft().validate().is_ok());

        let mut long = draft();
        long.duration = 61.0;
        assert!(matches!(long.validate(), Err(FeedError::Validation(_))));

        let mut wide = draft();
        wide.aspect_ratio = "16:9".into();
        assert!(matches!(wide.validate(), Err(FeedError::Validation(_))));
    }

    #[test]
    fn vertical_reel_detection_tolerates_rounding() {
        assert!(is_vertical_reel(1080, 1920));
        assert!(is_vertical_reel(720, 1280));
        assert!(is_vertical_reel(607, 1080));
        assert!(!is_vertical_reel(1920, 1080));
        assert!(!is_vertical_reel(0, 1920));
    }

    #[test]
    fn comment_validation_counts_characters() {
        assert_eq!(validate_comment("  nice!  ").unwrap(), "nice!");
        assert!(validate_comment("   ").is_err());
        assert!(validate_comment(&"é".repeat(500)).is_ok());
        assert!(validate_comment(&"é".repeat(501)).is_err());
    }
}
