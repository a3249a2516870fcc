use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rand::Rng;

use crate::api;
use crate::auth::Session;
use crate::error::FeedError;
use crate::model::{
    self, Comment, FeedPage, LikeToggle, Pagination, ProfileStats, UserProfile, UserRef,
    UserSummary, VideoRecord,
};

pub trait FeedService: Send + Sync {
    fn load_page(&self, limit: usize, offset: usize) -> Result<FeedPage>;
}

pub trait EngagementService: Send + Sync {
    fn like_status(&self, session: &Session, video_id: &str) -> Result<bool>;
    fn toggle_like(&self, session: &Session, video_id: &str) -> Result<LikeToggle>;
}

pub trait CommentService: Send + Sync {
    /// Newest first.
    fn list_comments(&self, video_id: &str) -> Result<Vec<Comment>>;
    fn post_comment(&self, session: &Session, video_id: &str, text: &str) -> Result<Comment>;
}

pub trait ProfileService: Send + Sync {
    fn load_profile(&self, id_or_username: &str) -> Result<UserProfile>;
}

pub struct ApiFeedService {
    client: Arc<api::Client>,
}

impl ApiFeedService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl FeedService for ApiFeedService {
    fn load_page(&self, limit: usize, offset: usize) -> Result<FeedPage> {
        self.client
            .videos(limit, offset)
            .with_context(|| format!("fetch videos at offset {offset}"))
    }
}

pub struct ApiEngagementService {
    client: Arc<api::Client>,
}

impl ApiEngagementService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl EngagementService for ApiEngagementService {
    fn like_status(&self, session: &Session, video_id: &str) -> Result<bool> {
        self.client
            .like_status(session, video_id)
            .map(|status| status.liked)
            .context("fetch like status")
    }

    fn toggle_like(&self, session: &Session, video_id: &str) -> Result<LikeToggle> {
        self.client
            .toggle_like(session, video_id)
            .context("toggle like")
    }
}

pub struct ApiCommentService {
    client: Arc<api::Client>,
}

impl ApiCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for ApiCommentService {
    fn list_comments(&self, video_id: &str) -> Result<Vec<Comment>> {
        self.client.comments(video_id).context("fetch comments")
    }

    fn post_comment(&self, session: &Session, video_id: &str, text: &str) -> Result<Comment> {
        self.client
            .post_comment(session, video_id, text)
            .context("post comment")
    }
}

pub struct ApiProfileService {
    client: Arc<api::Client>,
}

impl ApiProfileService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl ProfileService for ApiProfileService {
    fn load_profile(&self, id_or_username: &str) -> Result<UserProfile> {
        self.client
            .user_profile(id_or_username)
            .context("fetch profile")
    }
}

const MOCK_CREATORS: [(&str, &str); 3] = [
    ("creator-1", "wavechaser"),
    ("creator-2", "citylights"),
    ("creator-3", "trailmix"),
];

const MOCK_TITLES: [&str; 8] = [
    "Morning surf check",
    "Night market walk",
    "Ridge line sunrise",
    "Latte art attempt #4",
    "Skate park lines",
    "Rooftop timelapse",
    "Rainy window ASMR",
    "Dog vs. sprinkler",
];

/// In-memory catalogue backing `--offline` browsing.
pub struct MockBackend {
    state: Mutex<MockState>,
}

struct MockState {
    videos: Vec<VideoRecord>,
    comments: HashMap<String, Vec<Comment>>,
    next_comment: u64,
}

impl MockBackend {
    pub fn with_videos(videos: Vec<VideoRecord>) -> Self {
        Self {
            state: Mutex::new(MockState {
                videos,
                comments: HashMap::new(),
                next_comment: 1,
            }),
        }
    }

    pub fn sample(count: usize) -> Self {
        let mut rng = rand::thread_rng();
        let now = Utc::now();
        let videos = (0..count)
            .map(|idx| {
                let (creator_id, username) = MOCK_CREATORS[idx % MOCK_CREATORS.len()];
                let mut video = mock_video(&format!("sample-{idx:03}"));
                video.title = MOCK_TITLES[idx % MOCK_TITLES.len()].to_string();
                video.description = format!("Clip {} from @{username}", idx + 1);
                video.duration = Some(rng.gen_range(8.0..=60.0_f64).round());
                video.likes = rng.gen_range(0..5_000);
                video.author = Some(UserRef::Populated(UserSummary {
                    id: Some(creator_id.to_string()),
                    username: Some(username.to_string()),
                    ..UserSummary::default()
                }));
                video.created_at = Some(now - ChronoDuration::minutes(idx as i64 * 37));
                video
            })
            .collect();
        Self::with_videos(videos)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::sample(25)
    }
}

impl FeedService for MockBackend {
    fn load_page(&self, limit: usize, offset: usize) -> Result<FeedPage> {
        let state = self.state.lock();
        let total = state.videos.len();
        let videos: Vec<VideoRecord> = state
            .videos
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok(FeedPage {
            pagination: Some(Pagination {
                total: total as u64,
                limit,
                offset,
                has_more: offset + videos.len() < total,
            }),
            videos,
        })
    }
}

impl EngagementService for MockBackend {
    fn like_status(&self, session: &Session, video_id: &str) -> Result<bool> {
        let state = self.state.lock();
        let video = state
            .videos
            .iter()
            .find(|video| video.id == video_id)
            .ok_or_else(|| FeedError::NotFound("Video not found".into()))?;
        Ok(video.liked_by.iter().any(|id| id == &session.user_id))
    }

    fn toggle_like(&self, session: &Session, video_id: &str) -> Result<LikeToggle> {
        let mut state = self.state.lock();
        let video = state
            .videos
            .iter_mut()
            .find(|video| video.id == video_id)
            .ok_or_else(|| FeedError::NotFound("Video not found".into()))?;
        let liked = match video.liked_by.iter().position(|id| id == &session.user_id) {
            Some(idx) => {
                video.liked_by.remove(idx);
                video.likes = video.likes.saturating_sub(1);
                false
            }
            None => {
                video.liked_by.push(session.user_id.clone());
                video.likes += 1;
                true
            }
        };
        Ok(LikeToggle {
            liked,
            likes: video.likes,
        })
    }
}

impl CommentService for MockBackend {
    fn list_comments(&self, video_id: &str) -> Result<Vec<Comment>> {
        let state = self.state.lock();
        Ok(state.comments.get(video_id).cloned().unwrap_or_default())
    }

    fn post_comment(&self, session: &Session, video_id: &str, text: &str) -> Result<Comment> {
        let text = model::validate_comment(text)?;
        let mut state = self.state.lock();
        if !state.videos.iter().any(|video| video.id == video_id) {
            return Err(FeedError::NotFound("Video not found".into()).into());
        }
        let id = format!("comment-{}", state.next_comment);
        state.next_comment += 1;
        let comment = Comment {
            id,
            text,
            author: Some(UserSummary {
                id: Some(session.user_id.clone()),
                email: Some(session.email.clone()),
                ..UserSummary::default()
            }),
            created_at: Some(Utc::now()),
        };
        state
            .comments
            .entry(video_id.to_string())
            .or_default()
            .insert(0, comment.clone());
        Ok(comment)
    }
}

impl ProfileService for MockBackend {
    fn load_profile(&self, id_or_username: &str) -> Result<UserProfile> {
        let state = self.state.lock();
        let wanted = id_or_username.trim();
        let videos: Vec<VideoRecord> = state
            .videos
            .iter()
            .filter(|video| match &video.author {
                Some(UserRef::Populated(user)) => {
                    user.id.as_deref() == Some(wanted) || user.username.as_deref() == Some(wanted)
                }
                Some(UserRef::Id(id)) => id == wanted,
                None => false,
            })
            .cloned()
            .collect();
        let user = videos
            .iter()
            .find_map(|video| match &video.author {
                Some(UserRef::Populated(user)) => Some(user.clone()),
                _ => None,
            })
            .ok_or_else(|| FeedError::NotFound("User not found".into()))?;
        Ok(UserProfile {
            user,
            bio: None,
            stats: ProfileStats {
                videos: videos.len() as u64,
                followers: 0,
                following: 0,
            },
            videos,
        })
    }
}

/// Bare record with only the fields every reel needs.
pub fn mock_video(id: &str) -> VideoRecord {
    VideoRecord {
        id: id.to_string(),
        title: format!("Reel {id}"),
        description: String::new(),
        video_url: format!("https://ik.imagekit.io/reels/videos/{id}.mp4"),
        thumbnail_url: format!("https://ik.imagekit.io/reels/images/{id}.jpg"),
        duration: None,
        aspect_ratio: model::ASPECT_RATIO.to_string(),
        likes: 0,
        liked_by: Vec::new(),
        shares: 0,
        author: None,
        created_at: None,
    }
}

/// Identity used when browsing without a service.
pub fn offline_session() -> Session {
    Session {
        user_id: "offline".into(),
        email: "offline@localhost".into(),
        cookie: crate::auth::SessionCookie {
            name: crate::auth::SESSION_COOKIE.into(),
            value: "offline".into(),
        },
        expires_at: Utc::now() + ChronoDuration::days(365),
    }
}
