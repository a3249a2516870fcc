use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{COOKIE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::auth::Session;
use crate::error::ApiError;
use crate::model::{
    Comment, FeedPage, LikeStatus, LikeToggle, NewVideo, UserProfile, VideoRecord,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/";

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

/// Short-lived parameters the media host requires for a signed upload.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadAuth {
    pub token: String,
    pub expire: i64,
    pub signature: String,
    #[serde(default)]
    pub public_key: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeedResponse {
    Page(FeedPage),
    Bare(Vec<VideoRecord>),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("api client user agent required");
        }
        let base = if config.base_url.trim().is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            config.base_url
        };
        let base_url = normalize_base(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()
                .context("api: build http client")?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("api: build url for {path}"))
    }

    pub fn videos(&self, limit: usize, offset: usize) -> Result<FeedPage> {
        let mut url = self.endpoint("/api/videos")?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        let response: FeedResponse = self.fetch_json(self.http.get(url), None)?;
        Ok(match response {
            FeedResponse::Page(page) => page,
            FeedResponse::Bare(videos) => FeedPage {
                videos,
                pagination: None,
            },
        })
    }

    pub fn create_video(&self, session: &Session, video: &NewVideo) -> Result<VideoRecord> {
        let url = self.endpoint("/api/videos")?;
        self.fetch_json(self.http.post(url).json(video), Some(session))
            .context("api: create video")
    }

    pub fn like_status(&self, session: &Session, video_id: &str) -> Result<LikeStatus> {
        let url = self.video_endpoint(video_id, "like")?;
        self.fetch_json(self.http.get(url), Some(session))
    }

    pub fn toggle_like(&self, session: &Session, video_id: &str) -> Result<LikeToggle> {
        let url = self.video_endpoint(video_id, "like")?;
        self.fetch_json(self.http.post(url), Some(session))
    }

    pub fn comments(&self, video_id: &str) -> Result<Vec<Comment>> {
        let url = self.video_endpoint(video_id, "comments")?;
        self.fetch_json(self.http.get(url), None)
    }

    pub fn post_comment(&self, session: &Session, video_id: &str, text: &str) -> Result<Comment> {
        let url = self.video_endpoint(video_id, "comments")?;
        self.fetch_json(
            self.http.post(url).json(&json!({ "text": text })),
            Some(session),
        )
    }

    pub fn user_profile(&self, id_or_username: &str) -> Result<UserProfile> {
        let id = id_or_username.trim();
        if id.is_empty() {
            bail!("api: user id required");
        }
        let mut url = self.endpoint("/api/users/")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("api: base url cannot hold a path"))?
            .pop_if_empty()
            .push(id);
        self.fetch_json(self.http.get(url), None)
    }

    pub fn upload_auth(&self, session: &Session, path: &str) -> Result<UploadAuth> {
        let url = self.endpoint(path)?;
        self.fetch_json(self.http.get(url), Some(session))
            .context("api: fetch upload credentials")
    }

    fn video_endpoint(&self, video_id: &str, action: &str) -> Result<Url> {
        let id = video_id.trim();
        if id.is_empty() {
            bail!("api: video id required");
        }
        let mut url = self.endpoint("/api/videos/")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("api: base url cannot hold a path"))?
            .pop_if_empty()
            .push(id)
            .push(action);
        Ok(url)
    }

    pub fn send(&self, builder: RequestBuilder, session: Option<&Session>) -> Result<Response> {
        let mut builder = builder.header(USER_AGENT, &self.user_agent);
        if let Some(session) = session {
            builder = builder.header(COOKIE, session.cookie.header_value());
        }
        let response = builder.send().context("api: send request")?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "api response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|parsed| parsed.error)
            .unwrap_or_else(|_| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    trimmed.to_string()
                }
            });
        Err(ApiError::Status { status, message }.into())
    }

    fn fetch_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        session: Option<&Session>,
    ) -> Result<T> {
        let response = self.send(builder, session)?;
        response.json::<T>().context("api: decode response body")
    }
}

fn normalize_base(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash).with_context(|| format!("api: invalid base url {raw}"))
}
