use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::multipart::Form;
use serde::Deserialize;
use tracing::info;

use crate::api::{self, UploadAuth};
use crate::auth::Session;
use crate::error::FeedError;
use crate::model::{self, NewVideo, Transformation, VideoRecord};

pub const MAX_VIDEO_BYTES: u64 = 100 * 1024 * 1024;
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_UPLOAD_URL: &str = "https://upload.imagekit.io/api/v1/files/upload";

const SNIFF_BYTES: usize = 8 * 1024;
const IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    pub fn folder(self) -> &'static str {
        match self {
            MediaKind::Video => "/videos",
            MediaKind::Image => "/images",
        }
    }

    pub fn max_bytes(self) -> u64 {
        match self {
            MediaKind::Video => MAX_VIDEO_BYTES,
            MediaKind::Image => MAX_IMAGE_BYTES,
        }
    }

    fn file_stem(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }

    /// Checks a sniffed mime type and size against this kind's limits.
    pub fn check(self, mime: &str, size: u64) -> Result<(), FeedError> {
        match self {
            MediaKind::Video if !mime.starts_with("video/") => {
                return Err(FeedError::Validation(
                    "please choose a video file".to_string(),
                ))
            }
            MediaKind::Image if !IMAGE_TYPES.contains(&mime) => {
                return Err(FeedError::Validation(
                    "thumbnails must be JPEG, PNG, or WEBP".to_string(),
                ))
            }
            _ => {}
        }
        if size >= self.max_bytes() {
            let limit_mb = self.max_bytes() / (1024 * 1024);
            return Err(FeedError::Validation(format!(
                "{} must be less than {limit_mb} MB",
                self.file_stem()
            )));
        }
        Ok(())
    }
}

/// A local file that passed validation.
#[derive(Debug, Clone)]
pub struct LocalMedia {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub mime: String,
    pub size: u64,
}

pub fn inspect(path: &Path, kind: MediaKind) -> Result<LocalMedia> {
    let mut file =
        File::open(path).with_context(|| format!("upload: open {}", path.display()))?;
    let size = file
        .metadata()
        .with_context(|| format!("upload: stat {}", path.display()))?
        .len();
    let mut head = Vec::with_capacity(SNIFF_BYTES);
    file.by_ref()
        .take(SNIFF_BYTES as u64)
        .read_to_end(&mut head)
        .with_context(|| format!("upload: read {}", path.display()))?;
    let mime = tree_magic_mini::from_u8(&head).to_string();
    kind.check(&mime, size)?;
    Ok(LocalMedia {
        path: path.to_path_buf(),
        kind,
        mime,
        size,
    })
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedMedia {
    pub url: String,
    #[serde(default)]
    pub file_id: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub duration: Option<f64>,
}

pub trait MediaHost: Send + Sync {
    fn upload(&self, media: &LocalMedia, auth: &UploadAuth) -> Result<UploadedMedia>;
}

pub struct ImageKitHost {
    http: reqwest::blocking::Client,
    upload_url: String,
}

impl ImageKitHost {
    pub fn new(upload_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("upload: build http client")?;
        let upload_url = upload_url.into();
        Ok(Self {
            http,
            upload_url: if upload_url.trim().is_empty() {
                DEFAULT_UPLOAD_URL.to_string()
            } else {
                upload_url
            },
        })
    }
}

impl MediaHost for ImageKitHost {
    fn upload(&self, media: &LocalMedia, auth: &UploadAuth) -> Result<UploadedMedia> {
        let extension = media
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let form = Form::new()
            .text("fileName", format!("{}{extension}", media.kind.file_stem()))
            .text("useUniqueFileName", "true")
            .text("folder", media.kind.folder())
            .text("publicKey", auth.public_key.clone())
            .text("signature", auth.signature.clone())
            .text("expire", auth.expire.to_string())
            .text("token", auth.token.clone())
            .file("file", &media.path)
            .with_context(|| format!("upload: attach {}", media.path.display()))?;
        let response = self
            .http
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .context("upload: send to media host")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("upload: media host returned {status}: {}", body.trim()));
        }
        response
            .json::<UploadedMedia>()
            .context("upload: decode media host response")
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub video: PathBuf,
    pub thumbnail: PathBuf,
    pub title: String,
    pub description: String,
    pub duration: Option<f64>,
}

impl UploadRequest {
    /// Checks what can be checked before any bytes leave the machine.
    pub fn validate(&self) -> Result<(), FeedError> {
        for (field, value) in [("title", &self.title), ("description", &self.description)] {
            if value.trim().is_empty() {
                return Err(FeedError::Validation(format!("{field} is required")));
            }
        }
        if let Some(duration) = self.duration {
            model::validate_duration(duration)?;
        }
        Ok(())
    }
}

/// Validates, uploads both files and creates the video record.
pub fn publish(
    client: &api::Client,
    host: &dyn MediaHost,
    session: &Session,
    auth_path: &str,
    request: &UploadRequest,
) -> Result<VideoRecord> {
    request.validate()?;
    let video = inspect(&request.video, MediaKind::Video)?;
    let thumbnail = inspect(&request.thumbnail, MediaKind::Image)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = (|| -> Result<VideoRecord> {
        spinner.set_message(format!("Uploading video ({} KB)", video.size / 1024));
        let auth = client.upload_auth(session, auth_path)?;
        let uploaded_video = host.upload(&video, &auth)?;

        spinner.set_message("Uploading thumbnail");
        let auth = client.upload_auth(session, auth_path)?;
        let uploaded_thumb = host.upload(&thumbnail, &auth)?;

        spinner.set_message("Saving video");
        let draft = draft_from_upload(request, &uploaded_video, &uploaded_thumb)?;
        client.create_video(session, &draft)
    })();
    spinner.finish_and_clear();

    let record = result?;
    info!(video_id = %record.id, "video published");
    Ok(record)
}

fn draft_from_upload(
    request: &UploadRequest,
    video: &UploadedMedia,
    thumbnail: &UploadedMedia,
) -> Result<NewVideo, FeedError> {
    let duration = video.duration.or(request.duration).unwrap_or(0.0);
    model::validate_duration(duration)?;
    if let (Some(width), Some(height)) = (video.width, video.height) {
        if !model::is_vertical_reel(width, height) {
            return Err(FeedError::Validation(format!(
                "videos must be vertical 9:16, got {width}x{height}"
            )));
        }
    }
    let draft = NewVideo {
        title: request.title.trim().to_string(),
        description: request.description.trim().to_string(),
        video_url: video.url.clone(),
        thumbnail_url: thumbnail.url.clone(),
        controls: true,
        duration,
        aspect_ratio: model::ASPECT_RATIO.to_string(),
        transformation: Transformation::default(),
    };
    draft.validate()?;
    Ok(draft)
}
