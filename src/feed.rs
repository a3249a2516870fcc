//! Reel feed controller.
//!
//! Owns the loaded videos, the single active slide, pagination and
//! per-video engagement. Network work runs on worker threads; results are
//! applied on the owner's thread in [`ReelFeed::poll`]. Side effects the host
//! must perform come out of [`ReelFeed::take_effects`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::comments::CommentPanel;
use crate::data::{CommentService, EngagementService, FeedService};
use crate::engagement::{Engagement, Snapshot};
use crate::error::FeedError;
use crate::model::{self, Comment, FeedPage, LikeToggle, VideoRecord};
use crate::playback::{Command, PlayFailure, Slide};

pub const PAGE_SIZE: usize = 10;
pub const LOAD_MORE_THRESHOLD: f64 = 0.8;
pub const ACTIVE_RATIO_THRESHOLD: f64 = 0.5;

/// Collaborators and identity the feed works with.
pub struct FeedContext {
    pub feed: Arc<dyn FeedService>,
    pub engagement: Arc<dyn EngagementService>,
    pub comments: Arc<dyn CommentService>,
    pub session: Option<Session>,
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Visibility { slide: usize, ratio: f64 },
    Scroll { offset: f64, viewport: f64, content: f64 },
    Interaction,
    Tap(usize),
    MediaReady(usize),
    MediaFailed { slide: usize, reason: String },
    PlayStarted(usize),
    PlayFailed { slide: usize, failure: PlayFailure },
    Ended(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Play(usize),
    Pause(usize),
    ScrollIntoView(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    fn info(title: &str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.to_string(),
            message: message.into(),
        }
    }

    fn error(title: &str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

enum Response {
    Page {
        request_id: u64,
        result: Result<FeedPage>,
    },
    LikeStatus {
        epoch: u64,
        slide: usize,
        result: Result<bool>,
    },
    LikeToggled {
        epoch: u64,
        slide: usize,
        snapshot: Snapshot,
        result: Result<LikeToggle>,
    },
    Comments {
        request_id: u64,
        result: Result<Vec<Comment>>,
    },
    CommentPosted {
        request_id: u64,
        video_id: String,
        draft: String,
        result: Result<Comment>,
    },
}

pub struct ReelFeed {
    ctx: FeedContext,
    videos: Vec<VideoRecord>,
    slides: Vec<Slide>,
    engagement: Vec<Engagement>,
    has_more: bool,
    pending_page: Option<u64>,
    page_error: Option<FeedError>,
    active: Option<usize>,
    interacted: bool,
    comment_panel: Option<CommentPanel>,
    // Draft of a post that failed after its panel closed, keyed by video id.
    failed_draft: Option<(String, String)>,
    effects: VecDeque<Effect>,
    notices: Vec<Notice>,
    event_tx: Sender<FeedEvent>,
    event_rx: Receiver<FeedEvent>,
    response_tx: Sender<Response>,
    response_rx: Receiver<Response>,
    next_request_id: u64,
    session_epoch: u64,
    closed: bool,
}

impl ReelFeed {
    pub fn new(mut ctx: FeedContext, seed: Vec<VideoRecord>) -> Self {
        if ctx.page_size == 0 {
            ctx.page_size = PAGE_SIZE;
        }
        let (event_tx, event_rx) = unbounded();
        let (response_tx, response_rx) = unbounded();
        let mut feed = Self {
            ctx,
            videos: Vec::new(),
            slides: Vec::new(),
            engagement: Vec::new(),
            has_more: true,
            pending_page: None,
            page_error: None,
            active: None,
            interacted: false,
            comment_panel: None,
            failed_draft: None,
            effects: VecDeque::new(),
            notices: Vec::new(),
            event_tx,
            event_rx,
            response_tx,
            response_rx,
            next_request_id: 1,
            session_epoch: 0,
            closed: false,
        };
        feed.append(seed);
        if !feed.videos.is_empty() {
            feed.set_active(0);
        }
        feed
    }

    pub fn videos(&self) -> &[VideoRecord] {
        &self.videos
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    pub fn video(&self, slide: usize) -> Option<&VideoRecord> {
        self.videos.get(slide)
    }

    pub fn slide(&self, slide: usize) -> Option<&Slide> {
        self.slides.get(slide)
    }

    pub fn engagement(&self, slide: usize) -> Option<&Engagement> {
        self.engagement.get(slide)
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.pending_page.is_some()
    }

    pub fn page_error(&self) -> Option<&FeedError> {
        self.page_error.as_ref()
    }

    pub fn comment_panel(&self) -> Option<&CommentPanel> {
        self.comment_panel.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.ctx.session.as_ref()
    }

    pub fn has_interacted(&self) -> bool {
        self.interacted
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn event_sender(&self) -> Sender<FeedEvent> {
        self.event_tx.clone()
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        self.effects.drain(..).collect()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Requests the next page. Returns false when nothing was sent.
    pub fn load_more(&mut self) -> bool {
        if self.closed || self.pending_page.is_some() || !self.has_more {
            return false;
        }
        let request_id = self.next_request_id();
        self.pending_page = Some(request_id);
        self.page_error = None;

        let offset = self.videos.len();
        let limit = self.ctx.page_size;
        let service = Arc::clone(&self.ctx.feed);
        let tx = self.response_tx.clone();
        debug!(offset, limit, "requesting feed page");
        thread::spawn(move || {
            let result = service.load_page(limit, offset);
            let _ = tx.send(Response::Page { request_id, result });
        });
        true
    }

    pub fn retry(&mut self) -> bool {
        if self.page_error.take().is_none() && !self.videos.is_empty() {
            return false;
        }
        self.load_more()
    }

    pub fn on_scroll(&mut self, offset: f64, viewport: f64, content: f64) -> bool {
        if self.closed || content <= 0.0 {
            return false;
        }
        if (offset + viewport) / content > LOAD_MORE_THRESHOLD {
            return self.load_more();
        }
        false
    }

    pub fn handle(&mut self, event: FeedEvent) {
        if self.closed {
            return;
        }
        match event {
            FeedEvent::Visibility { slide, ratio } => {
                if slide < self.slides.len() && ratio > ACTIVE_RATIO_THRESHOLD {
                    self.set_active(slide);
                }
            }
            FeedEvent::Scroll {
                offset,
                viewport,
                content,
            } => {
                self.on_scroll(offset, viewport, content);
            }
            FeedEvent::Interaction => self.record_interaction(),
            FeedEvent::Tap(slide) => self.tap(slide),
            FeedEvent::MediaReady(slide) => {
                let gate = self.interacted;
                if let Some(command) = self.slides.get_mut(slide).and_then(|s| s.media_ready(gate))
                {
                    self.push_command(slide, command);
                }
            }
            FeedEvent::MediaFailed { slide, reason } => {
                if let Some(state) = self.slides.get_mut(slide) {
                    warn!(slide, %reason, "media failed to load");
                    state.media_failed(reason);
                }
            }
            FeedEvent::PlayStarted(slide) => {
                if let Some(command) = self.slides.get_mut(slide).and_then(Slide::play_started) {
                    self.push_command(slide, command);
                }
            }
            FeedEvent::PlayFailed { slide, failure } => {
                if let Some(state) = self.slides.get_mut(slide) {
                    debug!(slide, %failure, "play attempt failed");
                    state.play_failed(failure);
                }
            }
            FeedEvent::Ended(slide) => self.on_ended(slide),
        }
    }

    /// The first call opens the autoplay gate for the rest of the session.
    pub fn record_interaction(&mut self) {
        if self.closed || self.interacted {
            return;
        }
        self.interacted = true;
        debug!("first interaction recorded");
        if let Some(active) = self.active {
            if let Some(command) = self.slides[active].interaction() {
                self.push_command(active, command);
            }
        }
    }

    pub fn tap(&mut self, slide: usize) {
        if self.closed {
            return;
        }
        self.interacted = true;
        if let Some(command) = self.slides.get_mut(slide).and_then(Slide::tap) {
            self.push_command(slide, command);
        }
    }

    pub fn toggle_like(&mut self, slide: usize) -> Result<(), FeedError> {
        let Some(session) = self.ctx.session.clone() else {
            return Err(FeedError::Unauthorized);
        };
        let video_id = self
            .videos
            .get(slide)
            .map(|video| video.id.clone())
            .ok_or_else(|| FeedError::NotFound(format!("slide {slide}")))?;
        if self.closed {
            return Ok(());
        }
        let snapshot = self.engagement[slide].apply_toggle();
        let epoch = self.session_epoch;
        let service = Arc::clone(&self.ctx.engagement);
        let tx = self.response_tx.clone();
        debug!(%video_id, liked = self.engagement[slide].liked, "toggling like");
        thread::spawn(move || {
            let result = service.toggle_like(&session, &video_id);
            let _ = tx.send(Response::LikeToggled {
                epoch,
                slide,
                snapshot,
                result,
            });
        });
        Ok(())
    }

    /// Counts a local share and returns the link to hand out.
    pub fn share(&mut self, slide: usize) -> Result<String, FeedError> {
        let url = self
            .videos
            .get(slide)
            .map(|video| video.video_url.clone())
            .ok_or_else(|| FeedError::NotFound(format!("slide {slide}")))?;
        self.engagement[slide].record_share();
        Ok(url)
    }

    pub fn open_comments(&mut self, slide: usize) -> Result<(), FeedError> {
        let video_id = self
            .videos
            .get(slide)
            .map(|video| video.id.clone())
            .ok_or_else(|| FeedError::NotFound(format!("slide {slide}")))?;
        if self.closed {
            return Ok(());
        }
        let request_id = self.next_request_id();
        let mut panel = CommentPanel::open(slide, video_id.clone(), request_id);
        if matches!(&self.failed_draft, Some((failed_for, _)) if *failed_for == video_id) {
            if let Some((_, draft)) = self.failed_draft.take() {
                panel.input = draft;
            }
        }
        self.comment_panel = Some(panel);

        let service = Arc::clone(&self.ctx.comments);
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = service.list_comments(&video_id);
            let _ = tx.send(Response::Comments { request_id, result });
        });
        Ok(())
    }

    pub fn close_comments(&mut self) {
        self.comment_panel = None;
    }

    pub fn set_comment_input(&mut self, text: impl Into<String>) {
        if let Some(panel) = self.comment_panel.as_mut() {
            panel.input = text.into();
        }
    }

    pub fn push_comment_char(&mut self, ch: char) {
        if let Some(panel) = self.comment_panel.as_mut() {
            panel.input.push(ch);
        }
    }

    pub fn pop_comment_char(&mut self) {
        if let Some(panel) = self.comment_panel.as_mut() {
            panel.input.pop();
        }
    }

    pub fn submit_comment(&mut self) -> Result<(), FeedError> {
        let Some(panel) = self.comment_panel.as_mut() else {
            return Err(FeedError::Validation("no comment panel is open".into()));
        };
        let Some(session) = self.ctx.session.clone() else {
            return Err(FeedError::Unauthorized);
        };
        let text = model::validate_comment(&panel.input)?;
        if self.closed {
            return Ok(());
        }
        let draft = panel.take_input();
        let request_id = panel.request_id;
        let video_id = panel.video_id.clone();

        let service = Arc::clone(&self.ctx.comments);
        let tx = self.response_tx.clone();
        debug!(%video_id, chars = text.chars().count(), "posting comment");
        thread::spawn(move || {
            let result = service.post_comment(&session, &video_id, &text);
            let _ = tx.send(Response::CommentPosted {
                request_id,
                video_id,
                draft,
                result,
            });
        });
        Ok(())
    }

    /// Swaps the signed-in identity and re-derives like status for every slide.
    pub fn set_session(&mut self, session: Option<Session>) {
        self.session_epoch = self.session_epoch.wrapping_add(1);
        info!(
            user_id = session.as_ref().map(|s| s.user_id.as_str()).unwrap_or("-"),
            "feed session changed"
        );
        self.ctx.session = session;
        for state in &mut self.engagement {
            state.reset_viewer();
        }
        for slide in 0..self.videos.len() {
            self.query_like_status(slide);
        }
    }

    /// Unmounts the feed. Work already in flight finishes but is ignored.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        for idx in 0..self.slides.len() {
            if let Some(command) = self.slides[idx].deactivate() {
                self.push_command(idx, command);
            }
        }
        self.closed = true;
        self.comment_panel = None;
        self.pending_page = None;
        debug!("feed closed");
    }

    /// Applies queued events and finished requests. Returns true if anything changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle(event);
            changed = true;
        }
        while let Ok(response) = self.response_rx.try_recv() {
            self.handle_response(response);
            changed = true;
        }
        changed
    }

    /// Like [`poll`](Self::poll) but waits up to `timeout` for a finished request.
    pub fn poll_timeout(&mut self, timeout: Duration) -> bool {
        let mut changed = self.poll();
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => {
                self.handle_response(response);
                changed = true;
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
        }
        self.poll() || changed
    }

    fn handle_response(&mut self, response: Response) {
        if self.closed {
            return;
        }
        match response {
            Response::Page { request_id, result } => {
                if self.pending_page != Some(request_id) {
                    return;
                }
                self.pending_page = None;
                match result {
                    Ok(page) => {
                        let has_more = page.has_more();
                        let was_empty = self.videos.is_empty();
                        let count = page.videos.len();
                        self.append(page.videos);
                        self.has_more = has_more;
                        debug!(count, total = self.videos.len(), has_more, "feed page applied");
                        if was_empty && !self.videos.is_empty() && self.active.is_none() {
                            self.set_active(0);
                        }
                    }
                    Err(err) => {
                        let error = FeedError::from_api(&err);
                        warn!(error = %format!("{err:#}"), "feed page failed");
                        self.notices
                            .push(Notice::error("Couldn't load videos", error.to_string()));
                        self.page_error = Some(error);
                    }
                }
            }
            Response::LikeStatus {
                epoch,
                slide,
                result,
            } => {
                if epoch != self.session_epoch {
                    return;
                }
                let liked = match result {
                    Ok(liked) => liked,
                    Err(err) => {
                        debug!(slide, error = %format!("{err:#}"), "like status unavailable");
                        false
                    }
                };
                if let Some(state) = self.engagement.get_mut(slide) {
                    state.observe_status(liked);
                }
            }
            Response::LikeToggled {
                epoch,
                slide,
                snapshot,
                result,
            } => {
                if epoch != self.session_epoch {
                    return;
                }
                let Some(state) = self.engagement.get_mut(slide) else {
                    return;
                };
                match result {
                    Ok(toggle) => state.confirm(toggle.liked, toggle.likes),
                    Err(err) => {
                        state.revert(snapshot);
                        let error = FeedError::from_api(&err);
                        warn!(slide, error = %format!("{err:#}"), "like toggle failed");
                        self.notices
                            .push(Notice::error("Couldn't update like", error.to_string()));
                    }
                }
            }
            Response::Comments { request_id, result } => {
                let Some(panel) = self
                    .comment_panel
                    .as_mut()
                    .filter(|panel| panel.request_id == request_id)
                else {
                    return;
                };
                match result {
                    Ok(comments) => panel.loaded(comments),
                    Err(err) => {
                        panel.load_failed();
                        let error = FeedError::from_api(&err);
                        warn!(error = %format!("{err:#}"), "comments failed to load");
                        self.notices
                            .push(Notice::error("Couldn't load comments", error.to_string()));
                    }
                }
            }
            Response::CommentPosted {
                request_id,
                video_id,
                draft,
                result,
            } => {
                let panel = self
                    .comment_panel
                    .as_mut()
                    .filter(|panel| panel.request_id == request_id);
                match result {
                    Ok(comment) => {
                        if let Some(panel) = panel {
                            panel.posted(comment);
                        }
                        self.notices.push(Notice::info("Comment posted", ""));
                    }
                    Err(err) => {
                        match panel {
                            Some(panel) => panel.post_failed(draft),
                            None => self.failed_draft = Some((video_id, draft)),
                        }
                        let error = FeedError::from_api(&err);
                        warn!(error = %format!("{err:#}"), "comment post failed");
                        self.notices
                            .push(Notice::error("Couldn't post comment", error.to_string()));
                    }
                }
            }
        }
    }

    fn append(&mut self, videos: Vec<VideoRecord>) {
        let start = self.videos.len();
        for video in videos {
            let mut slide = Slide::default();
            slide.mount();
            self.engagement
                .push(Engagement::new(video.likes, video.shares));
            self.slides.push(slide);
            self.videos.push(video);
        }
        for idx in start..self.videos.len() {
            self.query_like_status(idx);
        }
    }

    fn query_like_status(&mut self, slide: usize) {
        let Some(session) = self.ctx.session.clone() else {
            if let Some(state) = self.engagement.get_mut(slide) {
                state.observe_status(false);
            }
            return;
        };
        let Some(video_id) = self.videos.get(slide).map(|video| video.id.clone()) else {
            return;
        };
        let epoch = self.session_epoch;
        let service = Arc::clone(&self.ctx.engagement);
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = service.like_status(&session, &video_id);
            let _ = tx.send(Response::LikeStatus {
                epoch,
                slide,
                result,
            });
        });
    }

    fn set_active(&mut self, slide: usize) {
        if self.active == Some(slide) || slide >= self.slides.len() {
            return;
        }
        if let Some(previous) = self.active {
            if let Some(command) = self.slides[previous].deactivate() {
                self.push_command(previous, command);
            }
        }
        self.active = Some(slide);
        let gate = self.interacted;
        if let Some(command) = self.slides[slide].activate(gate) {
            self.push_command(slide, command);
        }
    }

    fn on_ended(&mut self, slide: usize) {
        let Some(state) = self.slides.get_mut(slide) else {
            return;
        };
        state.ended();
        if self.active != Some(slide) {
            return;
        }
        let next = slide + 1;
        if next < self.videos.len() {
            self.set_active(next);
            self.effects.push_back(Effect::ScrollIntoView(next));
        }
    }

    fn push_command(&mut self, slide: usize, command: Command) {
        self.effects.push_back(match command {
            Command::Play => Effect::Play(slide),
            Command::Pause => Effect::Pause(slide),
        });
    }

    fn next_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }
}
