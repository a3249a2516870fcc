use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use reels_tui::auth::Session;
use reels_tui::data::{
    mock_video, offline_session, CommentService, EngagementService, FeedService,
};
use reels_tui::error::FeedError;
use reels_tui::feed::{Effect, FeedContext, FeedEvent, NoticeLevel, ReelFeed, PAGE_SIZE};
use reels_tui::model::{Comment, FeedPage, LikeToggle, Pagination, VideoRecord};
use reels_tui::playback::PlaybackState;

const STEP: Duration = Duration::from_millis(10);
const MAX_STEPS: usize = 300;

/// Serves queued pages, optionally holding each one until the test releases it.
struct ScriptedFeed {
    pages: Mutex<VecDeque<FeedPage>>,
    gate: Option<Receiver<()>>,
    calls: AtomicUsize,
    offsets: Mutex<Vec<usize>>,
}

impl ScriptedFeed {
    fn new(pages: Vec<FeedPage>, gate: Option<Receiver<()>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            gate,
            calls: AtomicUsize::new(0),
            offsets: Mutex::new(Vec::new()),
        }
    }
}

impl FeedService for ScriptedFeed {
    fn load_page(&self, _limit: usize, offset: usize) -> Result<FeedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.offsets.lock().push(offset);
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        self.pages
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow!("no more scripted pages"))
    }
}

struct ScriptedEngagement {
    toggle: Option<LikeToggle>,
    toggle_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl ScriptedEngagement {
    fn new(toggle: Option<LikeToggle>) -> Self {
        Self {
            toggle,
            toggle_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }
}

impl EngagementService for ScriptedEngagement {
    fn like_status(&self, _session: &Session, _video_id: &str) -> Result<bool> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }

    fn toggle_like(&self, _session: &Session, _video_id: &str) -> Result<LikeToggle> {
        self.toggle_calls.fetch_add(1, Ordering::SeqCst);
        self.toggle.ok_or_else(|| anyhow!("toggle rejected"))
    }
}

struct ScriptedComments {
    accept: bool,
    posted: Mutex<Vec<(String, String)>>,
}

impl CommentService for ScriptedComments {
    fn list_comments(&self, _video_id: &str) -> Result<Vec<Comment>> {
        Ok(Vec::new())
    }

    fn post_comment(&self, _session: &Session, video_id: &str, text: &str) -> Result<Comment> {
        self.posted.lock().push((video_id.to_string(), text.to_string()));
        if !self.accept {
            return Err(anyhow!("comment rejected"));
        }
        Ok(Comment {
            id: "c-new".into(),
            text: text.to_string(),
            author: None,
            created_at: None,
        })
    }
}

struct Harness {
    feed: Arc<ScriptedFeed>,
    engagement: Arc<ScriptedEngagement>,
    comments: Arc<ScriptedComments>,
}

impl Harness {
    fn new(feed: ScriptedFeed, toggle: Option<LikeToggle>, accept_comments: bool) -> Self {
        Self {
            feed: Arc::new(feed),
            engagement: Arc::new(ScriptedEngagement::new(toggle)),
            comments: Arc::new(ScriptedComments {
                accept: accept_comments,
                posted: Mutex::new(Vec::new()),
            }),
        }
    }

    fn reel_feed(&self, seed: Vec<VideoRecord>, session: Option<Session>) -> ReelFeed {
        ReelFeed::new(
            FeedContext {
                feed: self.feed.clone(),
                engagement: self.engagement.clone(),
                comments: self.comments.clone(),
                session,
                page_size: PAGE_SIZE,
            },
            seed,
        )
    }
}

fn videos(prefix: &str, count: usize) -> Vec<VideoRecord> {
    (0..count)
        .map(|i| mock_video(&format!("{prefix}{i}")))
        .collect()
}

fn page(prefix: &str, count: usize, has_more: bool) -> FeedPage {
    FeedPage {
        videos: videos(prefix, count),
        pagination: Some(Pagination {
            total: 0,
            limit: PAGE_SIZE,
            offset: 0,
            has_more,
        }),
    }
}

fn settle(feed: &mut ReelFeed, busy: impl Fn(&ReelFeed) -> bool) {
    for _ in 0..MAX_STEPS {
        if !busy(feed) {
            return;
        }
        feed.poll_timeout(STEP);
    }
    panic!("feed did not settle");
}

#[test]
fn load_more_while_pending_issues_no_second_call() {
    let (release, gate): (Sender<()>, Receiver<()>) = unbounded();
    let harness = Harness::new(
        ScriptedFeed::new(vec![page("p", 10, true)], Some(gate)),
        None,
        true,
    );
    let mut feed = harness.reel_feed(Vec::new(), None);

    assert!(feed.load_more());
    assert!(!feed.load_more());
    assert!(!feed.on_scroll(900.0, 100.0, 1000.0));
    assert!(feed.is_loading());

    release.send(()).unwrap();
    settle(&mut feed, ReelFeed::is_loading);
    assert_eq!(harness.feed.calls.load(Ordering::SeqCst), 1);
    assert_eq!(feed.len(), 10);
}

#[test]
fn list_grows_by_each_page_and_stops_at_the_end() {
    let harness = Harness::new(
        ScriptedFeed::new(
            vec![page("a", 10, true), page("b", 10, true), page("c", 3, false)],
            None,
        ),
        None,
        true,
    );
    let mut feed = harness.reel_feed(Vec::new(), None);

    let mut lengths = Vec::new();
    while feed.load_more() {
        settle(&mut feed, ReelFeed::is_loading);
        lengths.push(feed.len());
    }
    assert_eq!(lengths, vec![10, 20, 23]);
    assert!(!feed.has_more());
    assert_eq!(*harness.feed.offsets.lock(), vec![0, 10, 20]);
    assert_eq!(feed.video(0).map(|v| v.id.as_str()), Some("a0"));
    assert_eq!(feed.video(22).map(|v| v.id.as_str()), Some("c2"));
}

#[test]
fn failed_page_keeps_list_and_can_retry() {
    let harness = Harness::new(ScriptedFeed::new(Vec::new(), None), None, true);
    let mut feed = harness.reel_feed(videos("s", 2), None);

    assert!(feed.load_more());
    settle(&mut feed, ReelFeed::is_loading);
    assert_eq!(feed.len(), 2);
    assert!(matches!(feed.page_error(), Some(FeedError::Network(_))));
    assert!(feed
        .take_notices()
        .iter()
        .any(|notice| notice.level == NoticeLevel::Error));

    harness.feed.pages.lock().push_back(page("r", 4, false));
    assert!(feed.retry());
    settle(&mut feed, ReelFeed::is_loading);
    assert_eq!(feed.len(), 6);
    assert!(feed.page_error().is_none());
}

#[test]
fn one_slide_stays_active_after_visibility_settles() {
    let harness = Harness::new(ScriptedFeed::new(Vec::new(), None), None, true);
    let mut feed = harness.reel_feed(videos("v", 5), None);

    let tx = feed.event_sender();
    for (slide, ratio) in [(1, 0.7), (2, 0.3), (3, 0.6), (4, 0.5)] {
        tx.send(FeedEvent::Visibility { slide, ratio }).unwrap();
    }
    feed.poll();

    assert_eq!(feed.active(), Some(3));
    let active: Vec<usize> = (0..feed.len())
        .filter(|&idx| feed.slide(idx).is_some_and(|slide| slide.is_active()))
        .collect();
    assert_eq!(active, vec![3]);
}

#[test]
fn ending_advances_to_next_slide() {
    let harness = Harness::new(ScriptedFeed::new(Vec::new(), None), None, true);
    let mut feed = harness.reel_feed(videos("v", 3), None);
    feed.record_interaction();
    for idx in 0..3 {
        feed.handle(FeedEvent::MediaReady(idx));
    }
    feed.handle(FeedEvent::PlayStarted(0));
    feed.take_effects();

    feed.handle(FeedEvent::Ended(0));
    assert_eq!(feed.active(), Some(1));
    let effects = feed.take_effects();
    assert!(effects.contains(&Effect::Play(1)));
    assert!(effects.contains(&Effect::ScrollIntoView(1)));
}

#[test]
fn failed_toggle_reverts_optimistic_like() {
    let harness = Harness::new(ScriptedFeed::new(Vec::new(), None), None, true);
    let mut seed = videos("v", 1);
    seed[0].likes = 10;
    let mut feed = harness.reel_feed(seed, Some(offline_session()));

    feed.toggle_like(0).unwrap();
    let state = feed.engagement(0).unwrap();
    assert!(state.liked);
    assert_eq!(state.like_count, 11);

    settle(&mut feed, |feed| {
        feed.engagement(0).is_some_and(|state| state.is_pending())
    });
    let state = feed.engagement(0).unwrap();
    assert!(!state.liked);
    assert_eq!(state.like_count, 10);
    assert_eq!(harness.engagement.toggle_calls.load(Ordering::SeqCst), 1);
    assert!(feed
        .take_notices()
        .iter()
        .any(|notice| notice.level == NoticeLevel::Error));
}

#[test]
fn confirmed_toggle_takes_server_values() {
    let harness = Harness::new(
        ScriptedFeed::new(Vec::new(), None),
        Some(LikeToggle {
            liked: true,
            likes: 42,
        }),
        true,
    );
    let mut seed = videos("v", 1);
    seed[0].likes = 10;
    let mut feed = harness.reel_feed(seed, Some(offline_session()));

    feed.toggle_like(0).unwrap();
    settle(&mut feed, |feed| {
        feed.engagement(0).is_some_and(|state| state.is_pending())
    });
    let state = feed.engagement(0).unwrap();
    assert!(state.liked);
    assert_eq!(state.like_count, 42);
}

#[test]
fn like_without_session_makes_no_call() {
    let harness = Harness::new(ScriptedFeed::new(Vec::new(), None), None, true);
    let mut seed = videos("v", 1);
    seed[0].likes = 10;
    let mut feed = harness.reel_feed(seed, None);
    let before = *feed.engagement(0).unwrap();

    assert_eq!(feed.toggle_like(0), Err(FeedError::Unauthorized));
    feed.poll_timeout(STEP);
    assert_eq!(*feed.engagement(0).unwrap(), before);
    assert_eq!(harness.engagement.toggle_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.engagement.status_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn accepted_comment_is_prepended_and_input_cleared() {
    let harness = Harness::new(ScriptedFeed::new(Vec::new(), None), None, true);
    let mut feed = harness.reel_feed(videos("v", 2), Some(offline_session()));

    feed.open_comments(1).unwrap();
    settle(&mut feed, |feed| {
        feed.comment_panel().is_some_and(|panel| panel.loading)
    });
    feed.set_comment_input("nice!");
    feed.submit_comment().unwrap();
    assert_eq!(feed.comment_panel().unwrap().input, "");

    settle(&mut feed, |feed| {
        feed.comment_panel().is_some_and(|panel| panel.submitting)
    });
    let panel = feed.comment_panel().unwrap();
    assert_eq!(panel.len(), 1);
    assert_eq!(panel.comments[0].text, "nice!");
    assert_eq!(
        *harness.comments.posted.lock(),
        vec![("v1".to_string(), "nice!".to_string())]
    );
}

#[test]
fn rejected_comment_restores_input() {
    let harness = Harness::new(ScriptedFeed::new(Vec::new(), None), None, false);
    let mut feed = harness.reel_feed(videos("v", 1), Some(offline_session()));

    feed.open_comments(0).unwrap();
    settle(&mut feed, |feed| {
        feed.comment_panel().is_some_and(|panel| panel.loading)
    });
    feed.set_comment_input("nice!");
    feed.submit_comment().unwrap();
    settle(&mut feed, |feed| {
        feed.comment_panel().is_some_and(|panel| panel.submitting)
    });

    let panel = feed.comment_panel().unwrap();
    assert_eq!(panel.input, "nice!");
    assert!(panel.is_empty());
}

#[test]
fn comment_length_is_validated_before_sending() {
    let harness = Harness::new(ScriptedFeed::new(Vec::new(), None), None, true);
    let mut feed = harness.reel_feed(videos("v", 1), Some(offline_session()));
    feed.open_comments(0).unwrap();

    feed.set_comment_input("   ");
    assert!(matches!(feed.submit_comment(), Err(FeedError::Validation(_))));
    feed.set_comment_input("x".repeat(501));
    assert!(matches!(feed.submit_comment(), Err(FeedError::Validation(_))));
    assert!(harness.comments.posted.lock().is_empty());
}

#[test]
fn autoplay_waits_for_first_interaction() {
    let harness = Harness::new(ScriptedFeed::new(Vec::new(), None), None, true);
    let mut feed = harness.reel_feed(videos("v", 2), None);

    feed.handle(FeedEvent::MediaReady(0));
    assert_eq!(
        feed.slide(0).unwrap().state(),
        PlaybackState::NeedsInteraction
    );
    assert!(feed.take_effects().is_empty());

    feed.record_interaction();
    assert_eq!(feed.take_effects(), vec![Effect::Play(0)]);
    feed.handle(FeedEvent::PlayStarted(0));
    assert_eq!(feed.slide(0).unwrap().state(), PlaybackState::Playing);
}

#[test]
fn permission_failure_asks_for_interaction_again() {
    let harness = Harness::new(ScriptedFeed::new(Vec::new(), None), None, true);
    let mut feed = harness.reel_feed(videos("v", 1), None);
    feed.record_interaction();
    feed.handle(FeedEvent::MediaReady(0));
    assert_eq!(feed.take_effects(), vec![Effect::Play(0)]);

    feed.handle(FeedEvent::PlayFailed {
        slide: 0,
        failure: reels_tui::playback::PlayFailure::NotAllowed,
    });
    assert!(feed.slide(0).unwrap().needs_interaction());

    feed.tap(0);
    assert_eq!(feed.take_effects(), vec![Effect::Play(0)]);
}

/// Holds each toggle until released, then answers with `reply` or an error.
struct SlowToggle {
    gate: Receiver<()>,
    reply: Option<LikeToggle>,
}

impl EngagementService for SlowToggle {
    fn like_status(&self, _session: &Session, _video_id: &str) -> Result<bool> {
        Ok(false)
    }

    fn toggle_like(&self, _session: &Session, _video_id: &str) -> Result<LikeToggle> {
        let _ = self.gate.recv();
        self.reply.ok_or_else(|| anyhow!("toggle rejected"))
    }
}

fn liked_video_feed(harness: &Harness, engagement: SlowToggle, likes: u64) -> ReelFeed {
    let mut seed = videos("v", 1);
    seed[0].likes = likes;
    ReelFeed::new(
        FeedContext {
            feed: harness.feed.clone(),
            engagement: Arc::new(engagement),
            comments: harness.comments.clone(),
            session: Some(offline_session()),
            page_size: PAGE_SIZE,
        },
        seed,
    )
}

#[test]
fn session_change_discards_stale_like_responses() {
    let (release, gate) = unbounded::<()>();
    let harness = Harness::new(ScriptedFeed::new(Vec::new(), None), None, true);
    let reply = Some(LikeToggle {
        liked: true,
        likes: 99,
    });
    let mut feed = liked_video_feed(&harness, SlowToggle { gate, reply }, 10);

    feed.toggle_like(0).unwrap();
    feed.set_session(None);
    release.send(()).unwrap();
    for _ in 0..20 {
        feed.poll_timeout(STEP);
    }
    let state = feed.engagement(0).unwrap();
    assert!(!state.liked);
    assert_eq!(state.like_count, 10);
}

#[test]
fn session_change_undoes_an_unresolved_like() {
    let (release, gate) = unbounded::<()>();
    let harness = Harness::new(ScriptedFeed::new(Vec::new(), None), None, true);
    let mut feed = liked_video_feed(&harness, SlowToggle { gate, reply: None }, 10);

    feed.toggle_like(0).unwrap();
    let state = feed.engagement(0).unwrap();
    assert_eq!((state.liked, state.like_count), (true, 11));

    feed.set_session(None);
    let state = feed.engagement(0).unwrap();
    assert_eq!((state.liked, state.like_count), (false, 10));
    assert!(!state.is_pending());

    release.send(()).unwrap();
    for _ in 0..20 {
        feed.poll_timeout(STEP);
    }
    let state = feed.engagement(0).unwrap();
    assert_eq!((state.liked, state.like_count), (false, 10));
}

/// Fails every post once the test releases it.
struct GatedRejectingComments {
    gate: Receiver<()>,
}

impl CommentService for GatedRejectingComments {
    fn list_comments(&self, _video_id: &str) -> Result<Vec<Comment>> {
        Ok(Vec::new())
    }

    fn post_comment(&self, _session: &Session, _video_id: &str, _text: &str) -> Result<Comment> {
        let _ = self.gate.recv();
        Err(anyhow!("comment rejected"))
    }
}

#[test]
fn failed_post_after_panel_closed_still_notifies_and_keeps_draft() {
    let (release, gate) = unbounded::<()>();
    let harness = Harness::new(ScriptedFeed::new(Vec::new(), None), None, true);
    let mut feed = ReelFeed::new(
        FeedContext {
            feed: harness.feed.clone(),
            engagement: harness.engagement.clone(),
            comments: Arc::new(GatedRejectingComments { gate }),
            session: Some(offline_session()),
            page_size: PAGE_SIZE,
        },
        videos("v", 2),
    );

    feed.open_comments(0).unwrap();
    settle(&mut feed, |feed| {
        feed.comment_panel().is_some_and(|panel| panel.loading)
    });
    feed.set_comment_input("first!");
    feed.submit_comment().unwrap();
    feed.close_comments();
    feed.take_notices();

    release.send(()).unwrap();
    let mut notices = Vec::new();
    for _ in 0..MAX_STEPS {
        feed.poll_timeout(STEP);
        notices.extend(feed.take_notices());
        if !notices.is_empty() {
            break;
        }
    }
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].title, "Couldn't post comment");

    // The draft only comes back on the video it was written for.
    feed.open_comments(1).unwrap();
    assert_eq!(feed.comment_panel().unwrap().input, "");
    feed.open_comments(0).unwrap();
    assert_eq!(feed.comment_panel().unwrap().input, "first!");
    feed.open_comments(0).unwrap();
    assert_eq!(feed.comment_panel().unwrap().input, "");
}
