use std::collections::HashSet;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::wrap;
use tracing::debug;
use unicode_width::UnicodeWidthStr;

use crate::data::ProfileService;
use crate::error::FeedError;
use crate::feed::{Effect, FeedEvent, NoticeLevel, ReelFeed};
use crate::model::UserProfile;
use crate::playback::PlaybackState;
use crate::player::Player;

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);
const COLOR_LIKE: Color = Color::Rgb(235, 111, 146);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const TICK_RATE: Duration = Duration::from_millis(120);
const RAIL_WIDTH: u16 = 34;
const LOGIN_HINT: &str = "Log in with `reels-tui login <email>` to like or comment.";

pub struct Options {
    pub feed: ReelFeed,
    pub player: Option<Player>,
    pub profiles: Arc<dyn ProfileService>,
    pub status_message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Feed,
    Comments,
    CommentInput,
    Profile,
}

struct ProfileView {
    request_id: u64,
    user: String,
    result: Option<Result<UserProfile, String>>,
}

struct ProfileResponse {
    request_id: u64,
    result: Result<UserProfile>,
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= TICK_RATE {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }
}

pub struct Model {
    feed: ReelFeed,
    player: Option<Player>,
    profiles: Arc<dyn ProfileService>,
    events: Sender<FeedEvent>,
    status_message: String,
    status_is_error: bool,
    mode: Mode,
    profile: Option<ProfileView>,
    profile_tx: Sender<ProfileResponse>,
    profile_rx: Receiver<ProfileResponse>,
    next_request_id: u64,
    media_announced: HashSet<usize>,
    viewport_rows: u16,
    rail_rows: u16,
    // First slide listed in the "Up next" rail.
    rail_offset: usize,
    spinner: Spinner,
    needs_redraw: bool,
}

impl Model {
    pub fn new(options: Options) -> Self {
        let (profile_tx, profile_rx) = unbounded();
        let events = options.feed.event_sender();
        let mut model = Self {
            feed: options.feed,
            player: options.player,
            profiles: options.profiles,
            events,
            status_message: options.status_message,
            status_is_error: false,
            mode: Mode::Feed,
            profile: None,
            profile_tx,
            profile_rx,
            next_request_id: 1,
            media_announced: HashSet::new(),
            viewport_rows: 24,
            rail_rows: 20,
            rail_offset: 0,
            spinner: Spinner::new(),
            needs_redraw: true,
        };
        if model.feed.is_empty() {
            model.feed.load_more();
        }
        model.announce_active_media();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        self.shutdown();
        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();

        loop {
            self.pump();

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = TICK_RATE
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => self.set_error(format!("Error: {err}")),
                        }
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= TICK_RATE {
                last_tick = Instant::now();
                if self.is_loading() && self.spinner.advance() {
                    self.mark_dirty();
                }
            }
        }

        Ok(())
    }

    /// Applies finished work and carries out queued player effects.
    fn pump(&mut self) {
        let mut changed = self.feed.poll();
        while let Ok(response) = self.profile_rx.try_recv() {
            self.apply_profile(response);
            changed = true;
        }
        for effect in self.feed.take_effects() {
            self.apply_effect(effect);
            changed = true;
        }
        for notice in self.feed.take_notices() {
            let text = if notice.message.is_empty() {
                notice.title
            } else {
                format!("{}: {}", notice.title, notice.message)
            };
            match notice.level {
                NoticeLevel::Info => self.set_status(text),
                NoticeLevel::Error => self.set_error(text),
            }
            changed = true;
        }
        if changed {
            self.announce_active_media();
            self.mark_dirty();
        }
    }

    fn apply_effect(&mut self, effect: Effect) {
        debug!(?effect, "feed effect");
        match effect {
            Effect::Play(slide) => {
                let Some(url) = self.feed.video(slide).map(|video| video.video_url.clone()) else {
                    return;
                };
                if let Some(player) = self.player.as_mut() {
                    player.play(slide, &url);
                }
            }
            Effect::Pause(slide) => {
                if let Some(player) = self.player.as_mut() {
                    player.pause(slide);
                }
            }
            Effect::ScrollIntoView(slide) => {
                let Some(title) = self.feed.video(slide).map(|video| video.title.clone()) else {
                    return;
                };
                self.scroll_into_view(slide);
                self.set_status(format!("Up next: {title}"));
            }
        }
    }

    /// Scrolls the rail so `slide` is listed and reports the new offset to the feed.
    fn scroll_into_view(&mut self, slide: usize) {
        let visible = usize::from(self.rail_rows.max(1));
        if slide < self.rail_offset {
            self.rail_offset = slide;
        } else if slide >= self.rail_offset + visible {
            self.rail_offset = slide + 1 - visible;
        }
        let rows = f64::from(self.viewport_rows.max(1));
        self.feed.handle(FeedEvent::Scroll {
            offset: slide as f64 * rows,
            viewport: rows,
            content: self.feed.len() as f64 * rows,
        });
    }

    fn announce_active_media(&mut self) {
        if let Some(active) = self.feed.active() {
            if self.media_announced.insert(active) {
                let _ = self.events.send(FeedEvent::MediaReady(active));
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        self.feed.record_interaction();
        let quit = match self.mode {
            Mode::CommentInput => {
                self.handle_input_key(code);
                false
            }
            Mode::Profile => {
                if matches!(code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('p')) {
                    self.profile = None;
                    self.mode = Mode::Feed;
                }
                false
            }
            Mode::Comments => match code {
                KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('c') => {
                    self.feed.close_comments();
                    self.mode = Mode::Feed;
                    false
                }
                KeyCode::Char('i') => {
                    self.mode = Mode::CommentInput;
                    false
                }
                other => self.handle_feed_key(other)?,
            },
            Mode::Feed => self.handle_feed_key(code)?,
        };
        self.pump();
        self.mark_dirty();
        Ok(quit)
    }

    fn handle_feed_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('j') | KeyCode::Down => self.move_to(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_to(-1),
            KeyCode::Char(' ') => {
                if let Some(active) = self.feed.active() {
                    self.feed.tap(active);
                }
            }
            KeyCode::Char('l') => {
                if let Some(active) = self.feed.active() {
                    if let Err(err) = self.feed.toggle_like(active) {
                        self.report(err);
                    }
                }
            }
            KeyCode::Char('c') => {
                if let Some(active) = self.feed.active() {
                    match self.feed.open_comments(active) {
                        Ok(()) => self.mode = Mode::Comments,
                        Err(err) => self.report(err),
                    }
                }
            }
            KeyCode::Char('s') => self.share_active()?,
            KeyCode::Char('o') => self.open_active(),
            KeyCode::Char('p') => self.open_profile(),
            KeyCode::Char('r') => {
                if self.feed.retry() {
                    self.set_status("Retrying…".to_string());
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_input_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => self.mode = Mode::Comments,
            KeyCode::Enter => match self.feed.submit_comment() {
                Ok(()) => {
                    self.mode = Mode::Comments;
                    self.set_status("Posting comment…".to_string());
                }
                Err(err) => self.report(err),
            },
            KeyCode::Backspace => self.feed.pop_comment_char(),
            KeyCode::Char(ch) => self.feed.push_comment_char(ch),
            _ => {}
        }
    }

    /// Moves one slide up or down, reporting it fully visible and updating scroll metrics.
    fn move_to(&mut self, delta: isize) {
        let len = self.feed.len();
        if len == 0 {
            self.feed.load_more();
            return;
        }
        let current = self.feed.active().unwrap_or(0);
        let target = current.saturating_add_signed(delta).min(len - 1);
        self.feed.handle(FeedEvent::Visibility {
            slide: target,
            ratio: 1.0,
        });
        self.scroll_into_view(target);
        if self.mode == Mode::Comments {
            self.feed.close_comments();
            self.mode = Mode::Feed;
        }
        if target == current && delta > 0 && !self.feed.has_more() {
            self.set_status("You're all caught up.".to_string());
        }
    }

    fn share_active(&mut self) -> Result<()> {
        let Some(active) = self.feed.active() else {
            return Ok(());
        };
        let url = self.feed.share(active).map_err(|err| anyhow!(err))?;
        match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(url.clone())) {
            Ok(()) => self.set_status("Link copied to clipboard.".to_string()),
            Err(err) => self.set_status(format!("Share this link: {url} ({err})")),
        }
        Ok(())
    }

    fn open_active(&mut self) {
        let Some(url) = self
            .feed
            .active()
            .and_then(|active| self.feed.video(active))
            .map(|video| video.video_url.clone())
        else {
            return;
        };
        match webbrowser::open(&url) {
            Ok(_) => self.set_status(format!("Opened {url}")),
            Err(err) => self.set_error(format!("Failed to open browser: {err}")),
        }
    }

    fn open_profile(&mut self) {
        let Some(user) = self
            .feed
            .active()
            .and_then(|active| self.feed.video(active))
            .and_then(|video| video.author_id().map(str::to_string))
        else {
            self.set_status("This reel has no author profile.".to_string());
            return;
        };
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.profile = Some(ProfileView {
            request_id,
            user: user.clone(),
            result: None,
        });
        self.mode = Mode::Profile;

        let service = Arc::clone(&self.profiles);
        let tx = self.profile_tx.clone();
        thread::spawn(move || {
            let result = service.load_profile(&user);
            let _ = tx.send(ProfileResponse { request_id, result });
        });
    }

    fn apply_profile(&mut self, response: ProfileResponse) {
        let Some(view) = self.profile.as_mut() else {
            return;
        };
        if view.request_id != response.request_id {
            return;
        }
        view.result = Some(response.result.map_err(|err| FeedError::from_api(&err).to_string()));
    }

    fn report(&mut self, err: FeedError) {
        match err {
            FeedError::Unauthorized => self.set_error(LOGIN_HINT.to_string()),
            other => self.set_error(other.to_string()),
        }
    }

    fn set_status(&mut self, message: String) {
        self.status_message = message;
        self.status_is_error = false;
        self.mark_dirty();
    }

    fn set_error(&mut self, message: String) {
        self.status_message = message;
        self.status_is_error = true;
        self.mark_dirty();
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.feed.is_loading()
            || self
                .feed
                .comment_panel()
                .map(|panel| panel.loading || panel.submitting)
                .unwrap_or(false)
            || self
                .profile
                .as_ref()
                .map(|view| view.result.is_none())
                .unwrap_or(false)
    }

    fn shutdown(&mut self) {
        self.feed.close();
        for effect in self.feed.take_effects() {
            self.apply_effect(effect);
        }
        if let Some(player) = self.player.as_mut() {
            player.stop();
        }
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let status_fg = if self.status_is_error {
            COLOR_ERROR
        } else {
            COLOR_TEXT_PRIMARY
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(status_fg)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(RAIL_WIDTH)])
            .split(layout[1]);
        self.viewport_rows = columns[0].height;
        // Borders plus the status row under the list.
        self.rail_rows = columns[1].height.saturating_sub(3).max(1);
        self.draw_slide(frame, columns[0]);
        if self.feed.comment_panel().is_some() {
            self.draw_comments(frame, columns[1]);
        } else {
            self.draw_rail(frame, columns[1]);
        }

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center);
        frame.render_widget(footer, layout[2]);

        if self.mode == Mode::Profile {
            self.draw_profile(frame, layout[1]);
        }
    }

    fn footer_text(&self) -> &'static str {
        match self.mode {
            Mode::Feed => "j/k move · space play · l like · c comments · s share · o open · p profile · q quit",
            Mode::Comments => "i write · esc close · j/k move",
            Mode::CommentInput => "enter send · esc stop typing",
            Mode::Profile => "esc close",
        }
    }

    fn draw_slide(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = panel_block("Reel", self.mode == Mode::Feed);
        let inner = block.inner(area);
        let width = inner.width.max(1) as usize;

        let Some(active) = self.feed.active() else {
            let message = if self.feed.is_loading() {
                "Loading reels…".to_string()
            } else if let Some(err) = self.feed.page_error() {
                format!("{err}\n\nPress r to retry.")
            } else {
                "No videos yet.".to_string()
            };
            let placeholder = Paragraph::new(message)
                .block(block)
                .alignment(Alignment::Center)
                .style(Style::default().fg(COLOR_TEXT_SECONDARY));
            frame.render_widget(placeholder, area);
            return;
        };
        let (Some(video), Some(slide), Some(engagement)) = (
            self.feed.video(active),
            self.feed.slide(active),
            self.feed.engagement(active),
        ) else {
            return;
        };

        let mut lines: Vec<Line<'static>> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled(
                format!("@{}", video.author_name()),
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  ·  {}", video.duration_label()),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ),
        ]));
        lines.push(Line::from(""));
        for row in wrap(video.title.trim(), width) {
            lines.push(Line::from(Span::styled(
                row.into_owned(),
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD),
            )));
        }
        if !video.description.trim().is_empty() {
            for row in wrap(video.description.trim(), width) {
                lines.push(Line::from(Span::styled(
                    row.into_owned(),
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                )));
            }
        }
        lines.push(Line::from(""));

        let heart = if engagement.liked { "♥" } else { "♡" };
        let heart_style = if engagement.liked {
            Style::default().fg(COLOR_LIKE).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_PRIMARY)
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{heart} {}", engagement.like_count), heart_style),
            Span::styled(
                format!("   ↗ {}", engagement.shares),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ),
        ]));
        lines.push(Line::from(""));

        let (state_text, state_style) = match slide.state() {
            PlaybackState::NeedsInteraction => (
                "▶  Press space to play".to_string(),
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD | Modifier::SLOW_BLINK),
            ),
            PlaybackState::Error => (
                format!(
                    "✕  {}",
                    slide.error().unwrap_or("This video can't be played.")
                ),
                Style::default().fg(COLOR_ERROR),
            ),
            PlaybackState::Playing => (
                "▶  playing".to_string(),
                Style::default().fg(COLOR_SUCCESS),
            ),
            other => (
                format!("❚❚ {other}"),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ),
        };
        lines.push(Line::from(Span::styled(state_text, state_style)));

        let slide_view = Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(slide_view, area);
    }

    fn draw_rail(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = panel_block("Up next", false);
        let inner = block.inner(area);
        let width = inner.width.saturating_sub(4) as usize;
        let active = self.feed.active().unwrap_or(0);
        let visible = inner.height.saturating_sub(1) as usize;
        let start = self.rail_offset.min(self.feed.len().saturating_sub(1));

        let mut items: Vec<ListItem> = self
            .feed
            .videos()
            .iter()
            .enumerate()
            .skip(start)
            .take(visible.max(1))
            .map(|(idx, video)| {
                let marker = if idx == active { "▸" } else { " " };
                let style = if idx == active {
                    Style::default()
                        .fg(COLOR_TEXT_PRIMARY)
                        .bg(COLOR_PANEL_FOCUSED_BG)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(COLOR_TEXT_SECONDARY)
                };
                ListItem::new(Line::from(Span::styled(
                    format!("{marker} {}", truncate(&video.title, width)),
                    style,
                )))
            })
            .collect();

        let tail = if self.feed.is_loading() {
            Some((format!("{} loading more…", self.spinner.frame()), COLOR_TEXT_SECONDARY))
        } else if self.feed.page_error().is_some() {
            Some(("! failed, press r".to_string(), COLOR_ERROR))
        } else if !self.feed.has_more() {
            Some(("· end of feed".to_string(), COLOR_TEXT_SECONDARY))
        } else {
            None
        };
        if let Some((text, color)) = tail {
            items.push(ListItem::new(Line::from(Span::styled(
                text,
                Style::default().fg(color).add_modifier(Modifier::ITALIC),
            ))));
        }

        frame.render_widget(List::new(items).block(block), area);
    }

    fn draw_comments(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(panel) = self.feed.comment_panel() else {
            return;
        };
        let focused = matches!(self.mode, Mode::Comments | Mode::CommentInput);
        let block = panel_block(&format!("Comments ({})", panel.len()), focused);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(inner);
        let width = sections[0].width.max(1) as usize;

        let mut lines: Vec<Line<'static>> = Vec::new();
        if panel.loading {
            lines.push(Line::from(Span::styled(
                format!("{} loading…", self.spinner.frame()),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
        } else if panel.is_empty() {
            lines.push(Line::from(Span::styled(
                "No comments yet.",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
        }
        for comment in &panel.comments {
            lines.push(Line::from(Span::styled(
                comment.author_name().to_string(),
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            )));
            for row in wrap(&comment.text, width) {
                lines.push(Line::from(Span::styled(
                    row.into_owned(),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                )));
            }
            lines.push(Line::from(""));
        }
        frame.render_widget(
            Paragraph::new(Text::from(lines)).style(Style::default().bg(COLOR_PANEL_BG)),
            sections[0],
        );

        let typing = self.mode == Mode::CommentInput;
        let input_title = if panel.submitting {
            "sending…"
        } else if typing {
            "typing"
        } else {
            "i to write"
        };
        let cursor = if typing { "█" } else { "" };
        let input = Paragraph::new(format!("{}{cursor}", panel.input))
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .title(input_title)
                    .border_style(Style::default().fg(if typing {
                        COLOR_BORDER_FOCUSED
                    } else {
                        COLOR_BORDER_IDLE
                    })),
            )
            .style(Style::default().fg(COLOR_TEXT_PRIMARY))
            .wrap(Wrap { trim: false });
        frame.render_widget(input, sections[1]);
    }

    fn draw_profile(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(view) = self.profile.as_ref() else {
            return;
        };
        let popup_area = centered_rect(60, 70, area);
        frame.render_widget(Clear, popup_area);

        let mut lines: Vec<Line<'static>> = Vec::new();
        match &view.result {
            None => lines.push(Line::from(format!(
                "{} loading {}…",
                self.spinner.frame(),
                view.user
            ))),
            Some(Err(err)) => lines.push(Line::from(Span::styled(
                err.clone(),
                Style::default().fg(COLOR_ERROR),
            ))),
            Some(Ok(profile)) => {
                lines.push(Line::from(Span::styled(
                    profile.user.display_name().to_string(),
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::BOLD),
                )));
                if let Some(bio) = profile.bio.as_deref().filter(|bio| !bio.trim().is_empty()) {
                    lines.push(Line::from(bio.trim().to_string()));
                }
                lines.push(Line::from(format!(
                    "{} videos · {} followers · {} following",
                    profile.stats.videos, profile.stats.followers, profile.stats.following
                )));
                lines.push(Line::from(""));
                for video in &profile.videos {
                    lines.push(Line::from(format!(
                        "• {}  ({} likes)",
                        video.title, video.likes
                    )));
                }
            }
        }

        let popup = Paragraph::new(Text::from(lines))
            .block(
                Block::default()
                    .title(Span::styled(
                        "Profile",
                        Style::default()
                            .fg(COLOR_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(COLOR_ACCENT))
                    .style(Style::default().bg(COLOR_PANEL_BG)),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(popup, popup_area);
    }
}

fn panel_block(title: &str, focused: bool) -> Block<'static> {
    let border = if focused {
        COLOR_BORDER_FOCUSED
    } else {
        COLOR_BORDER_IDLE
    };
    Block::default()
        .title(Span::styled(
            title.to_string(),
            Style::default().fg(border).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(COLOR_PANEL_BG))
}

fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    for ch in text.chars() {
        if out.width() + 1 >= width {
            break;
        }
        out.push(ch);
    }
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}
