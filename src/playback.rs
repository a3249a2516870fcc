//! Per-slide playback permission state.
//!
//! A slide never drives the player itself. Each transition returns the
//! [`Command`] the host must carry out, and the host reports the outcome back
//! through [`Slide::play_started`] or [`Slide::play_failed`].

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    NeedsInteraction,
    Error,
}

impl PlaybackState {
    pub fn label(self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Ready => "ready",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::NeedsInteraction => "tap to play",
            PlaybackState::Error => "unavailable",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a play attempt was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayFailure {
    NotAllowed,
    NotSupported,
    Other(String),
}

impl PlayFailure {
    pub fn is_permission(&self) -> bool {
        matches!(self, PlayFailure::NotAllowed | PlayFailure::NotSupported)
    }
}

impl fmt::Display for PlayFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayFailure::NotAllowed => f.write_str("playback not allowed"),
            PlayFailure::NotSupported => f.write_str("format not supported"),
            PlayFailure::Other(reason) => f.write_str(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Play,
    Pause,
}

#[derive(Debug, Clone, Default)]
pub struct Slide {
    state: PlaybackState,
    active: bool,
    media_ready: bool,
    autoplay_pending: bool,
    play_requested: bool,
    error: Option<String>,
}

impl Slide {
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True when the slide should show a play affordance.
    pub fn needs_interaction(&self) -> bool {
        self.state == PlaybackState::NeedsInteraction
    }

    pub fn mount(&mut self) {
        if self.state == PlaybackState::Idle {
            self.state = PlaybackState::Loading;
        }
    }

    pub fn media_ready(&mut self, gate_open: bool) -> Option<Command> {
        if self.state == PlaybackState::Error {
            return None;
        }
        self.media_ready = true;
        if matches!(self.state, PlaybackState::Idle | PlaybackState::Loading) {
            self.state = PlaybackState::Ready;
        }
        if self.active && std::mem::take(&mut self.autoplay_pending) {
            return self.request_play(gate_open);
        }
        None
    }

    pub fn media_failed(&mut self, reason: impl Into<String>) {
        self.state = PlaybackState::Error;
        self.error = Some(reason.into());
        self.autoplay_pending = false;
        self.play_requested = false;
    }

    pub fn activate(&mut self, gate_open: bool) -> Option<Command> {
        self.active = true;
        if self.state == PlaybackState::Error {
            return None;
        }
        if !self.media_ready {
            self.autoplay_pending = true;
            return None;
        }
        self.request_play(gate_open)
    }

    pub fn deactivate(&mut self) -> Option<Command> {
        self.active = false;
        self.autoplay_pending = false;
        let was_playing = self.state == PlaybackState::Playing;
        let had_request = std::mem::take(&mut self.play_requested);
        match self.state {
            PlaybackState::Error | PlaybackState::Idle => None,
            _ => {
                self.state = PlaybackState::Paused;
                (was_playing || had_request).then_some(Command::Pause)
            }
        }
    }

    /// A tap toggles playback directly; the tap itself satisfies the gate.
    pub fn tap(&mut self) -> Option<Command> {
        match self.state {
            PlaybackState::Playing => {
                self.state = PlaybackState::Paused;
                Some(Command::Pause)
            }
            PlaybackState::Ready | PlaybackState::Paused | PlaybackState::NeedsInteraction => {
                self.play_requested = true;
                Some(Command::Play)
            }
            _ => None,
        }
    }

    /// The first recorded interaction retries an active slide that was held back.
    pub fn interaction(&mut self) -> Option<Command> {
        if self.active && self.state == PlaybackState::NeedsInteraction {
            return self.request_play(true);
        }
        None
    }

    pub fn play_started(&mut self) -> Option<Command> {
        if self.state == PlaybackState::Error {
            return Some(Command::Pause);
        }
        let requested = std::mem::take(&mut self.play_requested);
        if !self.active && !requested {
            self.state = PlaybackState::Paused;
            return Some(Command::Pause);
        }
        self.state = PlaybackState::Playing;
        None
    }

    pub fn play_failed(&mut self, failure: PlayFailure) {
        self.play_requested = false;
        if failure.is_permission() {
            self.state = PlaybackState::NeedsInteraction;
        } else {
            self.state = PlaybackState::Error;
            self.error = Some(failure.to_string());
        }
    }

    pub fn ended(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    fn request_play(&mut self, gate_open: bool) -> Option<Command> {
        if self.state == PlaybackState::Playing {
            return None;
        }
        if !gate_open {
            self.state = PlaybackState::NeedsInteraction;
            return None;
        }
        self.play_requested = true;
        Some(Command::Play)
    }
}
