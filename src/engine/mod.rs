//! Playback fallback engine
//!
//! Plays a track by trying its sources in order. Each play request opens a
//! session; every asynchronous outcome carries the session it was issued
//! under and is dropped once a newer session has been published. The
//! engine never recurses into the next source: each step runs in response
//! to one [`MediaEvent`].

pub mod listeners;
pub mod registry;
pub mod session;
pub mod status;
pub mod surface;

use std::sync::Arc;

use crate::catalog::Track;
use crate::clock::Clock;

pub use listeners::Listeners;
pub use registry::FailedUrlRegistry;
pub use session::{AttemptId, PlaybackSession, SessionCell, SessionToken};
pub use status::PlayerStatus;
pub use surface::{
    ListenerHandle, ListenerId, ListenerKind, MediaErrorCode, MediaEvent, MediaSurface,
    PlayRejection,
};

struct ActivePlayback {
    track: Arc<Track>,
    session: PlaybackSession,
    auto_play: bool,
}

pub struct FallbackEngine<S: MediaSurface> {
    surface: S,
    sessions: SessionCell,
    registry: FailedUrlRegistry,
    clock: Arc<dyn Clock>,
    listeners: Listeners,
    active: Option<ActivePlayback>,
    status: PlayerStatus,
}

impl<S: MediaSurface> FallbackEngine<S> {
    pub fn new(
        surface: S,
        sessions: SessionCell,
        registry: FailedUrlRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            surface,
            sessions,
            registry,
            clock,
            listeners: Listeners::new(),
            active: None,
            status: PlayerStatus::Idle,
        }
    }

    /// Start playing `track`, superseding any session in progress
    pub fn play(&mut self, track: Arc<Track>, auto_play: bool) -> SessionToken {
        let token = self.sessions.publish();
        tracing::info!(
            "Session {} started for '{}' ({} sources)",
            token,
            track.title,
            track.sources.len()
        );

        self.listeners.clear(&mut self.surface);
        self.surface.reset();
        self.listeners
            .install(&mut self.surface, ListenerKind::Error, &token);

        self.active = Some(ActivePlayback {
            track,
            session: PlaybackSession {
                token: token.clone(),
                source_index: 0,
                started_at: self.clock.now(),
            },
            auto_play,
        });

        self.advance();
        token
    }

    /// Feed one surface event into the engine
    pub fn dispatch(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::Error { listener, code } => self.on_error(&listener, code),
            MediaEvent::MetadataLoaded { listener } => self.on_metadata_loaded(&listener),
            MediaEvent::PlayResolved { attempt } => self.on_play_resolved(&attempt),
            MediaEvent::PlayRejected { attempt, rejection } => {
                self.on_play_rejected(&attempt, rejection)
            }
        }
    }

    pub fn status(&self) -> &PlayerStatus {
        &self.status
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    /// URL of the source being attempted or played, if any
    pub fn current_source(&self) -> Option<&str> {
        let active = self.active.as_ref()?;
        if matches!(self.status, PlayerStatus::Exhausted { .. }) {
            return None;
        }
        active
            .track
            .sources
            .get(active.session.source_index)
            .map(String::as_str)
    }

    pub fn registry(&self) -> &FailedUrlRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionCell {
        &self.sessions
    }

    pub fn has_listener(&self, kind: ListenerKind) -> bool {
        self.listeners.has(kind)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Walk forward from the current index to the first source worth
    /// loading, or settle as exhausted.
    fn advance(&mut self) {
        let now = self.clock.now();
        let Some(active) = self.active.as_mut() else {
            return;
        };

        if !self.sessions.is_current(&active.session.token) {
            tracing::debug!("Session {} superseded, not advancing", active.session.token);
            self.listeners.clear(&mut self.surface);
            return;
        }

        let total = active.track.sources.len();
        while active.session.source_index < total {
            let index = active.session.source_index;
            let url = &active.track.sources[index];

            if self.registry.is_recently_failed(url, now) {
                tracing::warn!("Skipping recently failed source: {}", url);
                active.session.source_index += 1;
                continue;
            }

            let attempt = AttemptId {
                session: active.session.token.clone(),
                source_index: index,
            };

            if !self.listeners.has(ListenerKind::Error) {
                self.listeners
                    .install(&mut self.surface, ListenerKind::Error, &attempt.session);
            }
            self.listeners.install(
                &mut self.surface,
                ListenerKind::MetadataLoaded,
                &attempt.session,
            );

            self.status = PlayerStatus::Loading {
                title: active.track.title.clone(),
                attempt: index + 1,
                total,
            };
            tracing::debug!("Loading source {}/{}: {}", index + 1, total, url);

            self.surface.load(url);
            if active.auto_play {
                self.surface.play(&attempt);
            }
            return;
        }

        tracing::error!(
            "All {} sources failed for '{}'",
            total,
            active.track.title
        );
        self.listeners.clear(&mut self.surface);
        self.status = PlayerStatus::Exhausted {
            title: active.track.title.clone(),
        };
    }

    /// Record the current source as failed and move on to the next one
    fn fail_current_source(&mut self, reason: &str) {
        let now = self.clock.now();
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let Some(url) = active.track.sources.get(active.session.source_index) else {
            return;
        };

        tracing::warn!("Source failed ({}): {}", reason, url);
        self.registry.record_failure(url, now);
        active.session.source_index += 1;

        self.listeners
            .remove(&mut self.surface, ListenerKind::MetadataLoaded);
        self.advance();
    }

    /// Detach our listeners if the session they belong to was superseded
    fn retire_if_stale(&mut self) {
        let stale = self
            .active
            .as_ref()
            .is_some_and(|a| !self.sessions.is_current(&a.session.token));
        if stale {
            self.listeners.clear(&mut self.surface);
        }
    }

    fn accept_listener(&mut self, listener: &ListenerHandle) -> bool {
        if !self.listeners.is_installed(listener) {
            tracing::trace!("Event for detached listener {:?} dropped", listener.id);
            return false;
        }
        if !self.sessions.is_current(&listener.session) {
            tracing::debug!("Event from superseded session {} dropped", listener.session);
            self.listeners.clear(&mut self.surface);
            return false;
        }
        true
    }

    fn accept_attempt(&mut self, attempt: &AttemptId) -> bool {
        if !self.sessions.is_current(&attempt.session) {
            tracing::debug!("Play outcome from superseded session {} dropped", attempt.session);
            self.retire_if_stale();
            return false;
        }
        match &self.active {
            Some(active)
                if active.session.token == attempt.session
                    && active.session.source_index == attempt.source_index =>
            {
                true
            }
            _ => {
                tracing::debug!(
                    "Play outcome of earlier attempt {} dropped",
                    attempt.source_index + 1
                );
                false
            }
        }
    }

    fn on_error(&mut self, listener: &ListenerHandle, code: MediaErrorCode) {
        if !self.accept_listener(listener) {
            return;
        }
        if code == MediaErrorCode::Aborted {
            tracing::debug!("Load aborted by source switch, ignoring");
            return;
        }
        self.fail_current_source(&format!("{:?}", code));
    }

    fn on_metadata_loaded(&mut self, listener: &ListenerHandle) {
        if !self.accept_listener(listener) {
            return;
        }
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let title = active.track.title.clone();

        self.listeners
            .remove(&mut self.surface, ListenerKind::MetadataLoaded);
        self.listeners.remove(&mut self.surface, ListenerKind::Error);

        tracing::info!(
            "Source {} loaded for '{}'",
            active.session.source_index + 1,
            title
        );

        self.status = if self.surface.is_playing() {
            PlayerStatus::Playing { title }
        } else if matches!(self.status, PlayerStatus::AwaitingGesture { .. }) {
            PlayerStatus::AwaitingGesture { title }
        } else {
            PlayerStatus::Ready { title }
        };
    }

    fn on_play_resolved(&mut self, attempt: &AttemptId) {
        if !self.accept_attempt(attempt) {
            return;
        }
        if let Some(active) = &self.active {
            self.status = PlayerStatus::Playing {
                title: active.track.title.clone(),
            };
        }
    }

    fn on_play_rejected(&mut self, attempt: &AttemptId, rejection: PlayRejection) {
        if !self.accept_attempt(attempt) {
            return;
        }

        if rejection.needs_user_gesture() {
            tracing::warn!("Playback blocked ({:?}), waiting for user gesture", rejection);
            self.listeners.remove(&mut self.surface, ListenerKind::Error);
            if let Some(active) = &self.active {
                self.status = PlayerStatus::AwaitingGesture {
                    title: active.track.title.clone(),
                };
            }
            return;
        }

        // Once metadata has loaded the source is good; a later start error is not its failure.
        if !self.listeners.has(ListenerKind::Error) {
            tracing::debug!("Play rejected after load ({:?}), source kept", rejection);
            return;
        }

        self.fail_current_source(&format!("play rejected: {:?}", rejection));
    }
}
