//! Drives the fallback engine against real HTTP sources.
//!
//! [`HttpSourceSurface`] stands in for a media element: loading a source
//! means requesting its first bytes, and the outcome comes back as the
//! same events a player would see.

use std::sync::Arc;

use crate::catalog::Track;
use crate::engine::{
    AttemptId, FallbackEngine, ListenerHandle, ListenerKind, MediaErrorCode, MediaEvent,
    MediaSurface, PlayerStatus,
};

pub struct HttpSourceSurface {
    client: reqwest::Client,
    attached: Vec<ListenerHandle>,
    pending_load: Option<String>,
    pending_play: Option<AttemptId>,
    playing: bool,
    requests: usize,
}

impl HttpSourceSurface {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            attached: Vec::new(),
            pending_load: None,
            pending_play: None,
            playing: false,
            requests: 0,
        }
    }

    /// Number of sources requested so far
    pub fn requests(&self) -> usize {
        self.requests
    }

    async fn reachable(&self, url: &str) -> bool {
        match self
            .client
            .get(url)
            .header(reqwest::header::RANGE, "bytes=0-1")
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!("{} answered {}", url, response.status());
                false
            }
            Err(e) => {
                tracing::debug!("{} unreachable: {}", url, e);
                false
            }
        }
    }

    fn listeners(&self, kind: ListenerKind) -> impl Iterator<Item = &ListenerHandle> {
        self.attached.iter().filter(move |l| l.kind == kind)
    }

    /// Complete the pending load and return the events it produced
    pub async fn poll(&mut self) -> Vec<MediaEvent> {
        let Some(url) = self.pending_load.take() else {
            return Vec::new();
        };

        self.requests += 1;
        let mut events = Vec::new();
        if self.reachable(&url).await {
            let play = self.pending_play.take();
            self.playing = play.is_some();
            events.extend(
                self.listeners(ListenerKind::MetadataLoaded)
                    .map(|l| MediaEvent::MetadataLoaded { listener: l.clone() }),
            );
            if let Some(attempt) = play {
                events.push(MediaEvent::PlayResolved { attempt });
            }
        } else {
            self.pending_play = None;
            events.extend(self.listeners(ListenerKind::Error).map(|l| MediaEvent::Error {
                listener: l.clone(),
                code: MediaErrorCode::Network,
            }));
        }
        events
    }
}

impl MediaSurface for HttpSourceSurface {
    fn reset(&mut self) {
        self.pending_load = None;
        self.pending_play = None;
        self.playing = false;
    }

    fn load(&mut self, url: &str) {
        self.playing = false;
        self.pending_load = Some(url.to_string());
    }

    fn play(&mut self, attempt: &AttemptId) {
        self.pending_play = Some(attempt.clone());
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn attach(&mut self, listener: &ListenerHandle) {
        self.attached.push(listener.clone());
    }

    fn detach(&mut self, listener: &ListenerHandle) {
        self.attached.retain(|l| l.id != listener.id);
    }
}

/// Play `track` until the engine settles and return the source it settled on
pub async fn resolve_track(
    engine: &mut FallbackEngine<HttpSourceSurface>,
    track: Arc<Track>,
) -> Option<String> {
    engine.play(track, true);

    while !engine.status().is_settled() {
        let events = engine.surface_mut().poll().await;
        if events.is_empty() {
            break;
        }
        for event in events {
            engine.dispatch(event);
        }
    }

    match engine.status() {
        PlayerStatus::Ready { .. }
        | PlayerStatus::Playing { .. }
        | PlayerStatus::AwaitingGesture { .. } => engine.current_source().map(str::to_string),
        _ => None,
    }
}
