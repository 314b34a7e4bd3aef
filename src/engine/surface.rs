//! The playback surface the engine drives and the events it reports back

use super::session::{AttemptId, SessionToken};

/// Media error codes, numbered like the HTML media element's
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorCode {
    /// Load abandoned because the source was switched
    Aborted = 1,
    Network = 2,
    Decode = 3,
    SourceNotSupported = 4,
}

/// Why a play request was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayRejection {
    /// Autoplay policy, a user gesture is required
    NotAllowed,
    /// The play request was interrupted
    Aborted,
    Other(String),
}

impl PlayRejection {
    /// Rejections that say nothing about the source itself
    pub fn needs_user_gesture(&self) -> bool {
        matches!(self, PlayRejection::NotAllowed | PlayRejection::Aborted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    Error,
    MetadataLoaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// A listener attached to the surface, closed over the session that installed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerHandle {
    pub id: ListenerId,
    pub kind: ListenerKind,
    pub session: SessionToken,
}

#[derive(Debug, Clone)]
pub enum MediaEvent {
    Error {
        listener: ListenerHandle,
        code: MediaErrorCode,
    },
    MetadataLoaded {
        listener: ListenerHandle,
    },
    PlayResolved {
        attempt: AttemptId,
    },
    PlayRejected {
        attempt: AttemptId,
        rejection: PlayRejection,
    },
}

/// Something that can load and play one source at a time.
///
/// Load and play outcomes are not returned; the surface reports them later
/// as [`MediaEvent`]s, error and metadata outcomes only to listeners that
/// are still attached.
pub trait MediaSurface {
    /// Clear the current source and abort any in-flight load
    fn reset(&mut self);

    /// Make `url` the active source and start loading it
    fn load(&mut self, url: &str);

    /// Request playback of the loaded source
    fn play(&mut self, attempt: &AttemptId);

    fn is_playing(&self) -> bool;

    fn attach(&mut self, listener: &ListenerHandle);

    fn detach(&mut self, listener: &ListenerHandle);
}
