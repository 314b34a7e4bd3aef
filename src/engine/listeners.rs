use super::session::SessionToken;
use super::surface::{ListenerHandle, ListenerId, ListenerKind, MediaSurface};

/// The one place listeners are attached to or detached from the surface.
///
/// Holds at most one error listener and one metadata listener. Installing
/// into an occupied slot detaches the previous occupant first.
#[derive(Debug, Default)]
pub struct Listeners {
    next_id: u64,
    error: Option<ListenerHandle>,
    metadata: Option<ListenerHandle>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, kind: ListenerKind) -> &mut Option<ListenerHandle> {
        match kind {
            ListenerKind::Error => &mut self.error,
            ListenerKind::MetadataLoaded => &mut self.metadata,
        }
    }

    pub fn install(
        &mut self,
        surface: &mut dyn MediaSurface,
        kind: ListenerKind,
        session: &SessionToken,
    ) -> ListenerHandle {
        self.remove(surface, kind);

        self.next_id += 1;
        let handle = ListenerHandle {
            id: ListenerId(self.next_id),
            kind,
            session: session.clone(),
        };
        surface.attach(&handle);
        *self.slot(kind) = Some(handle.clone());
        handle
    }

    pub fn remove(&mut self, surface: &mut dyn MediaSurface, kind: ListenerKind) {
        if let Some(handle) = self.slot(kind).take() {
            surface.detach(&handle);
        }
    }

    pub fn clear(&mut self, surface: &mut dyn MediaSurface) {
        self.remove(surface, ListenerKind::Error);
        self.remove(surface, ListenerKind::MetadataLoaded);
    }

    /// Whether `handle` is the listener currently installed in its slot
    pub fn is_installed(&self, handle: &ListenerHandle) -> bool {
        let slot = match handle.kind {
            ListenerKind::Error => &self.error,
            ListenerKind::MetadataLoaded => &self.metadata,
        };
        slot.as_ref().is_some_and(|h| h.id == handle.id)
    }

    pub fn has(&self, kind: ListenerKind) -> bool {
        match kind {
            ListenerKind::Error => self.error.is_some(),
            ListenerKind::MetadataLoaded => self.metadata.is_some(),
        }
    }
}
