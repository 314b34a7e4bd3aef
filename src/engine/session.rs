use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identifier of one play request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken {
    generation: u64,
    id: uuid::Uuid,
}

impl SessionToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id.simple())
    }
}

/// Process-wide record of which session is authoritative.
///
/// Clones share the same cell. Publishing a new token is the only way a
/// session ends; there is no explicit cancel.
#[derive(Debug, Clone, Default)]
pub struct SessionCell {
    current: Arc<AtomicU64>,
}

impl SessionCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a token and make it current, superseding whatever was before
    pub fn publish(&self) -> SessionToken {
        let generation = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        SessionToken {
            generation,
            id: uuid::Uuid::new_v4(),
        }
    }

    pub fn is_current(&self, token: &SessionToken) -> bool {
        self.current.load(Ordering::Acquire) == token.generation
    }
}

/// The playback attempt currently owned by the engine
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub token: SessionToken,
    pub source_index: usize,
    pub started_at: DateTime<Utc>,
}

/// Identifies one source attempt within a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptId {
    pub session: SessionToken,
    pub source_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_supersedes_previous_token() {
        let cell = SessionCell::new();
        let shared = cell.clone();

        let first = cell.publish();
        assert!(cell.is_current(&first));

        let second = shared.publish();
        assert!(!cell.is_current(&first));
        assert!(cell.is_current(&second));
        assert_ne!(first.to_string(), second.to_string());
    }
}
