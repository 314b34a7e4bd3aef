use serde::Serialize;
use std::fmt;

/// What the player shows the user about the current track
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlayerStatus {
    Idle,
    Loading {
        title: String,
        attempt: usize,
        total: usize,
    },
    Ready {
        title: String,
    },
    Playing {
        title: String,
    },
    /// Loaded but playback needs a user gesture
    AwaitingGesture {
        title: String,
    },
    /// Every source failed or was skipped
    Exhausted {
        title: String,
    },
}

impl PlayerStatus {
    /// No further event moves the session on by itself
    pub fn is_settled(&self) -> bool {
        !matches!(self, PlayerStatus::Idle | PlayerStatus::Loading { .. })
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerStatus::Idle => write!(f, "Idle"),
            PlayerStatus::Loading {
                title,
                attempt,
                total,
            } => write!(f, "Loading: {} (source {}/{})", title, attempt, total),
            PlayerStatus::Ready { title } => write!(f, "Ready: {}", title),
            PlayerStatus::Playing { title } => write!(f, "Playing: {}", title),
            PlayerStatus::AwaitingGesture { title } => write!(f, "Tap to play: {}", title),
            PlayerStatus::Exhausted { title } => write!(
                f,
                "Playback failed: no playable source for {}",
                title
            ),
        }
    }
}
