//! LRC lyrics: parsing timestamped lines and fetching lyric files

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// One displayable lyric line and the time it starts, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    pub time: f64,
    pub text: String,
}

struct Patterns {
    timestamp: Regex,
    any_tag: Regex,
    marker: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        timestamp: Regex::new(r"\[(\d{2}):(\d{2})\.(\d{2,3})\]").unwrap(),
        any_tag: Regex::new(r"\[[^\]]+\]").unwrap(),
        marker: Regex::new(r"^>>\s*").unwrap(),
    })
}

/// Parse LRC text into lines sorted by time.
///
/// Every `[mm:ss.xx]` / `[mm:ss.xxx]` tag on a line yields its own entry
/// with the same text. All bracketed tags (`[ti:..]`, `[music]`, ...) are
/// removed from the displayed text, lines left empty are dropped.
pub fn parse_lrc(content: &str) -> Vec<LyricLine> {
    let patterns = patterns();
    let mut lines = Vec::new();

    for raw in content.lines() {
        let stripped = patterns.any_tag.replace_all(raw, "");
        let text = patterns.marker.replace(stripped.trim(), "").trim().to_string();
        if text.is_empty() {
            continue;
        }

        for caps in patterns.timestamp.captures_iter(raw) {
            let minutes: f64 = caps[1].parse().unwrap_or(0.0);
            let seconds: f64 = caps[2].parse().unwrap_or(0.0);
            let fraction = &caps[3];
            // Two digits are hundredths, three are milliseconds
            let millis: f64 = if fraction.len() == 2 {
                format!("{}0", fraction).parse().unwrap_or(0.0)
            } else {
                fraction.parse().unwrap_or(0.0)
            };

            lines.push(LyricLine {
                time: minutes * 60.0 + seconds + millis / 1000.0,
                text: text.clone(),
            });
        }
    }

    lines.sort_by(|a, b| a.time.total_cmp(&b.time));
    lines
}

/// Fetch the first lyric file that can be downloaded from `sources`.
/// Returns an empty string when none can, so lyrics simply don't show.
pub async fn fetch_lrc(client: &reqwest::Client, sources: &[String]) -> String {
    for source in sources {
        match client.get(source).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(text) => return text,
                Err(e) => tracing::warn!("Failed to read lyrics from {}: {}", source, e),
            },
            Ok(response) => {
                tracing::warn!("Lyrics {} returned status {}", source, response.status())
            }
            Err(e) => tracing::warn!("Failed to fetch lyrics {}: {}", source, e),
        }
    }
    String::new()
}
