use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;

/// Per-user, per-song play counters
#[derive(Clone)]
pub struct StatsDatabase {
    pool: SqlitePool,
}

impl StatsDatabase {
    /// Create a new stats database connection
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&db_url).await.with_context(|| {
            format!(
                "Failed to connect to stats database at: {}",
                db_path.display()
            )
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS play_logs (
                user_id TEXT NOT NULL,
                song_id TEXT NOT NULL,
                title TEXT NOT NULL,
                plays INTEGER NOT NULL DEFAULT 0,
                last_played TEXT NOT NULL,
                PRIMARY KEY (user_id, song_id)
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create play_logs table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_play_logs_song_id ON play_logs(song_id)")
            .execute(&pool)
            .await
            .context("Failed to create index")?;

        tracing::info!("Stats database initialized: {}", db_path.display());

        Ok(Self { pool })
    }

    /// Count one play of `song_id` by `user_id`, returning that user's new total
    pub async fn record_play(&self, user_id: &str, song_id: &str, title: &str) -> Result<u64> {
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO play_logs (user_id, song_id, title, plays, last_played)
            VALUES (?, ?, ?, 1, ?)
            ON CONFLICT(user_id, song_id) DO UPDATE SET
                plays = plays + 1,
                title = excluded.title,
                last_played = excluded.last_played
            RETURNING plays
            "#,
        )
        .bind(user_id)
        .bind(song_id)
        .bind(title)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map(|row| {
            let plays: i64 = sqlx::Row::get(&row, 0);
            plays as u64
        })
        .context("Failed to record play")
    }

    /// Play count of one user for one song
    pub async fn user_play_count(&self, user_id: &str, song_id: &str) -> Result<u64> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT plays FROM play_logs WHERE user_id = ? AND song_id = ?")
                .bind(user_id)
                .bind(song_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to get play count")?;

        Ok(row.map(|(plays,)| plays as u64).unwrap_or(0))
    }

    /// Total plays per song across all users
    pub async fn global_play_counts(&self) -> Result<HashMap<String, u64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT song_id, SUM(plays) AS total_plays FROM play_logs GROUP BY song_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to aggregate play counts")?;

        Ok(rows
            .into_iter()
            .map(|(song_id, total)| (song_id, total as u64))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plays_aggregate_across_users() {
        let dir = tempfile::tempdir().unwrap();
        let db = StatsDatabase::new(&dir.path().join("stats.db")).await.unwrap();

        assert_eq!(db.record_play("u1", "s0", "First").await.unwrap(), 1);
        assert_eq!(db.record_play("u1", "s0", "First").await.unwrap(), 2);
        assert_eq!(db.record_play("u2", "s0", "First").await.unwrap(), 1);
        db.record_play("u2", "s1", "Second").await.unwrap();

        assert_eq!(db.user_play_count("u1", "s0").await.unwrap(), 2);
        assert_eq!(db.user_play_count("u3", "s0").await.unwrap(), 0);

        let totals = db.global_play_counts().await.unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals["s0"], 3);
        assert_eq!(totals["s1"], 1);
    }
}
