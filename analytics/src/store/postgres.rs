use chrono::{DateTime, Utc};
use relations::{ListeningEvent, RelationSchema, SchemaError, SongMetadata};
use serde::Serialize;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use super::{RelationSink, RelationSource};
use crate::Result;

pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/listening_analytics";

/// Input tables `listening_logs` / `songs_metadata`, derived relations as
/// JSONB rows in `derived_relations`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Connect using `DATABASE_URL`, falling back to a local database.
    pub async fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        Self::connect(&database_url).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Replace the contents of both input tables in one transaction.
    pub async fn replace_inputs(
        &self,
        events: &[ListeningEvent],
        songs: &[SongMetadata],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to begin transaction: {}", e);
            e
        })?;

        sqlx::query("TRUNCATE listening_logs, songs_metadata")
            .execute(&mut *tx)
            .await?;

        for song in songs {
            sqlx::query(
                r#"
                INSERT INTO songs_metadata (song_id, title, artist, genre, mood)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&song.song_id)
            .bind(&song.title)
            .bind(&song.artist)
            .bind(&song.genre)
            .bind(&song.mood)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert song {}: {}", song.song_id, e);
                e
            })?;
        }

        for event in events {
            sqlx::query(
                r#"
                INSERT INTO listening_logs (user_id, song_id, "timestamp", duration_sec)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(&event.user_id)
            .bind(&event.song_id)
            .bind(event.timestamp)
            .bind(event.duration_sec)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit transaction: {}", e);
            e
        })?;

        tracing::info!(
            "imported {} listening events and {} songs",
            events.len(),
            songs.len()
        );
        Ok(())
    }

    /// Fail with a schema error when `R`'s table lacks a required column.
    async fn check_columns<R: RelationSchema>(&self) -> Result<()> {
        let columns: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT column_name::TEXT
            FROM information_schema.columns
            WHERE table_schema = current_schema() AND table_name = $1
            "#,
        )
        .bind(R::NAME)
        .fetch_all(&self.pool)
        .await?;

        relations::require_columns::<R, _>(&columns)?;
        Ok(())
    }
}

fn decode_event(row: &PgRow) -> std::result::Result<ListeningEvent, sqlx::Error> {
    Ok(ListeningEvent {
        user_id: row.try_get("user_id")?,
        song_id: row.try_get("song_id")?,
        timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        duration_sec: row.try_get("duration_sec")?,
    })
}

fn decode_song(row: &PgRow) -> std::result::Result<SongMetadata, sqlx::Error> {
    Ok(SongMetadata {
        song_id: row.try_get("song_id")?,
        title: row.try_get("title")?,
        artist: row.try_get("artist")?,
        genre: row.try_get("genre")?,
        mood: row.try_get("mood")?,
    })
}

fn incompatible<R: RelationSchema>(row: usize, e: sqlx::Error) -> SchemaError {
    SchemaError::IncompatibleType {
        relation: R::NAME,
        row,
        message: e.to_string(),
    }
}

impl RelationSource for PgStore {
    async fn load_listening_events(&self) -> Result<Vec<ListeningEvent>> {
        self.check_columns::<ListeningEvent>().await?;

        let rows = sqlx::query(
            r#"
            SELECT user_id, song_id, "timestamp", duration_sec
            FROM listening_logs
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let event = decode_event(row).map_err(|e| incompatible::<ListeningEvent>(i + 1, e))?;
            event.validate(i + 1)?;
            events.push(event);
        }

        tracing::info!("loaded {} listening events from postgres", events.len());
        Ok(events)
    }

    async fn load_song_metadata(&self) -> Result<Vec<SongMetadata>> {
        self.check_columns::<SongMetadata>().await?;

        let rows = sqlx::query(
            r#"
            SELECT song_id, title, artist, genre, mood
            FROM songs_metadata
            ORDER BY song_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let songs = rows
            .iter()
            .enumerate()
            .map(|(i, row)| decode_song(row).map_err(|e| incompatible::<SongMetadata>(i + 1, e)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::info!("loaded {} songs from postgres", songs.len());
        Ok(songs)
    }
}

impl RelationSink for PgStore {
    async fn persist<R>(&self, rows: &[R]) -> Result<()>
    where
        R: RelationSchema + Serialize,
    {
        let mut tx = self.pool.begin().await?;

        for (index, row) in rows.iter().enumerate() {
            let data = serde_json::to_value(row)?;
            sqlx::query(
                r#"
                INSERT INTO derived_relations (relation, row_index, data)
                VALUES ($1, $2, $3)
                ON CONFLICT (relation, row_index)
                DO UPDATE SET data = $3, computed_at = NOW()
                "#,
            )
            .bind(R::NAME)
            .bind(index as i64)
            .bind(data)
            .execute(&mut *tx)
            .await?;
        }

        // rows left over from a larger previous run
        sqlx::query("DELETE FROM derived_relations WHERE relation = $1 AND row_index >= $2")
            .bind(R::NAME)
            .bind(rows.len() as i64)
            .execute(&mut *tx)
            .await?;

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit {}: {}", R::NAME, e);
            e
        })?;

        tracing::info!("stored {} rows of {}", rows.len(), R::NAME);
        Ok(())
    }
}

/// Read back a persisted derived relation in row order.
pub async fn fetch_derived(pool: &PgPool, relation: &str) -> Result<Vec<serde_json::Value>> {
    let rows = sqlx::query(
        "SELECT data FROM derived_relations WHERE relation = $1 ORDER BY row_index",
    )
    .bind(relation)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.get("data")).collect())
}
