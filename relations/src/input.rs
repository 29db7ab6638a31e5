use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{RelationSchema, SchemaError};

/// One playback event from the listening log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningEvent {
    pub user_id: String,
    pub song_id: String,
    #[serde(with = "crate::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub duration_sec: f64,
}

impl RelationSchema for ListeningEvent {
    const NAME: &'static str = "listening_logs";
    const COLUMNS: &'static [&'static str] = &["user_id", "song_id", "timestamp", "duration_sec"];
}

impl ListeningEvent {
    pub fn new(
        user_id: impl Into<String>,
        song_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        duration_sec: f64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            song_id: song_id.into(),
            timestamp,
            duration_sec,
        }
    }

    pub fn play_key(&self) -> PlayKey {
        PlayKey::new(&self.user_id, &self.song_id)
    }

    /// UTC hour of day, 0-23.
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    /// Value checks serde cannot express. `row` is 1-based for messages.
    pub fn validate(&self, row: usize) -> Result<(), SchemaError> {
        if !self.duration_sec.is_finite() || self.duration_sec < 0.0 {
            return Err(SchemaError::IncompatibleType {
                relation: Self::NAME,
                row,
                message: format!(
                    "duration_sec must be a non-negative number, got {}",
                    self.duration_sec
                ),
            });
        }
        Ok(())
    }
}

/// Catalog row describing a song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongMetadata {
    pub song_id: String,
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub mood: String,
}

impl RelationSchema for SongMetadata {
    const NAME: &'static str = "songs_metadata";
    const COLUMNS: &'static [&'static str] = &["song_id", "title", "artist", "genre", "mood"];
}

/// Join key between a user and a song they played.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayKey {
    pub user_id: String,
    pub song_id: String,
}

impl PlayKey {
    pub fn new(user_id: &str, song_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            song_id: song_id.to_string(),
        }
    }
}

/// The metadata relation indexed by `song_id`.
///
/// Iteration is in ascending `song_id` order.
#[derive(Debug, Clone, Default)]
pub struct SongCatalog {
    songs: BTreeMap<String, SongMetadata>,
}

impl SongCatalog {
    pub fn new(rows: Vec<SongMetadata>) -> Result<Self, SchemaError> {
        let mut songs = BTreeMap::new();
        for song in rows {
            if songs.contains_key(&song.song_id) {
                return Err(SchemaError::DuplicateKey {
                    relation: SongMetadata::NAME,
                    song_id: song.song_id,
                });
            }
            songs.insert(song.song_id.clone(), song);
        }
        Ok(Self { songs })
    }

    pub fn get(&self, song_id: &str) -> Option<&SongMetadata> {
        self.songs.get(song_id)
    }

    pub fn contains(&self, song_id: &str) -> bool {
        self.songs.contains_key(song_id)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SongMetadata> {
        self.songs.values()
    }

    pub fn with_mood<'a>(&'a self, mood: &'a str) -> impl Iterator<Item = &'a SongMetadata> {
        self.iter().filter(move |song| song.mood == mood)
    }
}
