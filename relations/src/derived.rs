use serde::{Deserialize, Serialize};

use crate::RelationSchema;

/// A user's most played genre. Ties produce one row per tied genre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFavoriteGenre {
    pub user_id: String,
    pub genre: String,
    pub count: u64,
}

impl RelationSchema for UserFavoriteGenre {
    const NAME: &'static str = "user_favorite_genres";
    const COLUMNS: &'static [&'static str] = &["user_id", "genre", "count"];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvgListenTime {
    pub song_id: String,
    pub avg_duration_sec: f64,
}

impl RelationSchema for AvgListenTime {
    const NAME: &'static str = "avg_listen_time_per_song";
    const COLUMNS: &'static [&'static str] = &["song_id", "avg_duration_sec"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopSong {
    pub song_id: String,
    pub count: u64,
}

impl RelationSchema for TopSong {
    const NAME: &'static str = "top_songs_this_week";
    const COLUMNS: &'static [&'static str] = &["song_id", "count"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedSong {
    pub song_id: String,
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HappyRecommendation {
    pub user_id: String,
    pub recommended_songs: Vec<RecommendedSong>,
}

impl RelationSchema for HappyRecommendation {
    const NAME: &'static str = "happy_recommendations";
    const COLUMNS: &'static [&'static str] = &["user_id", "recommended_songs"];
    const NESTED: bool = true;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreLoyalty {
    pub user_id: String,
    pub genre: String,
    pub loyalty_score: f64,
}

impl RelationSchema for GenreLoyalty {
    const NAME: &'static str = "genre_loyalty_scores";
    const COLUMNS: &'static [&'static str] = &["user_id", "genre", "loyalty_score"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightOwlUser {
    pub user_id: String,
    pub count: u64,
}

impl RelationSchema for NightOwlUser {
    const NAME: &'static str = "night_owl_users";
    const COLUMNS: &'static [&'static str] = &["user_id", "count"];
}
