//! Load, compute, persist.
//!
//! All six relations are computed before anything is written, so an input
//! that fails schema checks leaves the sink untouched.

use chrono::{DateTime, Utc};
use relations::{
    AvgListenTime, GenreLoyalty, HappyRecommendation, ListeningEvent, NightOwlUser, SongCatalog,
    TopSong, UserFavoriteGenre,
};
use std::collections::HashSet;

use crate::aggregation;
use crate::config::AnalyticsConfig;
use crate::recommendation;
use crate::store::{RelationSink, RelationSource};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DerivedRelations {
    pub favorite_genres: Vec<UserFavoriteGenre>,
    pub avg_listen_time: Vec<AvgListenTime>,
    pub top_songs: Vec<TopSong>,
    pub recommendations: Vec<HappyRecommendation>,
    pub genre_loyalty: Vec<GenreLoyalty>,
    pub night_owls: Vec<NightOwlUser>,
}

impl DerivedRelations {
    pub fn compute(
        events: &[ListeningEvent],
        catalog: &SongCatalog,
        config: &AnalyticsConfig,
    ) -> Self {
        let (week_start, week_end) = config.week_window();
        Self {
            favorite_genres: aggregation::favorite_genre(events, catalog),
            avg_listen_time: aggregation::avg_listen_time(events),
            top_songs: aggregation::top_songs_this_week(
                events,
                week_start,
                week_end,
                config.top_songs_limit,
            ),
            recommendations: recommendation::mood_recommendations(
                events,
                catalog,
                &config.source_mood,
                &config.target_mood,
                config.recommendation_limit,
            ),
            genre_loyalty: aggregation::genre_loyalty(events, catalog, config.loyalty_threshold),
            night_owls: aggregation::night_owl_users(
                events,
                config.night_hours(),
                config.night_owl_min_plays,
            ),
        }
    }

    fn log_counts(&self) {
        tracing::info!(
            "derived: {} favorite genres, {} song averages, {} top songs, {} recommendations, {} loyal users, {} night owls",
            self.favorite_genres.len(),
            self.avg_listen_time.len(),
            self.top_songs.len(),
            self.recommendations.len(),
            self.genre_loyalty.len(),
            self.night_owls.len()
        );
    }
}

/// Load both inputs concurrently and index the catalog.
pub async fn load_inputs<S: RelationSource>(source: &S) -> Result<(Vec<ListeningEvent>, SongCatalog)> {
    let (events, songs) =
        tokio::try_join!(source.load_listening_events(), source.load_song_metadata())?;
    let catalog = SongCatalog::new(songs)?;

    if events.is_empty() {
        tracing::warn!("listening log is empty, every derived relation will be empty");
    }
    if catalog.is_empty() {
        tracing::warn!("song catalog is empty, genre and mood relations will be empty");
    }
    Ok((events, catalog))
}

/// Persist every derived relation, each under its own name.
pub async fn persist_all<K: RelationSink>(sink: &K, derived: &DerivedRelations) -> Result<()> {
    tokio::try_join!(
        sink.persist(&derived.favorite_genres),
        sink.persist(&derived.avg_listen_time),
        sink.persist(&derived.top_songs),
        sink.persist(&derived.recommendations),
        sink.persist(&derived.genre_loyalty),
        sink.persist(&derived.night_owls),
    )?;
    Ok(())
}

pub async fn run<S, K>(source: &S, sink: &K, config: &AnalyticsConfig) -> Result<DerivedRelations>
where
    S: RelationSource,
    K: RelationSink,
{
    config.validate()?;

    let (events, catalog) = load_inputs(source).await?;
    tracing::info!(
        "computing analytics over {} events and {} songs",
        events.len(),
        catalog.len()
    );

    let derived = DerivedRelations::compute(&events, &catalog, config);
    derived.log_counts();

    persist_all(sink, &derived).await?;
    tracing::info!("pipeline run complete");
    Ok(derived)
}

/// Shape of the two inputs, for inspection before a run.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSummary {
    pub events: usize,
    pub songs: usize,
    pub users: usize,
    pub songs_played: usize,
    /// Events whose song is missing from the catalog.
    pub unmatched_events: usize,
    pub first_event: Option<DateTime<Utc>>,
    pub last_event: Option<DateTime<Utc>>,
}

impl InputSummary {
    pub fn new(events: &[ListeningEvent], catalog: &SongCatalog) -> Self {
        let users: HashSet<&str> = events.iter().map(|e| e.user_id.as_str()).collect();
        let songs_played: HashSet<&str> = events.iter().map(|e| e.song_id.as_str()).collect();
        Self {
            events: events.len(),
            songs: catalog.len(),
            users: users.len(),
            songs_played: songs_played.len(),
            unmatched_events: events
                .iter()
                .filter(|e| !catalog.contains(&e.song_id))
                .count(),
            first_event: events.iter().map(|e| e.timestamp).min(),
            last_event: events.iter().map(|e| e.timestamp).max(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::tests::{ev, song};

    #[test]
    fn test_compute_is_deterministic() {
        let catalog = SongCatalog::new(vec![
            song("s1", "Rock", "Sad"),
            song("s2", "Pop", "Happy"),
            song("s3", "Pop", "Happy"),
        ])
        .unwrap();
        let events = vec![
            ev("u2", "s1", "2025-03-24T01:00", 100.0),
            ev("u1", "s2", "2025-03-25T02:00", 200.0),
            ev("u2", "s1", "2025-03-26T03:00", 300.0),
            ev("u1", "s3", "2025-03-27T23:00", 150.0),
            ev("u3", "gone", "2025-03-28T04:00", 10.0),
        ];
        let config = AnalyticsConfig::default();

        let first = DerivedRelations::compute(&events, &catalog, &config);
        let second = DerivedRelations::compute(&events, &catalog, &config);
        assert_eq!(first, second);
        assert_eq!(first.recommendations.len(), 1);
        assert_eq!(first.recommendations[0].user_id, "u2");
        assert_eq!(first.avg_listen_time.len(), 4);
    }

    #[test]
    fn test_night_window_comes_from_config() {
        let events: Vec<_> = (0..6)
            .map(|day| ev("late", "s1", &format!("2025-03-2{}T23:00", 4 + day % 5), 100.0))
            .collect();
        let mut config = AnalyticsConfig::default();

        let derived = DerivedRelations::compute(&events, &SongCatalog::default(), &config);
        assert!(derived.night_owls.is_empty());

        config.night_start_hour = 22;
        config.night_end_hour = 23;
        let derived = DerivedRelations::compute(&events, &SongCatalog::default(), &config);
        assert_eq!(derived.night_owls.len(), 1);
        assert_eq!(derived.night_owls[0].user_id, "late");
        assert_eq!(derived.night_owls[0].count, 6);
    }

    #[test]
    fn test_empty_inputs_compute_empty_relations() {
        let derived =
            DerivedRelations::compute(&[], &SongCatalog::default(), &AnalyticsConfig::default());
        assert_eq!(derived, DerivedRelations::default());
    }

    #[test]
    fn test_input_summary() {
        let catalog = SongCatalog::new(vec![song("s1", "Rock", "Sad")]).unwrap();
        let events = vec![
            ev("u1", "s1", "2025-03-24T01:00", 100.0),
            ev("u2", "s1", "2025-03-20T01:00", 100.0),
            ev("u2", "s9", "2025-03-30T01:00", 100.0),
        ];
        let summary = InputSummary::new(&events, &catalog);
        assert_eq!(summary.events, 3);
        assert_eq!(summary.songs, 1);
        assert_eq!(summary.users, 2);
        assert_eq!(summary.songs_played, 2);
        assert_eq!(summary.unmatched_events, 1);
        assert_eq!(summary.first_event, Some(events[1].timestamp));
        assert_eq!(summary.last_event, Some(events[2].timestamp));
    }
}
