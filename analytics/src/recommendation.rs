//! Mood-based recommendations.
//!
//! Users whose primary mood (ties included) is the source mood get up to
//! `limit` songs of the target mood they have never played. Candidates are
//! taken in ascending `song_id` order. Users left with no candidate are
//! omitted rather than emitted with an empty list.

use relations::{HappyRecommendation, ListeningEvent, PlayKey, RecommendedSong, SongCatalog};
use std::collections::{BTreeSet, HashSet};

use crate::aggregation::{count_by_user_category, top_ranked};

/// Users for whom `mood` is among their most played moods.
pub fn users_with_primary_mood<'a>(
    events: &'a [ListeningEvent],
    catalog: &'a SongCatalog,
    mood: &str,
) -> BTreeSet<&'a str> {
    count_by_user_category(events, catalog, |song| song.mood.as_str())
        .iter()
        .filter(|(_, moods)| top_ranked(moods).iter().any(|&(m, _)| m == mood))
        .map(|(&user_id, _)| user_id)
        .collect()
}

pub fn mood_recommendations(
    events: &[ListeningEvent],
    catalog: &SongCatalog,
    source_mood: &str,
    target_mood: &str,
    limit: usize,
) -> Vec<HappyRecommendation> {
    let users = users_with_primary_mood(events, catalog, source_mood);
    if users.is_empty() {
        return Vec::new();
    }

    let played: HashSet<PlayKey> = events
        .iter()
        .filter(|e| users.contains(e.user_id.as_str()))
        .map(ListeningEvent::play_key)
        .collect();

    let mut recommendations = Vec::with_capacity(users.len());
    for user_id in &users {
        let recommended_songs: Vec<RecommendedSong> = catalog
            .with_mood(target_mood)
            .filter(|song| !played.contains(&PlayKey::new(user_id, &song.song_id)))
            .take(limit)
            .map(|song| RecommendedSong {
                song_id: song.song_id.clone(),
                title: song.title.clone(),
                artist: song.artist.clone(),
            })
            .collect();

        if recommended_songs.is_empty() {
            tracing::debug!(
                "user {} has already played every {} song, no recommendation",
                user_id,
                target_mood
            );
            continue;
        }

        recommendations.push(HappyRecommendation {
            user_id: user_id.to_string(),
            recommended_songs,
        });
    }

    tracing::debug!(
        "{} of {} {} users received {} recommendations",
        recommendations.len(),
        users.len(),
        source_mood,
        target_mood
    );
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::tests::{ev, plays, song};

    fn catalog() -> SongCatalog {
        SongCatalog::new(vec![
            song("sad1", "Indie", "Sad"),
            song("sad2", "Indie", "Sad"),
            song("h1", "Pop", "Happy"),
            song("h2", "Pop", "Happy"),
            song("h3", "Rock", "Happy"),
            song("h4", "Rock", "Happy"),
            song("c1", "Jazz", "Chill"),
        ])
        .unwrap()
    }

    fn ids(rec: &HappyRecommendation) -> Vec<&str> {
        rec.recommended_songs
            .iter()
            .map(|s| s.song_id.as_str())
            .collect()
    }

    #[test]
    fn test_sad_user_gets_first_unplayed_happy_songs() {
        let mut events = plays("u1", "sad1", 4);
        events.extend(plays("u1", "h2", 1));

        let recs = mood_recommendations(&events, &catalog(), "Sad", "Happy", 3);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].user_id, "u1");
        assert_eq!(ids(&recs[0]), vec!["h1", "h3", "h4"]);
        assert_eq!(recs[0].recommended_songs[0].title, "Title h1");
        assert_eq!(recs[0].recommended_songs[0].artist, "Artist h1");
    }

    #[test]
    fn test_never_recommends_played_song() {
        let mut events = plays("u1", "sad1", 5);
        events.extend(plays("u1", "sad2", 5));
        events.extend(plays("u1", "h1", 1));
        events.extend(plays("u1", "h3", 1));
        events.extend(plays("u2", "sad2", 2));
        events.extend(plays("u2", "h4", 1));

        let recs = mood_recommendations(&events, &catalog(), "Sad", "Happy", 3);
        let history: HashSet<PlayKey> = events.iter().map(ListeningEvent::play_key).collect();
        for rec in &recs {
            assert!(rec.recommended_songs.len() <= 3);
            for s in &rec.recommended_songs {
                assert!(!history.contains(&PlayKey::new(&rec.user_id, &s.song_id)));
            }
        }
        assert_eq!(recs.len(), 2);
        assert_eq!(ids(&recs[0]), vec!["h2", "h4"]);
    }

    #[test]
    fn test_tied_primary_mood_including_sad_qualifies() {
        let mut events = plays("tied", "sad1", 2);
        events.extend(plays("tied", "c1", 2));
        events.extend(plays("other", "h1", 2));
        events.extend(plays("other", "c1", 2));

        let catalog = catalog();
        let users = users_with_primary_mood(&events, &catalog, "Sad");
        assert_eq!(users.into_iter().collect::<Vec<_>>(), vec!["tied"]);
    }

    #[test]
    fn test_user_with_nothing_left_is_absent() {
        let mut events = plays("u1", "sad1", 9);
        for id in ["h1", "h2", "h3", "h4"] {
            events.extend(plays("u1", id, 1));
        }
        assert!(mood_recommendations(&events, &catalog(), "Sad", "Happy", 3).is_empty());
    }

    #[test]
    fn test_fewer_candidates_than_limit_returns_all() {
        let mut events = plays("u1", "sad1", 9);
        for id in ["h1", "h3", "h4"] {
            events.extend(plays("u1", id, 1));
        }
        let recs = mood_recommendations(&events, &catalog(), "Sad", "Happy", 3);
        assert_eq!(ids(&recs[0]), vec!["h2"]);
    }

    #[test]
    fn test_unmatched_events_do_not_shape_mood() {
        let mut events = plays("u1", "sad1", 1);
        events.extend(plays("u1", "not-in-catalog", 20));
        events.push(ev("u2", "not-in-catalog", "2025-03-24T01:00", 10.0));

        let recs = mood_recommendations(&events, &catalog(), "Sad", "Happy", 3);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].user_id, "u1");
    }

    #[test]
    fn test_empty_inputs() {
        assert!(mood_recommendations(&[], &catalog(), "Sad", "Happy", 3).is_empty());
        let events = plays("u1", "sad1", 3);
        assert!(mood_recommendations(&events, &SongCatalog::default(), "Sad", "Happy", 3).is_empty());
    }

    #[test]
    fn test_moods_and_cap_are_parameters() {
        let events = plays("u1", "h1", 3);
        let recs = mood_recommendations(&events, &catalog(), "Happy", "Sad", 1);
        assert_eq!(recs.len(), 1);
        assert_eq!(ids(&recs[0]), vec!["sad1"]);
    }
}
