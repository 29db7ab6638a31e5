//! Per-user and per-song aggregates over the listening log.
//!
//! Every function is pure: it borrows the input relations and returns a new
//! derived relation in a canonical row order. Events whose `song_id` is not
//! in the catalog are dropped from genre-dependent results (inner join) but
//! still count wherever the catalog is not consulted.

use chrono::{DateTime, Utc};
use relations::{
    AvgListenTime, GenreLoyalty, ListeningEvent, NightOwlUser, SongCatalog, SongMetadata, TopSong,
    UserFavoriteGenre,
};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// user_id -> category -> play count
pub(crate) type CategoryCounts<'a> = BTreeMap<&'a str, BTreeMap<&'a str, u64>>;

/// Join events to the catalog and count plays per user per category
/// (genre, mood, ...). Events without catalog metadata are skipped.
pub(crate) fn count_by_user_category<'a, F>(
    events: &'a [ListeningEvent],
    catalog: &'a SongCatalog,
    category: F,
) -> CategoryCounts<'a>
where
    F: Fn(&'a SongMetadata) -> &'a str,
{
    let mut counts: CategoryCounts<'a> = BTreeMap::new();
    let mut unmatched = 0usize;

    for event in events {
        let Some(song) = catalog.get(&event.song_id) else {
            unmatched += 1;
            continue;
        };
        *counts
            .entry(event.user_id.as_str())
            .or_default()
            .entry(category(song))
            .or_default() += 1;
    }

    if unmatched > 0 {
        tracing::debug!(
            "{} of {} events reference songs missing from the catalog, excluded from join",
            unmatched,
            events.len()
        );
    }

    counts
}

/// Every key whose count equals the maximum count, in key order.
///
/// Ties are all kept, so a user can have several favorites.
pub(crate) fn top_ranked<'a>(counts: &BTreeMap<&'a str, u64>) -> Vec<(&'a str, u64)> {
    let Some(max) = counts.values().copied().max() else {
        return Vec::new();
    };
    counts
        .iter()
        .filter(|&(_, &count)| count == max)
        .map(|(&key, &count)| (key, count))
        .collect()
}

/// Each user's most played genre(s).
pub fn favorite_genre(events: &[ListeningEvent], catalog: &SongCatalog) -> Vec<UserFavoriteGenre> {
    let counts = count_by_user_category(events, catalog, |song| song.genre.as_str());

    counts
        .iter()
        .flat_map(|(user_id, genres)| {
            top_ranked(genres)
                .into_iter()
                .map(move |(genre, count)| UserFavoriteGenre {
                    user_id: user_id.to_string(),
                    genre: genre.to_string(),
                    count,
                })
        })
        .collect()
}

/// Mean `duration_sec` per song. Needs no metadata.
pub fn avg_listen_time(events: &[ListeningEvent]) -> Vec<AvgListenTime> {
    let mut totals: BTreeMap<&str, (f64, u64)> = BTreeMap::new();
    for event in events {
        let entry = totals.entry(event.song_id.as_str()).or_default();
        entry.0 += event.duration_sec;
        entry.1 += 1;
    }

    totals
        .into_iter()
        .map(|(song_id, (sum, plays))| AvgListenTime {
            song_id: song_id.to_string(),
            avg_duration_sec: sum / plays as f64,
        })
        .collect()
}

/// Most played songs with a timestamp in `[start, end)`, at most `limit`.
///
/// Sorted by count descending; equal counts are ordered by `song_id`
/// ascending, which also decides who survives a tie at the cutoff.
pub fn top_songs_this_week(
    events: &[ListeningEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: usize,
) -> Vec<TopSong> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for event in events
        .iter()
        .filter(|e| e.timestamp >= start && e.timestamp < end)
    {
        *counts.entry(event.song_id.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<(&str, u64)> = counts.into_iter().collect();
    // stable sort keeps the song_id order among equal counts
    ranked.sort_by_key(|&(_, count)| Reverse(count));
    ranked.truncate(limit);

    ranked
        .into_iter()
        .map(|(song_id, count)| TopSong {
            song_id: song_id.to_string(),
            count,
        })
        .collect()
}

/// Share of each user's plays that went to their top genre(s), kept when
/// at least `threshold`.
///
/// The denominator counts all of the user's events, including those whose
/// song has no metadata.
pub fn genre_loyalty(
    events: &[ListeningEvent],
    catalog: &SongCatalog,
    threshold: f64,
) -> Vec<GenreLoyalty> {
    let mut total_plays: BTreeMap<&str, u64> = BTreeMap::new();
    for event in events {
        *total_plays.entry(event.user_id.as_str()).or_default() += 1;
    }

    let counts = count_by_user_category(events, catalog, |song| song.genre.as_str());

    let mut loyal = Vec::new();
    for (user_id, genres) in &counts {
        let total = total_plays.get(user_id).copied().unwrap_or(0);
        if total == 0 {
            continue;
        }
        for (genre, count) in top_ranked(genres) {
            let loyalty_score = count as f64 / total as f64;
            if loyalty_score >= threshold {
                loyal.push(GenreLoyalty {
                    user_id: user_id.to_string(),
                    genre: genre.to_string(),
                    loyalty_score,
                });
            }
        }
    }

    tracing::debug!(
        "{} of {} users meet the loyalty threshold {}",
        loyal.len(),
        counts.len(),
        threshold
    );
    loyal
}

/// Users with more than `min_plays` events whose UTC hour is in
/// `night_hours`.
pub fn night_owl_users(
    events: &[ListeningEvent],
    night_hours: RangeInclusive<u32>,
    min_plays: u64,
) -> Vec<NightOwlUser> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for event in events.iter().filter(|e| night_hours.contains(&e.hour())) {
        *counts.entry(event.user_id.as_str()).or_default() += 1;
    }

    counts
        .into_iter()
        .filter(|&(_, count)| count > min_plays)
        .map(|(user_id, count)| NightOwlUser {
            user_id: user_id.to_string(),
            count,
        })
        .collect()
}
