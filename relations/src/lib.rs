//! Row schemas shared by the listening analytics pipeline.
//!
//! Two input relations (`listening_logs`, `songs_metadata`) and six derived
//! relations. Every row type implements [`RelationSchema`] so the data access
//! layer can check headers and name its outputs without knowing the rows.

pub mod derived;
pub mod input;
pub mod timestamp;

pub use derived::{
    AvgListenTime, GenreLoyalty, HappyRecommendation, NightOwlUser, RecommendedSong, TopSong,
    UserFavoriteGenre,
};
pub use input::{ListeningEvent, PlayKey, SongCatalog, SongMetadata};

use thiserror::Error;

/// Static description of a relation: its persisted name and its columns.
pub trait RelationSchema {
    const NAME: &'static str;
    const COLUMNS: &'static [&'static str];
    /// Rows hold a sequence column and cannot be written as flat records.
    const NESTED: bool = false;
}

/// Raised when an input relation does not match its declared schema.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("{relation}: missing required column `{column}`")]
    MissingColumn {
        relation: &'static str,
        column: String,
    },

    #[error("{relation}: row {row}: {message}")]
    IncompatibleType {
        relation: &'static str,
        row: usize,
        message: String,
    },

    #[error("{relation}: duplicate song_id `{song_id}`")]
    DuplicateKey {
        relation: &'static str,
        song_id: String,
    },
}

/// Check that every column `R` requires is present in `available`.
pub fn require_columns<R, S>(available: &[S]) -> Result<(), SchemaError>
where
    R: RelationSchema,
    S: AsRef<str>,
{
    for column in R::COLUMNS {
        if !available.iter().any(|c| c.as_ref().trim() == *column) {
            return Err(SchemaError::MissingColumn {
                relation: R::NAME,
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_columns_accepts_extra_and_reordered() {
        let header = ["timestamp", "extra", "song_id", "duration_sec", "user_id"];
        assert!(require_columns::<ListeningEvent, _>(&header).is_ok());
    }

    #[test]
    fn test_require_columns_reports_first_missing() {
        let header = ["user_id", "song_id", "timestamp"];
        let err = require_columns::<ListeningEvent, _>(&header).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingColumn {
                relation: "listening_logs",
                column: "duration_sec".to_string(),
            }
        );
    }

    #[test]
    fn test_nested_flag_only_on_recommendations() {
        assert!(HappyRecommendation::NESTED);
        assert!(!UserFavoriteGenre::NESTED);
        assert!(!TopSong::NESTED);
        assert!(!GenreLoyalty::NESTED);
    }
}
