//! Loading input relations and persisting derived ones.

use relations::{ListeningEvent, RelationSchema, SongMetadata};
use serde::Serialize;

use crate::Result;

pub mod file;
pub mod postgres;

pub use file::{FileSink, FileSource};
pub use postgres::PgStore;

/// Where the two input relations come from.
#[allow(async_fn_in_trait)]
pub trait RelationSource {
    async fn load_listening_events(&self) -> Result<Vec<ListeningEvent>>;
    async fn load_song_metadata(&self) -> Result<Vec<SongMetadata>>;
}

/// Where derived relations go. Persisting a relation replaces whatever was
/// stored under its name before.
#[allow(async_fn_in_trait)]
pub trait RelationSink {
    async fn persist<R>(&self, rows: &[R]) -> Result<()>
    where
        R: RelationSchema + Serialize;
}
