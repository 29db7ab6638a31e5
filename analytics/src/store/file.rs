//! CSV inputs and per-relation output files.
//!
//! Flat relations are written as CSV with a header row, the nested
//! recommendations relation as JSON lines. An empty relation still produces
//! its file (CSV: header only).

use relations::{ListeningEvent, RelationSchema, SchemaError, SongMetadata};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{RelationSink, RelationSource};
use crate::{Error, Result};

pub const DEFAULT_EVENTS_FILE: &str = "listening_logs.csv";
pub const DEFAULT_METADATA_FILE: &str = "songs_metadata.csv";

#[derive(Debug, Clone)]
pub struct FileSource {
    events_path: PathBuf,
    metadata_path: PathBuf,
}

impl FileSource {
    pub fn new(events_path: impl Into<PathBuf>, metadata_path: impl Into<PathBuf>) -> Self {
        Self {
            events_path: events_path.into(),
            metadata_path: metadata_path.into(),
        }
    }

    /// Default file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(DEFAULT_EVENTS_FILE), dir.join(DEFAULT_METADATA_FILE))
    }
}

impl RelationSource for FileSource {
    async fn load_listening_events(&self) -> Result<Vec<ListeningEvent>> {
        let events: Vec<ListeningEvent> = read_csv(&self.events_path).await?;
        for (i, event) in events.iter().enumerate() {
            event.validate(i + 1)?;
        }
        tracing::info!(
            "loaded {} listening events from {}",
            events.len(),
            self.events_path.display()
        );
        Ok(events)
    }

    async fn load_song_metadata(&self) -> Result<Vec<SongMetadata>> {
        let songs: Vec<SongMetadata> = read_csv(&self.metadata_path).await?;
        tracing::info!(
            "loaded {} songs from {}",
            songs.len(),
            self.metadata_path.display()
        );
        Ok(songs)
    }
}

/// Parse a headed CSV file into rows of `R`, checking the header first.
pub async fn read_csv<R>(path: &Path) -> Result<Vec<R>>
where
    R: RelationSchema + DeserializeOwned,
{
    let bytes = tokio::fs::read(path).await.map_err(|e| Error::io(path, e))?;
    parse_csv(&bytes)
}

pub fn parse_csv<R>(bytes: &[u8]) -> Result<Vec<R>>
where
    R: RelationSchema + DeserializeOwned,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let columns: Vec<&str> = headers.iter().collect();
    relations::require_columns::<R, _>(&columns)?;

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<R>().enumerate() {
        let row = record.map_err(|e| SchemaError::IncompatibleType {
            relation: R::NAME,
            row: i + 1,
            message: e.to_string(),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Writes each relation to `<dir>/<name>.csv` (or `.json` when nested).
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for<R: RelationSchema>(&self) -> PathBuf {
        let ext = if R::NESTED { "json" } else { "csv" };
        self.dir.join(format!("{}.{}", R::NAME, ext))
    }
}

impl RelationSink for FileSink {
    async fn persist<R>(&self, rows: &[R]) -> Result<()>
    where
        R: RelationSchema + Serialize,
    {
        let path = self.path_for::<R>();
        let bytes = if R::NESTED {
            encode_json_lines(rows)?
        } else {
            encode_csv(rows).map_err(|e| match e {
                EncodeError::Csv(e) => Error::Csv(e),
                EncodeError::Io(e) => Error::io(&path, e),
            })?
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::io(&self.dir, e))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::io(&path, e))?;

        tracing::info!("wrote {} rows to {}", rows.len(), path.display());
        Ok(())
    }
}

#[derive(Debug)]
enum EncodeError {
    Csv(csv::Error),
    Io(std::io::Error),
}

fn encode_csv<R>(rows: &[R]) -> std::result::Result<Vec<u8>, EncodeError>
where
    R: RelationSchema + Serialize,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(R::COLUMNS).map_err(EncodeError::Csv)?;
    for row in rows {
        writer.serialize(row).map_err(EncodeError::Csv)?;
    }
    writer.into_inner().map_err(|e| EncodeError::Io(e.into_error()))
}

fn encode_json_lines<R: Serialize>(rows: &[R]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.push(b'\n');
    }
    Ok(out)
}
