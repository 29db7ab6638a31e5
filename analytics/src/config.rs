//! Run parameters for the analytics pipeline.
//!
//! Defaults describe the week of 2025-03-24. A TOML file may override any
//! subset of keys; dates are quoted `YYYY-MM-DD` strings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// First day of the top-songs window, inclusive.
    pub week_start: NaiveDate,
    /// Day the top-songs window ends, exclusive.
    pub week_end: NaiveDate,
    pub top_songs_limit: usize,
    pub night_start_hour: u32,
    /// Inclusive.
    pub night_end_hour: u32,
    /// A user must have strictly more night plays than this.
    pub night_owl_min_plays: u64,
    pub loyalty_threshold: f64,
    pub recommendation_limit: usize,
    pub source_mood: String,
    pub target_mood: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            week_start: NaiveDate::from_ymd_opt(2025, 3, 24).unwrap_or_default(),
            week_end: NaiveDate::from_ymd_opt(2025, 3, 29).unwrap_or_default(),
            top_songs_limit: 10,
            night_start_hour: 0,
            night_end_hour: 5,
            night_owl_min_plays: 5,
            loyalty_threshold: 0.8,
            recommendation_limit: 3,
            source_mood: "Sad".to_string(),
            target_mood: "Happy".to_string(),
        }
    }
}

impl AnalyticsConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AnalyticsConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(path, e))?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("loaded analytics config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.week_start >= self.week_end {
            return Err(Error::Config(format!(
                "week_start ({}) must be before week_end ({})",
                self.week_start, self.week_end
            )));
        }
        if self.night_end_hour > 23 || self.night_start_hour > self.night_end_hour {
            return Err(Error::Config(format!(
                "night hours must satisfy 0 <= start <= end <= 23, got {}..={}",
                self.night_start_hour, self.night_end_hour
            )));
        }
        if !(self.loyalty_threshold > 0.0 && self.loyalty_threshold <= 1.0) {
            return Err(Error::Config(format!(
                "loyalty_threshold must be in (0, 1], got {}",
                self.loyalty_threshold
            )));
        }
        Ok(())
    }

    /// Half-open `[start, end)` window at UTC midnight.
    pub fn week_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.week_start.and_time(chrono::NaiveTime::MIN).and_utc(),
            self.week_end.and_time(chrono::NaiveTime::MIN).and_utc(),
        )
    }

    /// Hours of the day (UTC) counted as night, both ends included.
    pub fn night_hours(&self) -> RangeInclusive<u32> {
        self.night_start_hour..=self.night_end_hour
    }
}
