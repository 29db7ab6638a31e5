//! Listening analytics over a play log and a song catalog.
//!
//! Six derived relations are computed from the two inputs: favorite genres,
//! average listen time, the week's top songs, mood recommendations, genre
//! loyalty and night owls. The engines in [`aggregation`] and
//! [`recommendation`] are pure; [`store`] moves relations in and out and
//! [`pipeline`] ties the two together.

pub mod aggregation;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod recommendation;
pub mod store;

pub use config::AnalyticsConfig;
pub use error::{Error, Result};
pub use pipeline::{DerivedRelations, InputSummary};

/// Set up the fmt subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
