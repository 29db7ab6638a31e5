use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use listening_analytics::store::file::{DEFAULT_EVENTS_FILE, DEFAULT_METADATA_FILE};
use listening_analytics::store::{postgres, FileSink, FileSource, PgStore};
use listening_analytics::{pipeline, AnalyticsConfig, InputSummary};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "analyticscli")]
#[command(about = "listening analytics CLI tool", long_about = None)]
struct Cli {
    /// TOML file with analytics parameters
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputFiles {
    /// Listening log CSV
    #[arg(long, default_value = DEFAULT_EVENTS_FILE)]
    events: PathBuf,

    /// Song metadata CSV
    #[arg(long, default_value = DEFAULT_METADATA_FILE)]
    metadata: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and persist every derived relation
    Run {
        #[command(flatten)]
        inputs: InputFiles,

        /// Directory receiving one file per relation
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Read inputs from and write results to Postgres (DATABASE_URL)
        #[arg(long)]
        postgres: bool,

        /// First day of the top-songs week (inclusive)
        #[arg(long)]
        week_start: Option<NaiveDate>,

        /// Day the top-songs week ends (exclusive)
        #[arg(long)]
        week_end: Option<NaiveDate>,
    },

    /// Replace the Postgres input tables with the given CSV files
    Import {
        #[command(flatten)]
        inputs: InputFiles,
    },

    /// Summarise the input relations
    Inspect {
        #[command(flatten)]
        inputs: InputFiles,
    },

    /// Print a derived relation stored in Postgres
    Show {
        #[arg(value_name = "RELATION")]
        relation: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    listening_analytics::init_tracing("analyticscli=info,listening_analytics=info");

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            inputs,
            output,
            postgres,
            week_start,
            week_end,
        } => {
            let mut config = load_config(cli.config.as_deref()).await?;
            if let Some(start) = week_start {
                config.week_start = start;
            }
            if let Some(end) = week_end {
                config.week_end = end;
            }
            handle_run(&inputs, &output, postgres, &config).await
        }
        Commands::Import { inputs } => handle_import(&inputs).await,
        Commands::Inspect { inputs } => handle_inspect(&inputs).await,
        Commands::Show { relation } => handle_show(&relation).await,
    }
}

async fn load_config(path: Option<&Path>) -> Result<AnalyticsConfig> {
    match path {
        Some(path) => AnalyticsConfig::load(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(AnalyticsConfig::default()),
    }
}

async fn handle_run(
    inputs: &InputFiles,
    output: &Path,
    use_postgres: bool,
    config: &AnalyticsConfig,
) -> Result<()> {
    let result = if use_postgres {
        let store = PgStore::from_env()
            .await
            .context("Failed to initialize database")?;
        tracing::info!("Database connection established.");
        pipeline::run(&store, &store, config).await
    } else {
        let source = FileSource::new(&inputs.events, &inputs.metadata);
        let sink = FileSink::new(output);
        pipeline::run(&source, &sink, config).await
    };
    let derived = result.context("Pipeline run failed")?;

    println!("favorite genres:     {}", derived.favorite_genres.len());
    println!("song averages:       {}", derived.avg_listen_time.len());
    println!("top songs:           {}", derived.top_songs.len());
    println!("recommendations:     {}", derived.recommendations.len());
    println!("loyal users:         {}", derived.genre_loyalty.len());
    println!("night owls:          {}", derived.night_owls.len());
    Ok(())
}

async fn handle_import(inputs: &InputFiles) -> Result<()> {
    let source = FileSource::new(&inputs.events, &inputs.metadata);
    let (events, catalog) = pipeline::load_inputs(&source)
        .await
        .context("Failed to read input files")?;
    let songs: Vec<_> = catalog.iter().cloned().collect();

    let store = PgStore::from_env()
        .await
        .context("Failed to initialize database")?;
    store
        .replace_inputs(&events, &songs)
        .await
        .context("Failed to store inputs in the database")?;

    tracing::info!(
        "Successfully imported {} events and {} songs.",
        events.len(),
        songs.len()
    );
    Ok(())
}

async fn handle_inspect(inputs: &InputFiles) -> Result<()> {
    let source = FileSource::new(&inputs.events, &inputs.metadata);
    let (events, catalog) = pipeline::load_inputs(&source)
        .await
        .context("Failed to load inputs")?;
    let summary = InputSummary::new(&events, &catalog);

    println!("input relations:");
    println!("  listening events: {}", summary.events);
    println!("  catalog songs: {}", summary.songs);
    println!("  users: {}", summary.users);
    println!("  distinct songs played: {}", summary.songs_played);
    println!("  events without metadata: {}", summary.unmatched_events);
    match (summary.first_event, summary.last_event) {
        (Some(first), Some(last)) => println!("  time range: {} .. {}", first, last),
        _ => println!("  time range: (no events)"),
    }
    Ok(())
}

async fn handle_show(relation: &str) -> Result<()> {
    let store = PgStore::from_env()
        .await
        .context("Failed to initialize database")?;
    let rows = postgres::fetch_derived(store.pool(), relation)
        .await
        .with_context(|| format!("Failed to read {}", relation))?;

    if rows.is_empty() {
        println!("no rows stored for {}", relation);
        return Ok(());
    }
    for row in rows {
        println!("{}", row);
    }
    Ok(())
}
