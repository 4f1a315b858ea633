// ABOUTME: Entry point for the staffvax binary.
// ABOUTME: Parses CLI subcommands, initializes tracing, then serves, migrates, imports or reports.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use staffvax_core::report::status_counts;
use staffvax_core::{
    DataQualityReport, SearchResults, StatusComparison, VaccinationPivot, VaccinationStatus,
};
use staffvax_server::{AppState, ServerConfig, create_router};
use staffvax_store::{
    CheckpointStore, DatabaseConfig, MigrationEngine, MigrationSettings, PostgresStore, StaffStore,
    import_staff, import_statuses, open_embedded, open_store, read_rows,
};

const DEFAULT_LOG_FILTER: &str =
    "staffvax=info,staffvax_core=info,staffvax_store=info,staffvax_server=info,tower_http=info";

/// Pool size for the hosted side of a migration run.
const MIGRATION_POOL_MAX: u32 = 3;

/// Staff vaccination status API and maintenance commands.
#[derive(Parser)]
#[command(name = "staffvax", about = "Staff vaccination status API and data tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API on 0.0.0.0:$PORT.
    Serve,

    /// Create the staff table and indexes in the configured store.
    Setup,

    /// Copy every embedded record into the hosted store, resuming from the checkpoint.
    Migrate {
        /// Checkpoint file recording progress between runs.
        #[arg(long, env = "MIGRATION_CHECKPOINT", default_value = "data/migration_progress.json")]
        checkpoint: PathBuf,

        /// Total used for the completion percentage (default: source row count).
        #[arg(long)]
        expected_total: Option<u64>,
    },

    /// Create or overwrite staff details from a workbook or JSON rows file.
    ImportStaff {
        /// Staff workbook (.xlsx, .xls, .ods) or JSON array of sheet rows.
        path: PathBuf,
    },

    /// Set vaccination statuses from a workbook or JSON rows file, in one transaction.
    ImportStatus {
        /// Status workbook (.xlsx, .xls, .ods) or JSON array of sheet rows.
        path: PathBuf,
    },

    /// Print a data-quality report for the configured store.
    Report,

    /// Print vaccination coverage per directorate.
    Pivot,

    /// Find staff whose email, employee number or name contains a term.
    Search {
        term: String,
    },

    /// Compare vaccination statuses between the embedded and hosted stores.
    Compare,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve => serve().await,
        Commands::Setup => setup().await,
        Commands::Migrate {
            checkpoint,
            expected_total,
        } => migrate(checkpoint, expected_total).await,
        Commands::ImportStaff { path } => import(path, ImportKind::Staff).await,
        Commands::ImportStatus { path } => import(path, ImportKind::Status).await,
        Commands::Report => report().await,
        Commands::Pivot => pivot().await,
        Commands::Search { term } => search(&term).await,
        Commands::Compare => compare().await,
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    let store = open_store(&config.database)
        .await
        .context("failed to open staff store")?;

    let state = Arc::new(AppState::new(store, config.frontend_origin.clone()));
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "staffvax listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("staffvax shut down");
    Ok(())
}

async fn setup() -> anyhow::Result<()> {
    let config = DatabaseConfig::from_env()?;
    let store = open_store(&config)
        .await
        .context("failed to open staff store")?;
    let count = store.count().await?;
    println!("Staff table ready on {} ({count} rows)", store.backend());
    Ok(())
}

async fn migrate(checkpoint: PathBuf, expected_total: Option<u64>) -> anyhow::Result<()> {
    let config = DatabaseConfig::from_env()?;

    let source = open_embedded(&config).context("failed to open embedded store")?;
    let mut hosted = config.hosted.clone();
    hosted.max_connections = MIGRATION_POOL_MAX;
    let target = Arc::new(
        PostgresStore::connect(&hosted)
            .await
            .context("failed to connect to hosted store")?,
    );

    let expected_total = match expected_total {
        Some(total) => total,
        None => source.count().await?,
    };
    let checkpoints = CheckpointStore::new(checkpoint);
    tracing::info!(
        expected_total,
        checkpoint = %checkpoints.path().display(),
        "starting migration"
    );

    let engine = MigrationEngine::new(
        source,
        target.clone(),
        checkpoints,
        MigrationSettings::new(expected_total),
    );
    let result = engine.run().await;
    target.close().await;

    println!("{}", result?);
    Ok(())
}

enum ImportKind {
    Staff,
    Status,
}

async fn import(path: PathBuf, kind: ImportKind) -> anyhow::Result<()> {
    let rows = read_rows(&path).with_context(|| format!("failed to read {}", path.display()))?;
    tracing::info!(rows = rows.len(), path = %path.display(), "read rows");

    let config = DatabaseConfig::from_env()?;
    let store = open_store(&config)
        .await
        .context("failed to open staff store")?;

    let summary = match kind {
        ImportKind::Staff => import_staff(store.as_ref(), &rows).await,
        ImportKind::Status => import_statuses(store.as_ref(), &rows).await,
    };
    println!("{summary}");

    if matches!(kind, ImportKind::Status) {
        let records = store.list_all().await?;
        println!("\nCurrent Vaccination Status Distribution:");
        for share in status_counts(&records) {
            println!("  {}: {}", VaccinationStatus::label(share.status), share.count);
        }
    }
    Ok(())
}

async fn report() -> anyhow::Result<()> {
    let config = DatabaseConfig::from_env()?;
    let store = open_store(&config)
        .await
        .context("failed to open staff store")?;
    let records = store.list_all().await?;
    println!("{}", DataQualityReport::from_records(&records));
    Ok(())
}

async fn pivot() -> anyhow::Result<()> {
    let config = DatabaseConfig::from_env()?;
    let store = open_store(&config)
        .await
        .context("failed to open staff store")?;
    let records = store.list_all().await?;
    println!("{}", VaccinationPivot::from_records(&records));
    Ok(())
}

async fn search(term: &str) -> anyhow::Result<()> {
    let config = DatabaseConfig::from_env()?;
    let store = open_store(&config)
        .await
        .context("failed to open staff store")?;
    let records = store.list_all().await?;
    println!("{}", SearchResults::search(&records, term));
    Ok(())
}

async fn compare() -> anyhow::Result<()> {
    let config = DatabaseConfig::from_env()?;
    let embedded = open_embedded(&config).context("failed to open embedded store")?;
    let hosted = PostgresStore::connect(&config.hosted)
        .await
        .context("failed to connect to hosted store")?;

    let left = embedded.list_all().await?;
    let right = hosted.list_all().await;
    hosted.close().await;
    let right = right?;
    println!("{} rows: {}", embedded.backend(), left.len());
    println!("{} rows: {}", hosted.backend(), right.len());
    println!(
        "{}",
        StatusComparison::compare(embedded.backend(), &left, hosted.backend(), &right)
    );
    Ok(())
}
