use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vmsync_adapters::VpicSource;
use vmsync_storage::{MemoryMakeStore, PgMakeStore};
use vmsync_sync::{run_scheduled, SyncConfig, SyncPipeline, SyncScheduler};
use vmsync_web::AppState;

const DEFAULT_LOG_FILTER: &str =
    "vmsync=info,vmsync_storage=info,vmsync_adapters=info,vmsync_sync=info,vmsync_web=info";

#[derive(Debug, Parser)]
#[command(name = "vmsync")]
#[command(about = "Vehicle make and type sync")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one full sync cycle and print its summary.
    Sync {
        #[arg(long)]
        no_self_check: bool,
        /// Use a throwaway in-memory store instead of the database.
        #[arg(long)]
        memory: bool,
    },
    /// Apply store migrations.
    Migrate,
    /// Compare remote and stored make counts.
    Check,
    /// Serve the read API and run scheduled syncs until Ctrl-C.
    Serve {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        no_scheduler: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = SyncConfig::from_env();

    match cli.command.unwrap_or(Commands::Sync {
        no_self_check: false,
        memory: false,
    }) {
        Commands::Sync {
            no_self_check,
            memory,
        } => {
            if no_self_check {
                config.self_check = false;
            }
            let pipeline = if memory {
                in_memory_pipeline(&config)?
            } else {
                SyncPipeline::from_config(&config).await?
            };
            let summary = pipeline.run_once().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Migrate => {
            let store = PgMakeStore::connect(&config.database_url, config.db_max_connections)
                .await
                .context("connecting to make store")?;
            store.migrate().await.context("running migrations")?;
            println!("migrations applied");
        }
        Commands::Check => {
            let pipeline = SyncPipeline::from_config(&config).await?;
            let check = pipeline.check_counts().await;
            println!("{}", serde_json::to_string_pretty(&check)?);
        }
        Commands::Serve { port, no_scheduler } => {
            if no_scheduler {
                config.scheduler_enabled = false;
            }
            let port = port.unwrap_or_else(vmsync_web::port_from_env);
            let pipeline = Arc::new(SyncPipeline::from_config(&config).await?);
            let web = vmsync_web::serve(AppState::new(pipeline.store()), port);

            if config.scheduler_enabled {
                let scheduler = SyncScheduler::new(pipeline);
                tokio::select! {
                    res = web => res?,
                    res = run_scheduled(scheduler, &config.sync_cron) => res?,
                }
            } else {
                tokio::select! {
                    res = web => res?,
                    res = tokio::signal::ctrl_c() => res.context("waiting for shutdown signal")?,
                }
            }
            info!("shutdown complete");
        }
    }

    Ok(())
}

fn in_memory_pipeline(config: &SyncConfig) -> Result<SyncPipeline> {
    let source = VpicSource::new(config.source_base_url.clone(), config.http_client_config())?;
    Ok(
        SyncPipeline::new(Arc::new(source), Arc::new(MemoryMakeStore::new()))
            .with_loader(config.type_loader())
            .with_self_check(config.self_check),
    )
}
