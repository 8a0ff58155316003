mod config;

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::Context,
    clap::Parser,
    ferry_dialogue::{SqliteLocks, SqliteStore as SqliteDialogues},
    ferry_pipeline::Pipeline,
    ferry_platform::HttpPlatform,
    ferry_queue::SqliteStore as SqliteQueue,
    ferry_responder::HttpResponder,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use config::RunnerConfig;

#[derive(Parser)]
#[command(name = "ferry", about = "Ferry — messenger auto-reply pipeline")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "ferry.toml", env = "FERRY_CONFIG")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Seconds between status log lines.
    #[arg(long, default_value_t = 60)]
    status_interval: u64,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = RunnerConfig::load(&cli.config)?;

    if let Some(parent) = config.db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).ok();
    }
    let db_url = format!("sqlite:{}?mode=rwc", config.db_path.display());
    let pool = sqlx::SqlitePool::connect(&db_url)
        .await
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;

    SqliteQueue::init(&pool).await.context("failed to init queue schema")?;
    SqliteDialogues::init(&pool)
        .await
        .context("failed to init dialogue schema")?;
    SqliteLocks::init(&pool)
        .await
        .context("failed to init chat lock schema")?;

    let queue = Arc::new(SqliteQueue::new(pool.clone()));
    let dialogues = Arc::new(SqliteDialogues::new(
        pool.clone(),
        config.pipeline.dialogue_config(),
    ));
    let locks = Arc::new(SqliteLocks::new(pool));
    let platform = Arc::new(HttpPlatform::new(config.platform.clone())?);
    let responder = Arc::new(HttpResponder::new(config.responder.clone())?);

    let mut pipeline = Pipeline::new(
        queue,
        dialogues,
        locks,
        platform,
        responder,
        config.pipeline.clone(),
    )?;
    pipeline.start();
    info!(db = %config.db_path.display(), "ferry running, press Ctrl-C to stop");

    let mut status_ticks = tokio::time::interval(Duration::from_secs(cli.status_interval.max(1)));
    status_ticks.tick().await; // the first tick fires immediately
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for shutdown signal")?;
                info!("shutdown signal received");
                break;
            },
            _ = status_ticks.tick() => {
                match pipeline.status().await {
                    Ok(status) => info!(
                        total = status.stats.total_messages,
                        pending = status.stats.pending,
                        processing = status.stats.processing,
                        completed = status.stats.completed,
                        failed = status.stats.failed,
                        dialogues = status.stats.active_dialogues,
                        "pipeline status"
                    ),
                    Err(e) => warn!(error = %e, "failed to read pipeline status"),
                }
            },
        }
    }

    pipeline.shutdown().await;
    Ok(())
}
