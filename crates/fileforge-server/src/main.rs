use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use fileforge_api::{AppState, RouterSettings, Toolbox, api_router};
use fileforge_jobs::{ArchiveStore, BatchRunner, RetentionSweeper, RunnerSettings, SchedulePolicy};
use fileforge_notify::{DeliveryMode, ProgressHub, ProgressSink};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fileforge", about = "Bulk file utilities with live progress events")]
struct Cli {
    #[arg(long, env = "FILEFORGE_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "FILEFORGE_PORT", default_value = "3000")]
    port: u16,

    /// Archives land here; per-job scratch space under `<dir>/work`.
    #[arg(long, env = "FILEFORGE_OUTPUT_DIR", default_value = "./output")]
    output_dir: PathBuf,

    #[arg(long, env = "FILEFORGE_MAX_CONCURRENT", default_value_t = 5)]
    max_concurrent: usize,

    /// `chunked` or `sliding`.
    #[arg(long, env = "FILEFORGE_SCHEDULE", default_value = "chunked")]
    schedule: SchedulePolicy,

    #[arg(long, env = "FILEFORGE_RETENTION_HOURS", default_value_t = 24)]
    retention_hours: u64,

    #[arg(long, env = "FILEFORGE_SWEEP_INTERVAL_SECS", default_value_t = 3600)]
    sweep_interval_secs: u64,

    /// `room-and-broadcast` or `room-only`.
    #[arg(long, env = "FILEFORGE_DELIVERY", default_value = "room-and-broadcast")]
    delivery: DeliveryMode,

    #[arg(long, env = "FILEFORGE_MAX_BODY_MB", default_value_t = 50)]
    max_body_mb: usize,

    #[arg(long, env = "FILEFORGE_FETCH_TIMEOUT_SECS", default_value_t = 30)]
    fetch_timeout_secs: u64,
}

fn scaled(value: u64, factor: u64, flag: &str) -> Result<u64, std::io::Error> {
    value.checked_mul(factor).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("--{flag} {value} is too large"),
        )
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env().add_directive("fileforge=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let retention = Duration::from_secs(scaled(cli.retention_hours, 60 * 60, "retention-hours")?);
    let max_body_bytes = usize::try_from(scaled(cli.max_body_mb as u64, 1024 * 1024, "max-body-mb")?)?;
    let addr = format!("{}:{}", cli.host, cli.port);

    tokio::fs::create_dir_all(&cli.output_dir).await?;
    let archives = ArchiveStore::new(cli.output_dir.clone());
    archives.prepare().await?;

    let hub = Arc::new(ProgressHub::new(cli.delivery));
    let sink: Arc<dyn ProgressSink> = hub.clone();
    let runner = BatchRunner::new(
        sink,
        archives.clone(),
        RunnerSettings {
            max_concurrent: cli.max_concurrent,
            policy: cli.schedule,
            ..RunnerSettings::default()
        },
    )?;
    info!(
        max_concurrent = cli.max_concurrent,
        schedule = %cli.schedule,
        delivery = %cli.delivery,
        output_dir = %cli.output_dir.display(),
        "batch runner configured"
    );

    let sweeper = RetentionSweeper::new(archives, retention);
    let sweep_interval = Duration::from_secs(cli.sweep_interval_secs.max(1));
    tokio::spawn(sweeper.run_loop(sweep_interval));
    info!(retention_hours = cli.retention_hours, "retention sweep enabled");

    let state = AppState::new(
        runner,
        hub,
        Toolbox::new(Duration::from_secs(cli.fetch_timeout_secs)),
    );
    let app = api_router(
        state,
        RouterSettings {
            max_body_bytes,
        },
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("fileforge server listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
