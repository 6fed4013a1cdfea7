// Hoopscope poller entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Open database
// 4. Build the ESPN client
// 5. Start the read API
// 6. Poll until Ctrl+C

use std::sync::Arc;

use hoopscope_app::api;
use hoopscope_app::config;
use hoopscope_app::db;
use hoopscope_app::espn::EspnClient;
use hoopscope_app::poller::Poller;

use anyhow::Context;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Hoopscope poller starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: feed={}, polling every {}s",
        config.feed.base_url, config.poller.interval_secs
    );

    // 3. Open database
    let db = Arc::new(
        db::Database::open(&config.database.path).context("failed to open database")?,
    );
    info!("Database opened at {}", config.database.path);

    // 4. Build the feed client
    let client = EspnClient::new(
        &config.feed.base_url,
        &config.feed.league_path,
        config.feed.timeout(),
    )
    .context("failed to build feed client")?;

    // 5. Start the read API
    let api_task = if config.api.enabled {
        let listener = tokio::net::TcpListener::bind(config.api.bind)
            .await
            .with_context(|| format!("failed to bind API server to {}", config.api.bind))?;
        Some(tokio::spawn(api::serve(listener, Arc::clone(&db))))
    } else {
        info!("API server disabled");
        None
    };

    // 6. Poll until Ctrl+C
    let poller = Poller::new(
        client,
        Arc::clone(&db),
        config.thresholds,
        config.poller.lookback_days,
    );
    poller.run(config.poller.interval()).await?;

    if let Some(task) = api_task {
        task.abort();
    }

    info!("Hoopscope poller shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to `logs/hoopscope.log`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("hoopscope.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hoopscope=info,hoopscope_app=info,hoopscope_core=info,warn")),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
