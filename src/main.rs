//! MegBot - Entry Point
//!
//! Runs the orchestrator against the standalone collaborators: bootstrap,
//! startup hooks, one local transport connection, then recurring jobs until
//! Ctrl-C.

use megbot::{Config, LocalBot, Orchestrator, Services};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("MegBot v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: megbot");
        println!();
        println!("Environment variables:");
        println!("  MONGODB_URI / MONGODB_HOST / MONGODB_PORT   Storage location");
        println!("  DATABASE_NAME                               Database (default: MegBot)");
        println!("  BOT_NICKNAME                                Name used in logs");
        println!("  BUILD_MEMORY_INTERVAL                       Seconds between memory builds");
        println!("  FORGET_MEMORY_INTERVAL                      Seconds between memory decay runs");
        println!("  RUST_LOG                                    Log filter (default: info)");
        println!("  LOG_FORMAT                                  'json' for JSON lines");
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(true)
            .init();
    }

    info!("MegBot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let (orchestrator, mut failures) = Orchestrator::new(config, Services::standalone());

    tokio::spawn(async move {
        while let Some(failure) = failures.recv().await {
            warn!(
                task = %failure.task,
                panicked = failure.panicked,
                at = %failure.at.to_rfc3339(),
                "Background task failure: {}",
                failure.error
            );
        }
    });

    if let Err(e) = orchestrator.bootstrap().await {
        error!("Bootstrap failed: {}", e);
        return Err(e.into());
    }

    let report = orchestrator.on_startup().await?;
    if !report.is_ok() {
        warn!("Startup finished with hook failures");
    }

    if let Err(e) = orchestrator
        .on_bot_connect(Arc::new(LocalBot::new("local")))
        .await
    {
        error!("Connect hook failed: {}", e);
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    orchestrator.shutdown();

    Ok(())
}
