#![warn(clippy::all, clippy::pedantic)]

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use nodewatch::{CancellationToken, HealthMonitor, Notifier};
use tracing::{info, level_filters::LevelFilter, warn};

mod config;
mod directory;
mod notifier;

use config::Config;
use directory::FileDirectory;
use notifier::{LogNotifier, WebhookNotifier};

#[derive(Parser, Debug, Clone)]
#[command(name = "nodewatch", author, version, about)]
struct Args {
    #[arg(short, long, help = "Path to the configuration file")]
    config: Option<PathBuf>,
    #[arg(long, help = "Print the loaded configuration and exit")]
    print_config: bool,
    #[arg(short, long, help = "Log at debug level")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    logger::init_tracing_with(if args.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO });

    let config = Config::from_config(args.config.as_deref())?;
    if args.print_config {
        println!("{config}");
        return Ok(());
    }

    let notifier: Arc<dyn Notifier> = match &config.notifier.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url, config.monitor.notification_deadline())?),
        None => Arc::new(LogNotifier),
    };
    let directory = Arc::new(FileDirectory::new(&config.nodes));
    let monitor = HealthMonitor::new(config.monitor.clone(), directory, notifier)?;

    for entry in &config.nodes {
        if let Err(e) = monitor.register(entry.to_node()).await {
            warn!(node_id = %entry.id, error = %e, "Skipping node");
        }
    }

    let shutdown = CancellationToken::new();
    monitor.start(&shutdown)?;
    info!(workers = config.monitor.workers, "Monitoring started");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    shutdown.cancel();
    monitor.stop().await?;

    Ok(())
}
