mod args;

pub use args::{parse_args, parse_duration, Args, Commands};

use anyhow::{Context, Result};
use chrono::Utc;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{Config, Settings};
use crate::output::{create_formatter, write_snapshots};
use crate::poller::Poller;
use crate::prometheus::PrometheusMetrics;

/// Load the configuration file named on the command line, or the default one
pub fn load_config(args: &Args) -> Result<Config> {
    match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Prints the configuration file settings, or one section of them
fn print_config(config: &Config, section: Option<&str>) -> Result<()> {
    if section.is_none() {
        match Config::config_file_path() {
            Ok(path) => println!("# {}", path.display()),
            Err(e) => info!("No configuration path: {}", e),
        }
    }
    print!("{}", config.to_toml(section)?);
    Ok(())
}

/// Resolve the Prometheus address, discovering it in the cluster when not configured
async fn resolve_address(args: &Args, settings: &Settings) -> Result<String> {
    if let Some(address) = &settings.address {
        return Ok(address.clone());
    }

    info!(
        "No Prometheus address configured, looking up {}/{}",
        settings.discovery.namespace, settings.discovery.service
    );
    let client = crate::k8s::create_client(args).await?;
    crate::k8s::discover_prometheus(&client, &settings.discovery)
        .await
        .context("Prometheus discovery failed; pass --address to skip it")
}

pub async fn run(args: Args, ui: bool) -> Result<()> {
    let config = load_config(&args)?;

    if let Some(Commands::GetConfig { key }) = &args.command {
        return print_config(&config, key.as_deref());
    }

    let settings = Settings::resolve(&config, &args)?;
    let address = resolve_address(&args, &settings).await?;

    // A bad address is fatal before anything is polled
    let metrics = PrometheusMetrics::new(&address, settings.request_timeout)
        .with_context(|| format!("Failed to create Prometheus client for {address}"))?;
    let mut poller = Poller::new(Arc::new(metrics), settings.poller.clone());
    let formatter = create_formatter(&args.output, atty::is(atty::Stream::Stdout));

    if args.once {
        let snapshot = poller
            .poll_once(Utc::now())
            .await
            .with_context(|| format!("Failed to read cluster metrics from {address}"))?;
        println!("{}", formatter.format(&snapshot)?);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    crate::logging::setup_signal_handler(cancel.clone());

    // One slot: a slow consumer makes the poller wait instead of queueing stale data
    let (tx, rx) = mpsc::channel(1);
    let poll_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { poller.run(tx, cancel).await }
    });

    let result = if ui {
        crate::ui::run_top(rx, cancel.clone(), address).await
    } else {
        info!("Writing {} snapshots to stdout", formatter.format_name());
        write_snapshots(rx, formatter.as_ref(), io::stdout()).await.map(|_| ())
    };

    cancel.cancel();
    let stats = poll_task.await.context("Poller task failed")?;
    debug!("Final poller stats: {:?}", stats);

    result
}
