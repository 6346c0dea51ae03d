//! send-sysinfo-influx
//!
//! Collects host and container stats and writes them to InfluxDB, once or in a
//! loop. This is the entry point that resolves configuration, sets up logging
//! and drives the send loop until it finishes or a signal arrives.

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info, warn};

use sysinfo_influxdb::cli::Args;
use sysinfo_influxdb::config::{
    effective_log_level, resolve_config, show_config, validate_effective_config, Config,
};
use sysinfo_influxdb::credentials::prompt_password;
use sysinfo_influxdb::sink::influxdb::InfluxClient;
use sysinfo_influxdb::system;
use sysinfo_influxdb::{
    ContainerCollector, ContainerTool, DockerCli, ProcfsSource, SendOptions, Sender, Sink,
    SnapshotSource, StatAggregator,
};

/// Initializes tracing logging subsystem with the given level.
fn setup_logging(level: LevelFilter) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    debug!("Logging initialized with level: {}", level);
    Ok(())
}

/// Completes on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Drives the send loop until it ends or a shutdown signal arrives.
async fn drive<S, T, K>(mut sender: Sender<S, T, K>) -> anyhow::Result<()>
where
    S: SnapshotSource,
    T: ContainerTool,
    K: Sink,
{
    tokio::select! {
        result = sender.run() => {
            let stats = result?;
            info!(
                "Finished after {} ticks: {} batches sent, {} failures",
                stats.ticks, stats.sent_batches, stats.failures
            );
        }
        _ = shutdown_signal() => {
            let stats = sender.stats();
            info!("Shutdown signal received after {} ticks, exiting...", stats.ticks);
        }
    }
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config: Config = resolve_config(&args)?;

    if args.check_config || args.show_config {
        validate_effective_config(&config)?;
        if args.show_config {
            show_config(&config, args.config_format)?;
        } else {
            println!("Configuration is valid");
        }
        return Ok(());
    }

    validate_effective_config(&config)?;
    setup_logging(effective_log_level(&args, &config))?;

    if args.ask_password {
        let password = prompt_password("Password: ").context("Failed to read password")?;
        config.password = Some(password);
    }

    let hostname = system::hostname();
    let options = SendOptions {
        print_points: args.verbose,
        database: config.database().to_string(),
        create_database: config.create_database.unwrap_or(false),
        extra_tags: config.effective_extra_tags(&hostname),
        interval: config.interval(),
        ignore_errors: config.ignore_errors.unwrap_or(false),
        count: config.count,
    };
    debug!("Send options: {:?}", options);

    let sink = if args.no_send {
        info!("Dry run, points will not be sent");
        None
    } else {
        let influx = config.influx();
        info!(
            "Sending to {}:{} database {}",
            influx.host, influx.port, influx.database
        );
        Some(InfluxClient::new(influx).context("Failed to build InfluxDB client")?)
    };

    let aggregator = StatAggregator::new(ProcfsSource::new());
    match config.containers() {
        Some(inspect) => {
            let tool = DockerCli::new(config.docker_binary());
            let containers = ContainerCollector::new(tool, hostname, inspect);
            drive(Sender::new(aggregator.with_containers(containers), sink, options)).await
        }
        None => drive(Sender::new(aggregator, sink, options)).await,
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let silent = args.silent;

    if let Err(e) = run(args).await {
        if !silent {
            eprintln!("{e:#}");
        }
        std::process::exit(1);
    }
}
