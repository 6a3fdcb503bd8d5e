use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use log::{error, info, warn};
use sentinel::aggregator::{StatsAggregator, DEFAULT_SAMPLE_CAPACITY};
use sentinel::alerts::{
    AlertEngine, ClassifiedLine, DeliveryMetrics, DeliveryWorker, NotificationQueue, WebhookSink,
    NOTIFICATION_QUEUE_CAPACITY,
};
use sentinel::classifier::Classifier;
use sentinel::collectors::{Simulator, TailSource};
use sentinel::config::Config;
use sentinel::events::RawLine;
use sentinel::health::HealthRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Capacity of the raw-line channel between sources and the classifier
const RAW_LINE_CHANNEL_CAPACITY: usize = 4096;

/// Capacity of the classified-line channel feeding the alert engine
const CLASSIFIED_CHANNEL_CAPACITY: usize = 4096;

/// How long to wait for tasks to drain at shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Interval between status summaries in the log
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Command-line arguments for the log sentinel
#[derive(Parser)]
#[command(
    name = "sentinel",
    about = "Real-time log monitor with pattern-based alerting",
    long_about = "Tails growing log files, classifies each line by severity using \
                  structured-record parsing and keyword patterns, maintains live \
                  error-rate statistics, and posts rate-limited webhook alerts when \
                  operator-defined rules fire."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.toml",
        help = "Configuration file path (TOML format)"
    )]
    config: PathBuf,

    /// Generate synthetic log traffic instead of tailing files
    #[arg(long, help = "Feed the pipeline with generated lines (no files read)")]
    simulate: bool,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    // A broken configuration means the operator's rules are not in effect,
    // so refuse to start rather than run with partial coverage.
    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    info!(
        "Starting sentinel: {} rule(s), {} file(s), webhook {}",
        config.rules.len(),
        config.log_files.len(),
        if config.webhook_url.is_some() {
            "configured"
        } else {
            "disabled"
        }
    );

    run_pipeline(config, cli.simulate).await
}

async fn run_pipeline(config: Config, simulate: bool) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (raw_tx, raw_rx) = mpsc::channel::<RawLine>(RAW_LINE_CHANNEL_CAPACITY);
    let (classified_tx, classified_rx) =
        mpsc::channel::<ClassifiedLine>(CLASSIFIED_CHANNEL_CAPACITY);

    let classifier = Classifier::new(&config.rules).context("Failed to build classifier")?;
    let rule_names: Vec<String> = config.rules.iter().map(|r| r.name.clone()).collect();
    let aggregator = Arc::new(StatsAggregator::new(
        rule_names,
        DEFAULT_SAMPLE_CAPACITY,
        Utc::now(),
    ));
    let health = Arc::new(HealthRegistry::new(&config.log_files));

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    // Sources own clones of the raw-line sender; the original is dropped
    // below so the classifier sees the channel close once they all stop.
    if simulate {
        let simulator = Simulator::new(raw_tx.clone(), shutdown_rx.clone());
        tasks.push(tokio::spawn(simulator.run()));
    } else {
        for (source_id, path) in config.log_files.iter().enumerate() {
            let source = TailSource::new(
                source_id,
                path.clone(),
                config.polling_interval(),
                raw_tx.clone(),
                Arc::clone(&health),
                shutdown_rx.clone(),
            );
            tasks.push(tokio::spawn(source.run()));
        }
    }
    drop(raw_tx);

    tasks.push(tokio::spawn(classifier_task(
        classifier,
        raw_rx,
        classified_tx,
        Arc::clone(&aggregator),
    )));

    // Delivery runs behind a bounded queue so a slow webhook never blocks
    // classification. Without a webhook URL the alert engine still runs and
    // notifications surface in the log.
    let delivery_metrics = Arc::new(DeliveryMetrics::default());
    let queue = match &config.webhook_url {
        Some(url) => {
            let (queue, receiver) =
                NotificationQueue::bounded(NOTIFICATION_QUEUE_CAPACITY, Arc::clone(&delivery_metrics));
            let worker = DeliveryWorker::new(
                WebhookSink::new(url.clone()),
                receiver,
                Arc::clone(&delivery_metrics),
            );
            tasks.push(tokio::spawn(worker.run()));
            Some(queue)
        }
        None => None,
    };

    tasks.push(tokio::spawn(alert_task(
        AlertEngine::new(config.rules.clone()),
        classified_rx,
        queue,
    )));

    tasks.push(tokio::spawn(tick_task(
        Arc::clone(&aggregator),
        Arc::clone(&health),
        config.polling_interval(),
        simulate,
        shutdown_rx,
    )));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received, stopping pipeline");

    // Sources stop first; channel closure then cascades through the
    // classifier, the alert engine, and finally the delivery worker.
    let _ = shutdown_tx.send(true);
    let drain = async {
        for task in tasks {
            if let Err(e) = task.await {
                error!("Task failed during shutdown: {}", e);
            }
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!("Shutdown grace period elapsed with tasks still running");
    }

    let totals = aggregator.totals();
    info!(
        "Stopped after {} lines ({} errors, {} alerts delivered, {} dropped)",
        totals.lines,
        totals.errors(),
        delivery_metrics.delivered(),
        delivery_metrics.dropped()
    );
    Ok(())
}

/// Classify raw lines, record statistics, and fan out to the alert engine
async fn classifier_task(
    classifier: Classifier,
    mut raw_rx: mpsc::Receiver<RawLine>,
    classified_tx: mpsc::Sender<ClassifiedLine>,
    aggregator: Arc<StatsAggregator>,
) {
    while let Some(line) = raw_rx.recv().await {
        let classification = classifier.classify(&line);
        aggregator.record(&classification);

        // Only rule matches can fire alerts; everything else already
        // reached the counters above.
        if classification.matched_rule.is_some()
            && classified_tx
                .send(ClassifiedLine {
                    classification,
                    text: line.text,
                })
                .await
                .is_err()
        {
            break;
        }
    }
    info!("Classifier stopped");
}

/// Evaluate rule state machines and queue notifications for delivery
async fn alert_task(
    mut engine: AlertEngine,
    mut classified_rx: mpsc::Receiver<ClassifiedLine>,
    queue: Option<NotificationQueue>,
) {
    while let Some(event) = classified_rx.recv().await {
        if let Some(notification) = engine.observe(&event, Utc::now()) {
            warn!("ALERT: {}", notification.message);
            if let Some(ref queue) = queue {
                queue.push(notification);
            }
        }
    }
    info!("Alert engine stopped");
}

/// Advance the sample ring on the polling cadence and log periodic summaries
async fn tick_task(
    aggregator: Arc<StatsAggregator>,
    health: Arc<HealthRegistry>,
    poll_interval: Duration,
    simulate: bool,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let ticks_per_status =
        (STATUS_LOG_INTERVAL.as_millis() / poll_interval.as_millis().max(1)).max(1) as u64;
    let mut tick_count = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                aggregator.tick(Utc::now());
                tick_count += 1;
                if tick_count % ticks_per_status == 0 {
                    log_status(&aggregator, &health, simulate);
                }
            }
        }
    }
}

fn log_status(aggregator: &StatsAggregator, health: &HealthRegistry, simulate: bool) {
    let snapshot = aggregator.snapshot();
    let totals = &snapshot.totals;
    let rate = if totals.lines > 0 {
        totals.errors() as f64 / totals.lines as f64 * 100.0
    } else {
        0.0
    };
    info!(
        "{} lines | {} info, {} warning, {} error, {} panic | error rate {:.2}%",
        totals.lines, totals.info, totals.warning, totals.error, totals.panic, rate
    );
    for (name, count) in &snapshot.rule_counts {
        if *count > 0 {
            info!("  rule '{}': {} match(es)", name, count);
        }
    }
    if !simulate {
        for source in health.snapshot() {
            if source.state.is_degraded() {
                warn!("  source '{}' degraded (reopen failing)", source.path);
            }
        }
    }
}
