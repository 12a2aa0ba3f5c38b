mod config;
mod scheduler;
mod prober;
mod metrics;
mod stats;
mod timestamp;
mod util;

use config::{Args, OutputFormat, PingConfig};
use scheduler::Scheduler;
use metrics::{initialize_metrics, observe_outcome};
use prober::icmp::RawIcmpSocket;
use prober::{run_identifier, ProbeOutcome, Target};

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load config first to get log level
    let config = PingConfig::load(&args).await?;
    let log_level = config.get_tracing_level()?;

    // Logs go to stderr, stdout is reserved for ping output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
                         .add_directive(format!("pinger={}", log_level.as_str().to_lowercase()).parse()?))
        .init();

    if !util::is_root() {
        // CAP_NET_RAW is enough, so only give up if a raw socket really is refused
        RawIcmpSocket::open().context("Only root can run pinger")?;
        warn!("not running as root, relying on CAP_NET_RAW");
    }

    initialize_metrics(config.enable_latency_history);
    if let Some(addr) = config.metrics_addr {
        info!("serving metrics on http://{}/metrics", addr);
        tokio::spawn(metrics::serve_metrics(addr));
    }

    let address = util::resolve_host_to_ipv4(&args.destination).await?;
    let target = Target { host: args.destination.clone(), address };

    // Ctrl-C stops the run early; statistics are still printed
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let identifier = run_identifier();
    info!(count = config.count, timeout_ms = config.timeout_ms, identifier, "starting run");
    println!("pinging {} ({})...", target.host, target.address);

    let scheduler = Scheduler::new(config.count, config.timeout_ms)?;
    let stats = scheduler
        .run(&target, identifier, RawIcmpSocket::open, cancel_rx, |seq, outcome| {
            observe_outcome(&target.host, outcome);
            match outcome {
                ProbeOutcome::Success { rtt } => println!(
                    "ping {} ({}): icmp_seq={}, time={:.1}ms",
                    target.host, target.address, seq, rtt * 1000.0
                ),
                ProbeOutcome::Failure { reason } => {
                    debug!(seq, "probe failed: {}", reason);
                    println!(
                        "ping {} ({}) FAILED: icmp_seq={}, error={}",
                        target.host, target.address, seq, reason
                    )
                }
            }
        })
        .await?;

    info!(
        transmitted = stats.transmitted,
        received = stats.received,
        "run finished"
    );
    match config.output {
        OutputFormat::Text => {
            println!();
            println!("{}", stats);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
    }

    Ok(())
}
