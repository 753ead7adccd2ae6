mod cluster;

use clap::Parser;
use cluster::SimCluster;
use openverify_cache::{ExpirySweeper, VerifyCache};
use openverify_retry::{
    OpaqueData, OpenMode, OpenOutcome, RedirectTarget, RetryController, RetryPolicy, VerifyConfig,
};
use rand::Rng;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Redirect-verification simulator — drives the retry controller against
/// an in-process redirecting cluster.
#[derive(Parser)]
#[command(name = "redirect-sim")]
struct Args {
    /// Total open requests to issue
    #[arg(long, default_value_t = 10_000)]
    requests: u64,

    /// Concurrent request threads
    #[arg(long, default_value_t = 8)]
    threads: u64,

    /// Number of data nodes behind the head node
    #[arg(long, default_value_t = 12)]
    data_nodes: u16,

    /// Probability that a data node is broken (its probes fail)
    #[arg(long, default_value_t = 0.25)]
    broken_rate: f64,

    /// Number of distinct logical paths in the request population
    #[arg(long, default_value_t = 200)]
    paths: u64,

    /// Fraction of requests issued with write intent (bypass verification)
    #[arg(long, default_value_t = 0.1)]
    write_rate: f64,
}

#[derive(Default)]
struct Tally {
    served: AtomicU64,
    redirected: AtomicU64,
    failed: AtomicU64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = if Path::new("openverify.toml").exists() {
        match VerifyConfig::load(Path::new("openverify.toml")) {
            Ok(c) => {
                tracing::info!("loaded config from openverify.toml");
                c
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load openverify.toml, using defaults");
                VerifyConfig::default()
            }
        }
    } else {
        tracing::info!("no openverify.toml found, using defaults");
        VerifyConfig::default()
    };

    let mut rng = rand::thread_rng();
    let data_nodes: Vec<RedirectTarget> = (0..args.data_nodes)
        .map(|i| RedirectTarget::new(format!("node-{i}"), Some(1094)))
        .collect();
    let broken: HashSet<String> = data_nodes
        .iter()
        .filter(|_| rng.gen_bool(args.broken_rate))
        .map(|t| t.to_string())
        .collect();

    tracing::info!(
        data_nodes = data_nodes.len(),
        broken = broken.len(),
        requests = args.requests,
        threads = args.threads,
        positive_ttl_secs = config.positive_ttl_secs,
        negative_ttl_secs = config.negative_ttl_secs,
        "redirect-sim starting"
    );

    let cache = Arc::new(VerifyCache::new());
    let sweeper = ExpirySweeper::new(Arc::clone(&cache), config.sweep_period());
    sweeper.start();

    // One cluster instance plays both the opener and the probe endpoint.
    let sim = Arc::new(SimCluster::new(data_nodes, broken));
    let controller = Arc::new(RetryController::new(
        Arc::clone(&cache),
        RetryPolicy::from_config(&config),
        Arc::clone(&sim),
        Arc::clone(&sim),
    ));

    let tally = Arc::new(Tally::default());
    let start = Instant::now();

    let per_thread = args.requests / args.threads.max(1);
    let mut handles = vec![];
    for t in 0..args.threads.max(1) {
        let controller = Arc::clone(&controller);
        let tally = Arc::clone(&tally);
        let paths = args.paths.max(1);
        let write_rate = args.write_rate;
        handles.push(std::thread::spawn(move || {
            let mut rng = rand::thread_rng();
            for i in 0..per_thread {
                let n = (t * per_thread + i) % paths;
                let path = format!("/store/bucket-{}/obj-{}", n % 16, n);
                let mode = if rng.gen_bool(write_rate) {
                    OpenMode::WRITE | OpenMode::CREATE
                } else {
                    OpenMode::READ
                };

                match controller.run(&path, mode, None, &OpaqueData::new()) {
                    OpenOutcome::Ok => tally.served.fetch_add(1, Ordering::Relaxed),
                    OpenOutcome::Redirect(_) => tally.redirected.fetch_add(1, Ordering::Relaxed),
                    _ => tally.failed.fetch_add(1, Ordering::Relaxed),
                };
            }
        }));
    }

    for h in handles {
        if h.join().is_err() {
            tracing::error!("request thread panicked");
        }
    }

    let elapsed = start.elapsed();
    sweeper.stop();

    tracing::info!(
        served = tally.served.load(Ordering::Relaxed),
        redirected = tally.redirected.load(Ordering::Relaxed),
        failed = tally.failed.load(Ordering::Relaxed),
        underlying_opens = sim.open_count(),
        probes = sim.probe_count(),
        cached_verdicts = cache.live_entries(Instant::now()),
        elapsed_ms = elapsed.as_millis() as u64,
        "redirect-sim finished"
    );
}
