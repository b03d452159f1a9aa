//! tsvc Node Binary
//!
//! Boots the transaction service for a standalone node and drives a
//! synthetic workload through it.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tsvc::protocol::{decode_message, encode_message, Message};
use tsvc::standalone::StandaloneNode;
use tsvc::subsystems::Subsystems;
use tsvc::transaction::{ConnHandle, NodeId};
use tsvc::{Config, NamespaceConfig, Origin, Transaction, TransactionService};
use tracing_subscriber::{fmt, EnvFilter};

/// tsvc Node
#[derive(Parser, Debug)]
#[command(name = "tsvc-node")]
#[command(about = "Transaction admission and routing service for a key-value store node")]
#[command(version)]
struct Args {
    /// Namespace as name[:devices] (no devices = in memory); repeatable
    #[arg(short = 'N', long = "namespace", default_value = "test")]
    namespaces: Vec<NamespaceArg>,

    /// Number of shared transaction queues
    #[arg(short, long, default_value = "4")]
    queues: usize,

    /// Worker threads per queue
    #[arg(short, long, default_value = "4")]
    threads_per_queue: usize,

    /// Use one read and one write queue per device
    #[arg(long)]
    queue_per_device: bool,

    /// Never run transactions on the submitting thread
    #[arg(long)]
    no_inline: bool,

    /// Default transaction deadline in milliseconds
    #[arg(long, default_value = "1000")]
    transaction_max_ms: u64,

    /// Record queue-wait latency
    #[arg(long)]
    benchmarks: bool,

    /// Synthetic transactions to submit
    #[arg(short = 'n', long, default_value = "100000")]
    transactions: u64,
}

#[derive(Debug, Clone)]
struct NamespaceArg(NamespaceConfig);

impl FromStr for NamespaceArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((name, devices)) => {
                let n_devices = devices
                    .parse::<usize>()
                    .map_err(|e| format!("bad device count '{}': {}", devices, e))?;
                if n_devices == 0 {
                    Ok(Self(NamespaceConfig::in_memory(name)))
                } else {
                    Ok(Self(NamespaceConfig::on_devices(name, n_devices)))
                }
            }
            None => Ok(Self(NamespaceConfig::in_memory(s))),
        }
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tsvc=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("tsvc node v{}", tsvc::VERSION);

    // Build config from args
    let mut builder = Config::builder()
        .n_transaction_queues(args.queues)
        .n_transaction_threads_per_queue(args.threads_per_queue)
        .use_queue_per_device(args.queue_per_device)
        .allow_inline_transactions(!args.no_inline)
        .transaction_max_ns(args.transaction_max_ms.saturating_mul(1_000_000))
        .svc_benchmarks_enabled(args.benchmarks);

    for ns in &args.namespaces {
        tracing::info!("Namespace: {} ({} devices)", ns.0.name, ns.0.n_devices);
        builder = builder.namespace(ns.0.clone());
    }
    let config = builder.build();

    let node = StandaloneNode::new(NodeId(1));
    let service = match TransactionService::start(config, Subsystems::uniform(Arc::clone(&node))) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start transaction service: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Transaction service started: {} queues, {} workers",
        service.n_queues(),
        service.n_workers()
    );

    let started = Instant::now();
    let names: Vec<String> = args.namespaces.iter().map(|ns| ns.0.name.clone()).collect();

    for i in 0..args.transactions {
        let ns = &names[(i % names.len() as u64) as usize];
        let builder = Message::builder()
            .namespace(ns)
            .set("demo")
            .key(&i.to_be_bytes());
        let message = if i % 4 == 0 {
            builder.write().build()
        } else {
            builder.read().build()
        };

        // Go through the wire format the way ingested requests do.
        let message = match encode_message(&message).and_then(|bytes| decode_message(bytes)) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("Failed to decode request {}: {}", i, e);
                std::process::exit(1);
            }
        };

        let mut tr = Transaction::new(Origin::Client { conn: ConnHandle(i) }, Arc::new(message));
        if args.benchmarks {
            tr = tr.with_benchmark();
        }
        service.process_or_enqueue(tr);
    }

    while service.queue_size() > 0 {
        std::thread::sleep(Duration::from_millis(10));
    }

    // Workers may still hold popped transactions; count them after the join.
    let stats = service.shutdown();

    let elapsed = started.elapsed();
    tracing::info!(
        "Processed {} transactions in {:?} ({} executed, {} errors, {} reservations outstanding)",
        args.transactions,
        elapsed,
        node.counters.executed(),
        node.counters.errors.load(std::sync::atomic::Ordering::Relaxed),
        node.counters.outstanding_reservations()
    );
    tracing::info!("Stats: {:?}", stats);
}
