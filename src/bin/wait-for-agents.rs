//! Wait for Agents - block until both services report initialized
//!
//! Polls the writer and reviewer `/healthz` endpoints. Exits 0 once both are
//! ready and 1 when the overall timeout passes first.

use agentpair::service::readiness::check_healthz;
use clap::Parser;
use std::process;
use std::time::{Duration, Instant};

const STATUS_EVERY: Duration = Duration::from_secs(2);

/// Wait for agent /healthz endpoints to be initialized
#[derive(Parser)]
#[command(name = "wait-for-agents")]
#[command(about = "Wait for agent /healthz endpoints to be initialized")]
#[command(version)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8000/healthz")]
    writer_url: String,

    #[arg(long, default_value = "http://127.0.0.1:8001/healthz")]
    reviewer_url: String,

    /// Overall timeout in seconds
    #[arg(long, default_value_t = 180.0)]
    timeout: f64,

    /// Seconds between checks
    #[arg(long, default_value_t = 0.5)]
    interval: f64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 2.0)]
    request_timeout: f64,
}

fn seconds(name: &str, value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_else(|_| {
        eprintln!("[wait_for_agents] invalid --{name}: {value}");
        process::exit(2);
    })
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let timeout = seconds("timeout", args.timeout);
    let interval = seconds("interval", args.interval);
    let request_timeout = seconds("request-timeout", args.request_timeout);

    let client = reqwest::Client::new();
    let start = Instant::now();
    let mut last_print: Option<Instant> = None;

    loop {
        let (writer, reviewer) = tokio::join!(
            check_healthz(&client, &args.writer_url, request_timeout),
            check_healthz(&client, &args.reviewer_url, request_timeout),
        );

        let now = Instant::now();
        if last_print.map_or(true, |at| now - at >= STATUS_EVERY) {
            println!(
                "[wait_for_agents] {:5.1}s writer={} ({}) reviewer={} ({})",
                (now - start).as_secs_f64(),
                writer.ready,
                writer.message,
                reviewer.ready,
                reviewer.message
            );
            last_print = Some(now);
        }

        if writer.ready && reviewer.ready {
            println!("[wait_for_agents] both agents ready");
            process::exit(0);
        }

        if now - start >= timeout {
            eprintln!("[wait_for_agents] timed out waiting for agents");
            process::exit(1);
        }

        tokio::time::sleep(interval).await;
    }
}
