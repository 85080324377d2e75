use anyhow::{bail, Context};
use clap::Parser;
use numbers_aggregator::core::{NumberSet, NumbersPayload};
use numbers_aggregator::utils::logger;
use numbers_aggregator::utils::validation::validate_url;
use rand::Rng;
use std::time::{Duration, Instant};
use url::Url;

#[derive(Parser)]
#[command(name = "e2e_check")]
#[command(about = "Fires random fan-out queries at a running aggregator and checks latency and payload")]
struct Args {
    /// Aggregate endpoint of the running server
    #[arg(long, default_value = "http://localhost:8080/numbers")]
    server: String,

    /// Sub-endpoint URLs to draw from (repeatable)
    #[arg(
        long = "endpoint",
        default_values = [
            "http://localhost:8079/primes",
            "http://localhost:8079/fibo",
            "http://localhost:8079/rand",
            "http://localhost:8079/odd",
        ]
    )]
    endpoints: Vec<String>,

    /// Number of queries to run
    #[arg(long, default_value = "10")]
    queries: usize,

    /// Exclusive upper bound of sub-endpoints per query
    #[arg(long, default_value = "1000")]
    max_endpoints: usize,

    /// Latency budget every query must stay under, in milliseconds
    #[arg(long, default_value = "500")]
    budget_ms: u64,

    /// Query parameter the server reads targets from
    #[arg(long, default_value = "u")]
    query_key: String,

    #[arg(short, long)]
    verbose: bool,
}

/// 隨機挑選子端點組成一個查詢 URL
fn build_query(args: &Args) -> anyhow::Result<(Url, usize)> {
    let mut url = Url::parse(&args.server).context("invalid --server URL")?;
    let mut rng = rand::rng();
    let count = rng.random_range(0..args.max_endpoints);

    {
        let mut pairs = url.query_pairs_mut();
        for _ in 0..count {
            let endpoint = &args.endpoints[rng.random_range(0..args.endpoints.len())];
            pairs.append_pair(&args.query_key, endpoint);
        }
    }

    Ok((url, count))
}

async fn run_query(client: &reqwest::Client, args: &Args, budget: Duration) -> anyhow::Result<()> {
    let (url, count) = build_query(args)?;

    let started = Instant::now();
    let response = client
        .get(url)
        .send()
        .await
        .context("request to aggregator failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("aggregator answered with status {}", status);
    }

    let payload: NumbersPayload = response
        .json()
        .await
        .context("aggregator payload is not a numbers object")?;
    let elapsed = started.elapsed();

    let numbers = NumberSet::from(payload);
    if !numbers.is_strictly_ascending() {
        bail!("numbers are not strictly ascending");
    }
    if elapsed >= budget {
        bail!("budget of {:?} exceeded: took {:?} for {} endpoints", budget, elapsed, count);
    }

    tracing::info!("✅ E2E query passed");
    tracing::info!("Number of endpoints: {}", count);
    tracing::info!("Numbers returned: {}", numbers.len());
    tracing::info!("Elapsed time: {:?}", elapsed);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    if args.endpoints.is_empty() {
        bail!("at least one --endpoint is required");
    }
    if args.max_endpoints == 0 {
        bail!("--max-endpoints must be at least 1");
    }
    validate_url("server", &args.server)?;
    for endpoint in &args.endpoints {
        validate_url("endpoint", endpoint)?;
    }

    let client = reqwest::Client::new();
    let budget = Duration::from_millis(args.budget_ms);

    for query in 1..=args.queries {
        tracing::info!("▶️ Query {}/{}", query, args.queries);
        run_query(&client, &args, budget)
            .await
            .with_context(|| format!("e2e query {} failed", query))?;
    }

    tracing::info!("🎉 All {} queries passed", args.queries);
    Ok(())
}
