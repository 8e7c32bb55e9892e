use clap::Parser;
use hdrhistogram::Histogram;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Method, Request};
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of concurrent clients
    #[arg(short, long, default_value = "1")]
    concurrency: usize,

    /// INTERVAL ms
    #[arg(short, long, default_value = "100")]
    interval: u64,

    /// Duration of the benchmark in seconds
    #[arg(short, long, default_value = "30")]
    duration: u64,

    /// Client http address of the peer
    #[arg(short, long, default_value = "http://127.0.0.1:40010")]
    server: String,

    /// Ticker to trade
    #[arg(short, long, default_value = "btc-usd")]
    ticker: String,
}

fn random_order(ticker: &str) -> serde_json::Value {
    let mut rng = rand::thread_rng();
    let side = if rng.gen_bool(0.5) { "buy" } else { "sell" };
    json!({
        "ticker": ticker,
        "side": side,
        "price": rng.gen_range(95..=105),
        "quantity": rng.gen_range(1..=10),
        "owner_id": format!("bench-{}", rng.gen_range(0..100)),
    })
}

async fn create_order(
    client: &Client<HttpConnector>,
    server: &str,
    order: &serde_json::Value,
) -> Result<(), String> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("{}/createOrder", server))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(order.to_string()))
        .map_err(|e| e.to_string())?;
    let response = client.request(request).await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("status {}", response.status()));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let histogram = Arc::new(Mutex::new(Histogram::<u64>::new(3)?));
    let total_requests = Arc::new(Mutex::new(0u64));

    println!(
        "Starting benchmark with {} concurrent clients, target INTERVAL: {}",
        args.concurrency, args.interval
    );

    // Spawn client tasks
    let mut handles = vec![];
    for _ in 0..args.concurrency {
        let server = args.server.clone();
        let ticker = args.ticker.clone();
        let histogram = histogram.clone();
        let total_requests = total_requests.clone();
        let interval = args.interval;

        let handle = tokio::spawn(async move {
            let client = Client::new();

            loop {
                let start = Instant::now();
                let order = random_order(&ticker);

                match create_order(&client, &server, &order).await {
                    Ok(_) => {
                        let duration = start.elapsed();
                        let mut hist = histogram.lock().await;
                        if let Err(e) = hist.record(duration.as_micros() as u64) {
                            eprintln!("Failed to record latency: {}", e);
                        }
                        let mut total = total_requests.lock().await;
                        *total += 1;
                    }
                    Err(e) => eprintln!("Request failed: {}", e),
                }

                tokio::time::sleep(Duration::from_millis(interval)).await;
            }
        });

        handles.push(handle);
    }

    // Run for specified duration
    sleep(Duration::from_secs(args.duration)).await;

    // Cancel all tasks
    for handle in handles {
        handle.abort();
    }

    // Print statistics
    let total = *total_requests.lock().await;
    let hist = histogram.lock().await;

    println!("\nBenchmark Results:");
    println!("Total Requests: {}", total);
    println!("Average TPS: {:.2}", total as f64 / args.duration as f64);
    println!("\nLatency Distribution (microseconds):");
    println!("p50: {}", hist.value_at_percentile(50.0));
    println!("p90: {}", hist.value_at_percentile(90.0));
    println!("p95: {}", hist.value_at_percentile(95.0));
    println!("p99: {}", hist.value_at_percentile(99.0));
    println!("p99.9: {}", hist.value_at_percentile(99.9));

    Ok(())
}
