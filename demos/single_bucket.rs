//! Walkthrough of a single token bucket, the call gate, and shared
//! consumption across tasks.

use bucketflow::{RateGate, TokenBucket};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    token_bucket_walkthrough().await;
    rate_gate_walkthrough().await;
    concurrent_consumers().await;
}

async fn token_bucket_walkthrough() {
    println!("Token bucket: capacity 10, 2 tokens/s");
    let bucket = TokenBucket::new(10.0, 2.0).expect("valid parameters");
    println!("  initial tokens: {:.1}", bucket.tokens());

    let admitted = bucket.consume(5.0, false).await.expect("valid amount");
    println!("  consume 5: {admitted}");
    println!("  remaining: {:.1}", bucket.tokens());

    let admitted = bucket.consume(10.0, false).await.expect("valid amount");
    println!("  consume 10 without blocking: {admitted}");

    println!("  waiting 3s for refill...");
    tokio::time::sleep(Duration::from_secs(3)).await;
    println!("  tokens after waiting: {:.1}", bucket.tokens());

    let start = Instant::now();
    bucket.consume(10.0, true).await.expect("valid amount");
    println!("  blocking consume of 10 took {:.2}s", start.elapsed().as_secs_f64());
}

async fn rate_gate_walkthrough() {
    println!("\nRate gate: 2 calls/s with bursts up to 5");
    let gate = RateGate::new(2.0, 5.0).expect("valid parameters");
    let start = Instant::now();
    for call in 0..10 {
        gate.execute(|| async move {
            println!("  call #{call} ran at t={:.2}s", start.elapsed().as_secs_f64());
        })
        .await
        .expect("cost fits capacity");
    }
}

async fn concurrent_consumers() {
    println!("\nThree tasks sharing a 5-token bucket at 2 tokens/s");
    let bucket = Arc::new(TokenBucket::new(5.0, 2.0).expect("valid parameters"));
    let mut handles = Vec::new();
    for task in 0..3u32 {
        let bucket = bucket.clone();
        handles.push(tokio::spawn(async move {
            for round in 0..3u32 {
                let amount = 0.5 + f64::from((task + round) % 3) * 0.5;
                let admitted = bucket.consume(amount, true).await.expect("amount fits capacity");
                println!("  task {task} consumed {amount} (admitted: {admitted})");
            }
        }));
    }
    for handle in handles {
        handle.await.expect("consumer task panicked");
    }
}
