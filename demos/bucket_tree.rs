//! Hierarchical buckets: explicit construction and the declarative factory.

use bucketflow::{build_hierarchy, BucketSpec, HierarchicalTokenBucket};
use std::time::Instant;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    explicit_hierarchy().await;
    factory_hierarchy().await;
}

async fn explicit_hierarchy() {
    println!("Explicit hierarchy: root -> {{user1, user2 -> api1}}");
    let root = HierarchicalTokenBucket::new(100.0, 10.0, None, "root").expect("valid parameters");
    let user1 = HierarchicalTokenBucket::new(20.0, 2.0, Some(root.clone()), "user1")
        .expect("valid parameters");
    let user2 = HierarchicalTokenBucket::new(30.0, 3.0, Some(root.clone()), "user2")
        .expect("valid parameters");
    let api1 = HierarchicalTokenBucket::new(10.0, 1.0, Some(user2.clone()), "api1")
        .expect("valid parameters");

    for node in [&root, &user1, &user2, &api1] {
        println!("  {}: {:.1} tokens", node.name(), node.tokens());
    }

    let admitted = user1.consume(15.0, false).await.expect("valid amount");
    println!("\n  consume 15 at user1: {admitted}");
    println!("  root: {:.1}, user1: {:.1}", root.tokens(), user1.tokens());

    let admitted = api1.consume(8.0, false).await.expect("valid amount");
    println!("\n  consume 8 at api1: {admitted}");
    println!(
        "  root: {:.1}, user2: {:.1}, api1: {:.1}",
        root.tokens(),
        user2.tokens(),
        api1.tokens()
    );

    let admitted = api1.consume(5.0, false).await.expect("valid amount");
    println!("\n  consume 5 more at api1 without blocking: {admitted}");

    let start = Instant::now();
    let admitted = api1.consume(5.0, true).await.expect("valid amount");
    println!(
        "  consume 5 at api1 with blocking: {admitted} after {:.2}s, api1 now {:.1}",
        start.elapsed().as_secs_f64(),
        api1.tokens()
    );
}

async fn factory_hierarchy() {
    println!("\nDeclarative factory");
    let spec: BucketSpec = serde_json::from_str(
        r#"{
            "name": "global",
            "capacity": 100,
            "fill_rate": 10,
            "children": [
                {
                    "name": "service1",
                    "capacity": 40,
                    "fill_rate": 4,
                    "children": [
                        { "name": "endpoint1", "capacity": 15, "fill_rate": 1.5 },
                        { "name": "endpoint2", "capacity": 25, "fill_rate": 2.5 }
                    ]
                },
                { "name": "service2", "capacity": 60, "fill_rate": 6 }
            ]
        }"#,
    )
    .expect("well-formed spec");

    let buckets = build_hierarchy(&spec).expect("valid parameters");
    let mut names: Vec<&str> = buckets.keys().map(String::as_str).collect();
    names.sort_unstable();
    println!("  available buckets: {}", names.join(", "));

    let endpoint = &buckets["endpoint1"];
    let admitted = endpoint.consume(10.0, false).await.expect("valid amount");
    println!("\n  consume 10 at {}: {admitted}", endpoint.name());
    println!(
        "  global: {:.1}, service1: {:.1}, endpoint1: {:.1}",
        buckets["global"].tokens(),
        buckets["service1"].tokens(),
        buckets["endpoint1"].tokens()
    );
}
