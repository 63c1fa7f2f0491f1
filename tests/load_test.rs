//! Load testing for the gateway.

use std::sync::atomic::Ordering;
use std::time::Instant;

use route_gateway::admin;
use route_gateway::config::GatewayConfig;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_spread_across_pool() {
    // 1. Setup mock backends
    let (b1, c1) = common::start_counting_backend("b1").await;
    let (b2, c2) = common::start_counting_backend("b2").await;
    let (b3, c3) = common::start_counting_backend("b3").await;

    // 2. Start gateway
    let gateway = common::start_gateway(|addr| GatewayConfig {
        routes: vec![common::proxy_route("api", addr, "", &[b1, b2, b3])],
        ..Default::default()
    })
    .await;

    // 3. Run load
    let concurrency = 20;
    let requests_per_task = 25;
    let total_requests = concurrency * requests_per_task;

    let client = common::client();
    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..concurrency {
        let client = client.clone();
        let url = gateway.url("/load");
        handles.push(tokio::spawn(async move {
            let mut ok = 0;
            for _ in 0..requests_per_task {
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success() && res.bytes().await.is_ok() {
                        ok += 1;
                    }
                }
            }
            ok
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        succeeded += handle.await.unwrap();
    }
    let elapsed = start.elapsed();

    println!(
        "{} requests in {:?} ({:.0} req/s)",
        total_requests,
        elapsed,
        total_requests as f64 / elapsed.as_secs_f64()
    );

    // 4. Every request succeeded and every backend took a share
    assert_eq!(succeeded, total_requests);
    let served = [c1.load(Ordering::SeqCst), c2.load(Ordering::SeqCst), c3.load(Ordering::SeqCst)];
    assert_eq!(served.iter().sum::<u32>() as usize, total_requests);
    assert!(served.iter().all(|&n| n > 0), "uneven spread: {served:?}");

    // 5. Counters agree with what the backends saw
    let stats = admin::statistics(&gateway.state);
    let used: u64 = stats[0].proxy_servers.iter().map(|b| b.used_successfully).sum();
    let errors: u64 = stats[0].proxy_servers.iter().map(|b| b.error_counter).sum();
    assert_eq!(used as usize, total_requests);
    assert_eq!(errors, 0);
}
