//! Callback-chained retry example
//!
//! Starts an asynchronous retry sequence on a tokio runtime. The operation
//! hands back a `Completion` that a simulated server settles later.
//!
//! Run with: cargo run --example callback_chain --features tokio

use coord_retry::{Completion, RetryPolicy, ServiceError, TokioScheduler, completion};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Pretend request that fails with connection loss twice before succeeding.
fn get_data(calls: &AtomicU32) -> Completion<Result<Vec<u8>, ServiceError>> {
    let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
    let (promise, reply) = completion();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if attempt < 3 {
            promise.resolve(Err(ServiceError::ConnectionLoss));
        } else {
            promise.resolve(Ok(b"leader=node-2".to_vec()));
        }
    });
    println!("   Attempt {} sent", attempt);
    reply
}

#[tokio::main]
async fn main() {
    println!("=== coord-retry callback chain example ===\n");

    let policy = RetryPolicy::builder()
        .max_attempts(5)
        .initial_delay(Duration::from_millis(100))
        .max_jitter(0.2)
        .deadline(Duration::from_secs(5))
        .build();

    let scheduler = Arc::new(TokioScheduler::new(tokio::runtime::Handle::current()));
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let mut handle = policy.invoke_async(move || get_data(&counter), scheduler);
    println!("Handle returned, settled: {}", handle.is_settled());

    match handle.await {
        Ok(data) => println!(
            "\nResult: {} after {} calls",
            String::from_utf8_lossy(&data),
            calls.load(Ordering::SeqCst)
        ),
        Err(err) => println!("\nFailed: {} ({})", err, err.as_label()),
    }
}
