//! Blocking retry example
//!
//! Demonstrates retrying a coordination-service call on the current thread
//! with the standard library sleeper.
//!
//! Run with: cargo run --example blocking_retry

use coord_retry::{RetryError, RetryPolicy, Retryable, ServiceError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn main() {
    println!("=== coord-retry blocking examples ===\n");

    let shared = RetryPolicy::builder()
        .max_attempts(5)
        .initial_delay(Duration::from_millis(50))
        .multiplier(2.0)
        .max_jitter(0.1)
        .build();

    // 1. Transient connection loss, then success
    println!("1. Connection loss recovered:");
    let mut attempt = 0;
    let result = (|| {
        attempt += 1;
        println!("   Attempt {}", attempt);
        if attempt < 3 {
            Err(ServiceError::ConnectionLoss)
        } else {
            Ok("/election/n_0000000003")
        }
    })
    .retry(&shared)
    .notify(|err, delay| {
        println!("   -> retrying in {:?} after: {}", delay, err);
    })
    .call();
    println!("   Result: {:?}\n", result);

    // 2. Non-retryable errors pass through on the first attempt
    println!("2. Fatal error passes through:");
    attempt = 0;
    let result: Result<(), _> = (|| {
        attempt += 1;
        println!("   Attempt {}", attempt);
        Err(ServiceError::NodeExists {
            path: "/lock".into(),
        })
    })
    .retry(&shared)
    .call();
    println!("   Result: {:?}\n", result);

    // 3. Attempt budget exhausted
    println!("3. Budget exhausted:");
    let tight = shared
        .derive()
        .max_attempts(3)
        .initial_delay(Duration::from_millis(10))
        .build();
    let result: Result<(), _> = tight.invoke(|| Err(ServiceError::OperationTimeout));
    match result {
        Err(RetryError::TooManyAttempts { attempts }) => {
            println!("   Gave up after {} attempts\n", attempts)
        }
        other => println!("   Unexpected: {:?}\n", other),
    }

    // 4. Deadline shorter than the first wait
    println!("4. Deadline:");
    let bounded = shared
        .derive()
        .initial_delay(Duration::from_secs(1))
        .deadline(Duration::from_millis(200))
        .build();
    let result: Result<(), _> = bounded.invoke(|| Err(ServiceError::ConnectionLoss));
    println!("   Result: {:?}\n", result);

    // 5. Interrupt flag raised from another thread during the wait
    println!("5. Interrupted:");
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    let interruptible = shared
        .derive()
        .unlimited_attempts()
        .initial_delay(Duration::from_secs(2))
        .max_jitter(0.0)
        .interrupt(move || flag.load(Ordering::SeqCst))
        .build();
    let raiser = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(250));
        stop.store(true, Ordering::SeqCst);
    });
    let result: Result<(), _> = interruptible.invoke(|| Err(ServiceError::ConnectionLoss));
    let _ = raiser.join();
    println!("   Result: {:?}", result);

    println!("\n=== All examples completed ===");
}
