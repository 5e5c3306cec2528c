//! Basic circuit breaker usage example

use std::thread;
use std::time::Duration;
use tripswitch::CircuitBreaker;

fn main() {
    println!("=== Circuit Breaker Basic Example ===\n");

    // Create a breaker with builder API
    let breaker = CircuitBreaker::builder()
        .name("payment_api")
        .threshold(3)
        .timeout(Duration::from_millis(1500))
        .concurrent_half_open_calls(1)
        .on_open(|name| println!("🔴 Circuit '{}' opened!", name))
        .on_close(|name| println!("🟢 Circuit '{}' closed!", name))
        .on_half_open(|name| println!("🟡 Circuit '{}' half-open, probing...", name))
        .build();

    println!("Initial state: {}\n", breaker.state());

    // Simulate successful calls
    println!("--- Successful calls ---");
    for i in 1..=2 {
        match breaker.attempt(move || Ok::<_, String>(format!("Payment {}", i))) {
            Ok(result) => println!("✓ {}", result),
            Err(e) => println!("✗ {}", e),
        }
    }
    println!("State: {}\n", breaker.state());

    // Simulate failures
    println!("--- Triggering failures ---");
    for i in 1..=3 {
        match breaker.attempt(move || Err::<String, _>(format!("Payment failed {}", i))) {
            Ok(_) => println!("✓ Success"),
            Err(e) => println!("✗ {}", e),
        }
    }
    println!("State: {} (circuit opened)\n", breaker.state());

    // Try calling while open
    println!("--- Attempting call while open ---");
    match breaker.attempt(|| Ok::<_, String>("Should be rejected".to_string())) {
        Ok(_) => println!("✓ Success"),
        Err(e) => println!("✗ {}", e),
    }
    println!();

    // Wait out the open timeout; the next query performs the transition
    println!("--- Waiting for the open timeout ---");
    thread::sleep(Duration::from_millis(1600));
    println!("State: {}", breaker.state());

    match breaker.attempt(|| Ok::<_, String>("Recovery probe".to_string())) {
        Ok(result) => println!("✓ {}", result),
        Err(e) => println!("✗ {}", e),
    }
    println!("State: {}\n", breaker.state());

    // Manual control
    println!("--- Manual control ---");
    breaker.open();
    println!("State after open(): {}", breaker.state());
    breaker.close();
    println!("State after close(): {}", breaker.state());
}
