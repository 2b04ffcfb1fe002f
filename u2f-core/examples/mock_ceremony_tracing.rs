//! Example demonstrating ceremony tracing instrumentation.
//!
//! Run with: cargo run -p u2f-core --example mock_ceremony_tracing

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};
use u2f_core::{CeremonyConfig, CeremonyController, MockAuthenticator};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing subscriber with debug level
    fmt()
        .with_env_filter(EnvFilter::new("u2f_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== U2F Ceremony Tracing Demo ===\n");

    let config = CeremonyConfig {
        budget: Duration::from_secs(5),
        ..Default::default()
    };
    println!("Config: {:?}\n", config);

    let device = Arc::new(MockAuthenticator::default().with_latency(Duration::from_millis(2500)));
    let mut controller = match CeremonyController::new(config, device) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create controller: {}", e);
            return;
        }
    };

    controller.on_hash_change("#reg");
    if let Err(e) = controller.submit_registration() {
        eprintln!("Failed to submit: {}", e);
        return;
    }

    match controller.settle().await {
        Ok(outcome) => {
            println!("\nOutcome: {:?}", outcome);
            println!("Key handle: {}", controller.signing().key_handle);
        }
        Err(e) => println!("\nFailed: {}", e),
    }
}
